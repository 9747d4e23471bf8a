use axum::Router;

use crate::state::AppState;

pub mod admin;
pub mod categories;
pub mod doc;
pub mod health;
pub mod items;
pub mod orders;
pub mod params;
pub mod purchase;
pub mod users;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/items", items::router())
        .nest("/purchase", purchase::router())
        .nest("/orders", orders::router())
        .nest("/users", users::router())
        .nest("/categories", categories::router())
        .nest("/admin", admin::router())
}
