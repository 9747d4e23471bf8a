use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::{
        admin::{
            DeleteResourceRequest, ReindexSummary, ReportList, ReviewList, SetRoleRequest,
            UserList,
        },
        orders::OrderList,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::Account,
    response::{ApiResponse, Deleted},
    routes::params::{OrderListQuery, Pagination},
    services::admin_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{id}/suspend", post(suspend_user))
        .route("/users/{id}/recover", post(recover_user))
        .route("/users/{id}/role", post(set_role))
        .route("/orders", get(list_all_orders))
        .route("/reports", get(list_reports))
        .route("/reviews", get(list_reviews))
        .route("/delete", post(delete_resource))
        .route("/reindex", post(reindex))
}

#[utoipa::path(
    get,
    path = "/admin/users",
    params(Pagination),
    responses(
        (status = 200, description = "All accounts (admin only)", body = ApiResponse<UserList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_users(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<UserList>>> {
    let resp = admin_service::list_users(&state, &user, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/admin/users/{id}/suspend",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Suspend a user and unlist their items", body = ApiResponse<Account>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn suspend_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Account>>> {
    let resp = admin_service::suspend_user(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/admin/users/{id}/recover",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Lift a suspension and relist items", body = ApiResponse<Account>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn recover_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Account>>> {
    let resp = admin_service::recover_user(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/admin/users/{id}/role",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = SetRoleRequest,
    responses(
        (status = 200, description = "Change a user's role", body = ApiResponse<Account>),
        (status = 400, description = "Unknown role"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn set_role(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetRoleRequest>,
) -> AppResult<Json<ApiResponse<Account>>> {
    let resp = admin_service::set_role(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/admin/orders",
    params(OrderListQuery),
    responses(
        (status = 200, description = "All orders (admin only)", body = ApiResponse<OrderList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_all_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = admin_service::list_all_orders(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/admin/reports",
    params(Pagination),
    responses(
        (status = 200, description = "User reports", body = ApiResponse<ReportList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_reports(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<ReportList>>> {
    let resp = admin_service::list_reports(&state, &user, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/admin/reviews",
    params(Pagination),
    responses(
        (status = 200, description = "All reviews", body = ApiResponse<ReviewList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_reviews(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<ReviewList>>> {
    let resp = admin_service::list_reviews(&state, &user, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/admin/delete",
    request_body = DeleteResourceRequest,
    responses(
        (status = 200, description = "Delete an item, report or order", body = ApiResponse<Deleted>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn delete_resource(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<DeleteResourceRequest>,
) -> AppResult<Json<ApiResponse<Deleted>>> {
    let resp = admin_service::delete_resource(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/admin/reindex",
    responses(
        (status = 200, description = "Rebuild the search index from the database", body = ApiResponse<ReindexSummary>),
        (status = 403, description = "Forbidden"),
        (status = 502, description = "Search service unavailable"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn reindex(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<ReindexSummary>>> {
    let resp = admin_service::reindex(&state, &user).await?;
    Ok(Json(resp))
}
