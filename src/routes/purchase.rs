use axum::{
    Json, Router,
    extract::{Query, State},
    response::Redirect,
    routing::{get, post},
};

use crate::{
    dto::purchase::{PurchaseCallback, PurchaseOutcome, PurchaseRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::purchase_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/checkout", post(checkout))
        .route("/points", post(purchase_with_points))
        .route("/callback", get(callback))
}

#[utoipa::path(
    post,
    path = "/purchase/checkout",
    request_body = PurchaseRequest,
    responses(
        (status = 200, description = "Processor session or manual-transfer confirmation URL", body = ApiResponse<PurchaseOutcome>),
        (status = 403, description = "Account suspended"),
        (status = 404, description = "Item not found"),
        (status = 409, description = "Item already purchased"),
    ),
    security(("bearer_auth" = [])),
    tag = "Purchase"
)]
pub async fn checkout(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<PurchaseRequest>,
) -> AppResult<Json<ApiResponse<PurchaseOutcome>>> {
    let resp = purchase_service::start_checkout(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/purchase/points",
    request_body = PurchaseRequest,
    responses(
        (status = 200, description = "Settled with points, or a session for the remainder", body = ApiResponse<PurchaseOutcome>),
        (status = 403, description = "Points not accepted or balance too low"),
        (status = 404, description = "Item not found"),
        (status = 409, description = "Item already purchased"),
    ),
    security(("bearer_auth" = [])),
    tag = "Purchase"
)]
pub async fn purchase_with_points(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<PurchaseRequest>,
) -> AppResult<Json<ApiResponse<PurchaseOutcome>>> {
    let resp = purchase_service::purchase_with_points(&state, &user, payload).await?;
    Ok(Json(resp))
}

/// Return leg of checkout. Settles the order and sends the browser to the
/// transaction page.
#[utoipa::path(
    get,
    path = "/purchase/callback",
    params(PurchaseCallback),
    responses(
        (status = 303, description = "Redirect to the transaction page"),
        (status = 400, description = "Payment not completed"),
        (status = 409, description = "Item already purchased"),
    ),
    security(("bearer_auth" = [])),
    tag = "Purchase"
)]
pub async fn callback(
    State(state): State<AppState>,
    user: AuthUser,
    Query(callback): Query<PurchaseCallback>,
) -> AppResult<Redirect> {
    let resp = purchase_service::complete_checkout(&state, &user, callback).await?;
    let target = resp
        .data
        .map(|outcome| outcome.redirect)
        .unwrap_or_else(|| "/".to_string());
    Ok(Redirect::to(&target))
}
