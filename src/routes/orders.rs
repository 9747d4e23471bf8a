use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::orders::{ChatList, ChatRequest, OrderDetail, OrderList, ReviewRequest, TrackingRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Chat, Order, Review},
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::order_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/purchases", get(list_purchases))
        .route("/sales", get(list_sales))
        .route("/{id}", get(get_order))
        .route("/{id}/confirm", post(confirm_payment))
        .route("/{id}/tracking", post(set_tracking))
        .route("/{id}/review", post(review))
        .route("/{id}/chats", get(list_chats).post(post_chat))
}

#[utoipa::path(
    get,
    path = "/orders/purchases",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Orders placed by the caller", body = ApiResponse<OrderList>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_purchases(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_purchases(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/orders/sales",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Orders on the caller's listings", body = ApiResponse<OrderList>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_sales(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_sales(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order with item, address, reviews and chat", body = ApiResponse<OrderDetail>),
        (status = 403, description = "Not a party to the order"),
        (status = 404, description = "Not Found"),
        (status = 410, description = "Unpaid order expired"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderDetail>>> {
    let resp = order_service::view_order(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/orders/{id}/confirm",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Seller confirms a manual transfer", body = ApiResponse<Order>),
        (status = 403, description = "Not the seller"),
        (status = 410, description = "Unpaid order expired"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn confirm_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = order_service::confirm_payment(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/orders/{id}/tracking",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = TrackingRequest,
    responses(
        (status = 200, description = "Record shipment tracking", body = ApiResponse<Order>),
        (status = 400, description = "Order already complete"),
        (status = 403, description = "Not the seller"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn set_tracking(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<TrackingRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = order_service::set_tracking(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/orders/{id}/review",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Leave a review and advance the handshake", body = ApiResponse<Review>),
        (status = 400, description = "Out of turn or already complete"),
        (status = 403, description = "Not a party to the order"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReviewRequest>,
) -> AppResult<Json<ApiResponse<Review>>> {
    let resp = order_service::review(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/orders/{id}/chats",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Transaction chat", body = ApiResponse<ChatList>),
        (status = 403, description = "Not a party to the order"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_chats(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ChatList>>> {
    let resp = order_service::list_chats(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/orders/{id}/chats",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Post a chat message", body = ApiResponse<Chat>),
        (status = 403, description = "Not a party to the order"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn post_chat(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChatRequest>,
) -> AppResult<Json<ApiResponse<Chat>>> {
    let resp = order_service::post_chat(&state, &user, id, payload).await?;
    Ok(Json(resp))
}
