use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::Redirect as SeeOther,
    routing::{delete, get, post},
};
use uuid::Uuid;

use crate::{
    dto::{
        items::ItemList,
        purchase::{TopupCallback, TopupRequest},
        users::{
            AddressList, AddressRequest, PublicProfile, ReportRequest, UpdateProfileRequest,
        },
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Account, Address, Report},
    response::{ApiResponse, Deleted, Redirect},
    routes::params::Pagination,
    services::user_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(me).patch(update_profile))
        .route("/me/addresses", get(list_addresses).post(add_address))
        .route("/me/addresses/{id}", delete(delete_address))
        .route("/me/favorites", get(list_favorites))
        .route("/me/payout", post(connect_payout))
        .route("/me/points", post(start_topup))
        .route("/me/points/callback", get(topup_callback))
        .route("/reports", post(report))
        .route("/{id}", get(public_profile))
}

#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "The caller's account", body = ApiResponse<Account>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<Account>>> {
    let resp = user_service::me(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/users/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Update profile", body = ApiResponse<Account>),
        (status = 400, description = "Invalid profile"),
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> AppResult<Json<ApiResponse<Account>>> {
    let resp = user_service::update_profile(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Public profile with rating and listings", body = ApiResponse<PublicProfile>),
        (status = 404, description = "Not Found"),
    ),
    tag = "Users"
)]
pub async fn public_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<PublicProfile>>> {
    let resp = user_service::public_profile(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/users/me/addresses",
    responses((status = 200, description = "Shipping addresses", body = ApiResponse<AddressList>)),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn list_addresses(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<AddressList>>> {
    let resp = user_service::list_addresses(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/users/me/addresses",
    request_body = AddressRequest,
    responses(
        (status = 200, description = "Add a shipping address", body = ApiResponse<Address>),
        (status = 400, description = "Invalid address"),
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn add_address(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddressRequest>,
) -> AppResult<Json<ApiResponse<Address>>> {
    let resp = user_service::add_address(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/users/me/addresses/{id}",
    params(("id" = Uuid, Path, description = "Address ID")),
    responses(
        (status = 200, description = "Remove a shipping address", body = ApiResponse<Deleted>),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn delete_address(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Deleted>>> {
    let resp = user_service::delete_address(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/users/me/favorites",
    params(Pagination),
    responses((status = 200, description = "Favorited listings", body = ApiResponse<ItemList>)),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn list_favorites(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<ItemList>>> {
    let resp = user_service::list_favorites(&state, &user, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/users/reports",
    request_body = ReportRequest,
    responses(
        (status = 200, description = "Report an item or an order", body = ApiResponse<Report>),
        (status = 400, description = "Exactly one target required"),
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn report(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ReportRequest>,
) -> AppResult<Json<ApiResponse<Report>>> {
    let resp = user_service::report(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/users/me/payout",
    responses(
        (status = 200, description = "Onboarding or dashboard link for the payout account", body = ApiResponse<Redirect>),
        (status = 502, description = "Payment processor unavailable"),
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn connect_payout(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<Redirect>>> {
    let resp = user_service::connect_payout_account(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/users/me/points",
    request_body = TopupRequest,
    responses(
        (status = 200, description = "Checkout session for buying points", body = ApiResponse<Redirect>),
        (status = 400, description = "Invalid amount"),
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn start_topup(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<TopupRequest>,
) -> AppResult<Json<ApiResponse<Redirect>>> {
    let resp = user_service::start_topup(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/users/me/points/callback",
    params(TopupCallback),
    responses(
        (status = 303, description = "Points credited, redirect to the balance page"),
        (status = 400, description = "Payment not completed"),
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn topup_callback(
    State(state): State<AppState>,
    user: AuthUser,
    Query(callback): Query<TopupCallback>,
) -> AppResult<SeeOther> {
    user_service::complete_topup(&state, &user, callback).await?;
    Ok(SeeOther::to("/mypage/points"))
}
