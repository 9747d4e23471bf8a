use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::{
        items::{
            CommentRequest, CreateItemRequest, ItemDetail, ItemList, SearchHits,
            UpdateItemRequest, UploadedImage,
        },
        users::FavoriteState,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Comment, Item},
    response::{ApiResponse, Deleted},
    routes::params::{ItemQuery, SearchQuery},
    services::{
        image_service::{self, MAX_UPLOAD_BYTES},
        item_service, user_service,
    },
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_items).post(create_item))
        .route("/search", get(search_items))
        .route(
            "/images",
            post(upload_image).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route(
            "/{id}",
            get(get_item).put(update_item).delete(delete_item),
        )
        .route("/{id}/comments", post(post_comment))
        .route("/{id}/favorite", post(toggle_favorite))
}

#[utoipa::path(
    get,
    path = "/items",
    params(ItemQuery),
    responses(
        (status = 200, description = "Browse listings", body = ApiResponse<ItemList>),
        (status = 400, description = "Unsupported filter or sort"),
    ),
    tag = "Items"
)]
pub async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<ItemQuery>,
) -> AppResult<Json<ApiResponse<ItemList>>> {
    let resp = item_service::list_items(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/items/search",
    params(SearchQuery),
    responses(
        (status = 200, description = "Full-text search over listings", body = ApiResponse<SearchHits>),
        (status = 502, description = "Search service unavailable"),
    ),
    tag = "Items"
)]
pub async fn search_items(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<ApiResponse<SearchHits>>> {
    let resp = item_service::search_items(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/items",
    request_body = CreateItemRequest,
    responses(
        (status = 200, description = "Create a listing", body = ApiResponse<Item>),
        (status = 400, description = "Invalid listing"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Account suspended"),
    ),
    security(("bearer_auth" = [])),
    tag = "Items"
)]
pub async fn create_item(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateItemRequest>,
) -> AppResult<Json<ApiResponse<Item>>> {
    let resp = item_service::create_item(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/items/{id}",
    params(("id" = Uuid, Path, description = "Item ID")),
    responses(
        (status = 200, description = "Item with seller, comments and favorites", body = ApiResponse<ItemDetail>),
        (status = 404, description = "Item not found"),
    ),
    tag = "Items"
)]
pub async fn get_item(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ItemDetail>>> {
    let resp = item_service::get_item(&state, user.as_ref(), id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/items/{id}",
    params(("id" = Uuid, Path, description = "Item ID")),
    request_body = UpdateItemRequest,
    responses(
        (status = 200, description = "Edit a listing", body = ApiResponse<Item>),
        (status = 403, description = "Not the seller"),
        (status = 404, description = "Item not found"),
        (status = 409, description = "Item already purchased"),
    ),
    security(("bearer_auth" = [])),
    tag = "Items"
)]
pub async fn update_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateItemRequest>,
) -> AppResult<Json<ApiResponse<Item>>> {
    let resp = item_service::update_item(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/items/{id}",
    params(("id" = Uuid, Path, description = "Item ID")),
    responses(
        (status = 200, description = "Delete a listing", body = ApiResponse<Deleted>),
        (status = 403, description = "Not the seller"),
        (status = 404, description = "Item not found"),
        (status = 409, description = "Item already purchased"),
    ),
    security(("bearer_auth" = [])),
    tag = "Items"
)]
pub async fn delete_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Deleted>>> {
    let resp = item_service::delete_item(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/items/{id}/comments",
    params(("id" = Uuid, Path, description = "Item ID")),
    request_body = CommentRequest,
    responses(
        (status = 200, description = "Comment on a listing", body = ApiResponse<Comment>),
        (status = 404, description = "Item not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Items"
)]
pub async fn post_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CommentRequest>,
) -> AppResult<Json<ApiResponse<Comment>>> {
    let resp = item_service::post_comment(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/items/{id}/favorite",
    params(("id" = Uuid, Path, description = "Item ID")),
    responses(
        (status = 200, description = "Toggle favorite", body = ApiResponse<FavoriteState>),
        (status = 404, description = "Item not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Items"
)]
pub async fn toggle_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<FavoriteState>>> {
    let resp = user_service::toggle_favorite(&state, &user, id).await?;
    Ok(Json(resp))
}

/// Multipart upload with a single `file` part.
#[utoipa::path(
    post,
    path = "/items/images",
    request_body(
        content = Vec<u8>,
        content_type = "multipart/form-data",
        description = "PNG or JPEG in a `file` part"
    ),
    responses(
        (status = 200, description = "Image stored", body = ApiResponse<UploadedImage>),
        (status = 400, description = "Missing or unsupported image"),
        (status = 413, description = "Payload too large"),
    ),
    security(("bearer_auth" = [])),
    tag = "Items"
)]
pub async fn upload_image(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> AppResult<Json<ApiResponse<UploadedImage>>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::BadRequest(err.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_default();
        let bytes = field
            .bytes()
            .await
            .map_err(|err| AppError::BadRequest(err.body_text()))?;
        let resp = image_service::upload_image(&state, &user, bytes.to_vec(), content_type).await?;
        return Ok(Json(resp));
    }
    Err(AppError::BadRequest("missing file part".into()))
}
