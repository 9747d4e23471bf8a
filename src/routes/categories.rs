use axum::{
    Json, Router,
    extract::{Path, Query},
    routing::get,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::{
    category,
    dto::categories::{CategoryList, CategoryNode},
    error::{AppError, AppResult},
    response::{ApiResponse, Meta},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories))
        .route("/{id}", get(get_category))
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CategoryQuery {
    /// Include every level instead of only the top level.
    pub all: Option<bool>,
}

#[utoipa::path(
    get,
    path = "/categories",
    params(CategoryQuery),
    responses((status = 200, description = "Category tree", body = ApiResponse<CategoryList>)),
    tag = "Categories"
)]
pub async fn list_categories(
    Query(query): Query<CategoryQuery>,
) -> Json<ApiResponse<CategoryList>> {
    let categories = if query.all.unwrap_or(false) {
        category::all()
    } else {
        category::top_level()
    };
    let items = categories
        .into_iter()
        .filter_map(|c| CategoryNode::lookup(c.id))
        .collect();

    Json(ApiResponse::success(
        "Categories",
        CategoryList { items },
        Some(Meta::empty()),
    ))
}

#[utoipa::path(
    get,
    path = "/categories/{id}",
    params(("id" = u32, Path, description = "Category code")),
    responses(
        (status = 200, description = "Category with its path and children", body = ApiResponse<CategoryNode>),
        (status = 404, description = "Unknown category"),
    ),
    tag = "Categories"
)]
pub async fn get_category(Path(id): Path<u32>) -> AppResult<Json<ApiResponse<CategoryNode>>> {
    let node = CategoryNode::lookup(id).ok_or(AppError::NotFound)?;
    Ok(Json(ApiResponse::success(
        "Category",
        node,
        Some(Meta::empty()),
    )))
}
