use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    clients::search::ItemDocument,
    models::{Comment, Item, User},
};

pub const MAX_IMAGES: usize = 10;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateItemRequest {
    pub name: String,
    pub description: String,
    pub condition: String,
    pub shipping: String,
    pub delivery_days: i32,
    pub category: i32,
    pub price: i64,
    #[serde(default)]
    pub accepts_points: bool,
    #[serde(default)]
    pub processor_opt_out: bool,
    /// Ids returned by the upload endpoint, in display order.
    pub images: Vec<Uuid>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateItemRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub condition: Option<String>,
    pub shipping: Option<String>,
    pub delivery_days: Option<i32>,
    pub category: Option<i32>,
    pub price: Option<i64>,
    pub accepts_points: Option<bool>,
    pub processor_opt_out: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CommentRequest {
    pub text: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct ItemList {
    #[schema(value_type = Vec<Item>)]
    pub items: Vec<Item>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ItemDetail {
    pub item: Item,
    pub seller: User,
    pub favorites: i64,
    /// Whether the caller has favorited the item; false when anonymous.
    pub favorited: bool,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct SearchHits {
    #[schema(value_type = Vec<ItemDocument>)]
    pub items: Vec<ItemDocument>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadedImage {
    pub id: Uuid,
    pub url: String,
}
