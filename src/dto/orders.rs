use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Address, Chat, Item, Order, Review};

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReviewRequest {
    /// `true` for a good rating.
    pub rating: bool,
    pub text: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TrackingRequest {
    pub tracking: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChatRequest {
    pub text: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderDetail {
    pub order: Order,
    pub item: Item,
    pub address: Option<Address>,
    pub reviews: Vec<Review>,
    pub chats: Vec<Chat>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChatList {
    pub items: Vec<Chat>,
}
