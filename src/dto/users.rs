use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Address, Item, Review, User};

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddressRequest {
    pub zip: String,
    pub prefecture: String,
    pub city: String,
    pub street: String,
    pub building: Option<String>,
    pub phone: String,
    pub last_name: String,
    pub first_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AddressList {
    pub items: Vec<Address>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PublicProfile {
    pub user: User,
    /// Share of good reviews on a 0-5 scale.
    pub rating: f64,
    pub review_count: u64,
    pub reviews: Vec<Review>,
    pub items: Vec<Item>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FavoriteState {
    pub item_id: Uuid,
    pub favorited: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReportRequest {
    pub item_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub text: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Balance {
    pub points: i64,
}
