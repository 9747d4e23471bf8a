use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{addresses, chats, comments, orders, reports, reviews, users};

/// What anyone can see about a user.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The signed-in user's own account.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub points: i64,
    pub suspended: bool,
    pub role: String,
    pub payout_connected: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ImageRef {
    pub id: Uuid,
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Item {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: String,
    pub condition: String,
    pub shipping: String,
    pub delivery_days: i32,
    pub category: i32,
    /// Category names from the top level down.
    pub category_path: Vec<String>,
    pub price: i64,
    pub accepts_points: bool,
    pub processor_opt_out: bool,
    pub sold: bool,
    pub images: Vec<ImageRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub item_id: Uuid,
    pub address_id: Uuid,
    pub session_id: Option<String>,
    /// Set while a manual payment is outstanding.
    pub expires_at: Option<DateTime<Utc>>,
    pub shipped: bool,
    pub complete: bool,
    pub tracking: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Address {
    pub id: Uuid,
    pub zip: String,
    pub prefecture: String,
    pub city: String,
    pub street: String,
    pub building: Option<String>,
    pub phone: String,
    pub last_name: String,
    pub first_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Comment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub item_id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Chat {
    pub id: Uuid,
    pub user_id: Uuid,
    pub order_id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Review {
    pub id: Uuid,
    pub user_id: Uuid,
    pub target_user_id: Uuid,
    pub item_id: Uuid,
    pub order_id: Uuid,
    pub rating: bool,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Report {
    pub id: Uuid,
    pub user_id: Uuid,
    pub item_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            avatar_url: model.avatar_url,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

impl From<users::Model> for Account {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            avatar_url: model.avatar_url,
            points: model.points,
            suspended: model.suspended,
            role: model.role,
            payout_connected: model.payout_account_id.is_some(),
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

impl From<orders::Model> for Order {
    fn from(model: orders::Model) -> Self {
        Self {
            id: model.id,
            buyer_id: model.user_id,
            item_id: model.item_id,
            address_id: model.address_id,
            session_id: model.session_id,
            expires_at: model.expires_at.map(|dt| dt.with_timezone(&Utc)),
            shipped: model.shipped,
            complete: model.complete,
            tracking: model.tracking,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

impl From<addresses::Model> for Address {
    fn from(model: addresses::Model) -> Self {
        Self {
            id: model.id,
            zip: model.zip,
            prefecture: model.prefecture,
            city: model.city,
            street: model.street,
            building: model.building,
            phone: model.phone,
            last_name: model.last_name,
            first_name: model.first_name,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

impl From<comments::Model> for Comment {
    fn from(model: comments::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            item_id: model.item_id,
            text: model.text,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

impl From<chats::Model> for Chat {
    fn from(model: chats::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            order_id: model.order_id,
            text: model.text,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

impl From<reviews::Model> for Review {
    fn from(model: reviews::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            target_user_id: model.target_user_id,
            item_id: model.item_id,
            order_id: model.order_id,
            rating: model.rating,
            text: model.text,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

impl From<reports::Model> for Report {
    fn from(model: reports::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            item_id: model.item_id,
            order_id: model.order_id,
            text: model.text,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}
