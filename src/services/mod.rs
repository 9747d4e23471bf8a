use sea_orm::{ConnectionTrait, EntityTrait};
use uuid::Uuid;

use crate::{
    entity::{Users, users},
    error::{AppError, AppResult},
};

pub mod admin_service;
pub mod image_service;
pub mod item_service;
pub mod order_service;
pub mod purchase_service;
pub mod search_sync;
pub mod user_service;

/// Loads the caller's account, rejecting suspended users.
pub(crate) async fn active_user<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> AppResult<users::Model> {
    let user = Users::find_by_id(user_id)
        .one(conn)
        .await?
        .ok_or(AppError::Unauthorized)?;
    if user.suspended {
        return Err(AppError::AccountSuspended);
    }
    Ok(user)
}

/// Trims `text` and rejects it when nothing is left.
pub(crate) fn required_text(text: &str, field: &str) -> AppResult<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}
