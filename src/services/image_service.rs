use chrono::Utc;
use image::{ImageFormat, codecs::jpeg::JpegEncoder, imageops::FilterType};
use sea_orm::{ActiveModelTrait, Set};
use uuid::Uuid;

use crate::{
    clients::storage::image_key,
    dto::items::UploadedImage,
    entity::images::ActiveModel as ImageActive,
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    response::{ApiResponse, Meta},
    services::active_user,
    state::AppState,
};

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const MAX_DIMENSION: u32 = 1280;
pub const JPEG_QUALITY: u8 = 85;
const STORED_FORMAT: &str = "jpg";

fn accepted_format(content_type: &str) -> AppResult<ImageFormat> {
    match content_type {
        "image/png" => Ok(ImageFormat::Png),
        "image/jpeg" | "image/jpg" => Ok(ImageFormat::Jpeg),
        other => Err(AppError::BadRequest(format!(
            "unsupported image type: {other}"
        ))),
    }
}

/// Decodes a PNG or JPEG upload, shrinks it to fit `MAX_DIMENSION` and
/// re-encodes it as JPEG.
pub fn reencode(bytes: &[u8], content_type: &str) -> AppResult<Vec<u8>> {
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::BadRequest("image exceeds 10 MiB".into()));
    }
    let format = accepted_format(content_type)?;
    let decoded = image::load_from_memory_with_format(bytes, format)
        .map_err(|_| AppError::BadRequest("unreadable image".into()))?;

    let resized = if decoded.width() > MAX_DIMENSION || decoded.height() > MAX_DIMENSION {
        decoded.resize(MAX_DIMENSION, MAX_DIMENSION, FilterType::Lanczos3)
    } else {
        decoded
    };

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
        .encode_image(&resized.to_rgb8())
        .map_err(|e| AppError::Internal(e.into()))?;
    Ok(out)
}

pub async fn upload_image(
    state: &AppState,
    user: &AuthUser,
    bytes: Vec<u8>,
    content_type: String,
) -> AppResult<ApiResponse<UploadedImage>> {
    active_user(&state.orm, user.user_id).await?;

    let encoded = tokio::task::spawn_blocking(move || reencode(&bytes, &content_type))
        .await
        .map_err(|e| AppError::Internal(e.into()))??;

    let id = Uuid::new_v4();
    state
        .storage
        .put(&image_key(id, STORED_FORMAT), encoded, "image/jpeg")
        .await?;

    ImageActive {
        id: Set(id),
        user_id: Set(user.user_id),
        item_id: Set(None),
        format: Set(STORED_FORMAT.to_string()),
        position: Set(0),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;

    tracing::debug!(image_id = %id, user_id = %user.user_id, "image uploaded");

    Ok(ApiResponse::success(
        "Image uploaded",
        UploadedImage {
            id,
            url: state.storage.image_url(id, STORED_FORMAT),
        },
        Some(Meta::empty()),
    ))
}
