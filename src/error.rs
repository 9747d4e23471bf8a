use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::clients::ClientError;
use crate::response::{ApiResponse, Meta};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not Found")]
    NotFound,

    #[error("Bad Request {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Item not found")]
    ItemNotFound,

    #[error("Payment not completed")]
    PaymentNotCompleted,

    #[error("Item already purchased")]
    ItemAlreadyPurchased,

    #[error("Insufficient points")]
    InsufficientPoints,

    #[error("Item not available for point purchase")]
    PointsNotAccepted,

    #[error("Account suspended")]
    AccountSuspended,

    #[error("Order expired")]
    OrderExpired,

    #[error("Upstream service error")]
    Upstream(#[from] ClientError),

    #[error("Database error")]
    DbError(#[from] sqlx::Error),

    #[error("ORM error")]
    OrmError(#[from] sea_orm::DbErr),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable tag returned in the error body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound => "NotFound",
            AppError::BadRequest(_) => "BadRequest",
            AppError::Unauthorized => "Unauthorized",
            AppError::Forbidden => "Forbidden",
            AppError::ItemNotFound => "ItemNotFound",
            AppError::PaymentNotCompleted => "PaymentNotCompleted",
            AppError::ItemAlreadyPurchased => "ItemAlreadyPurchased",
            AppError::InsufficientPoints => "InsufficientPoints",
            AppError::PointsNotAccepted => "PointsNotAccepted",
            AppError::AccountSuspended => "AccountSuspended",
            AppError::OrderExpired => "OrderExpired",
            AppError::Upstream(_) => "Upstream",
            AppError::DbError(_) | AppError::OrmError(_) | AppError::Internal(_) => "Internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound | AppError::ItemNotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::PaymentNotCompleted => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden
            | AppError::AccountSuspended
            | AppError::InsufficientPoints
            | AppError::PointsNotAccepted => StatusCode::FORBIDDEN,
            AppError::ItemAlreadyPurchased => StatusCode::CONFLICT,
            AppError::OrderExpired => StatusCode::GONE,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::DbError(_) | AppError::OrmError(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorData {
    error: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        }

        let body = ApiResponse {
            status: "error".to_string(),
            message: self.to_string(),
            data: Some(ErrorData { error: self.code() }),
            meta: Some(Meta::empty()),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_client_statuses() {
        assert_eq!(AppError::ItemAlreadyPurchased.status(), StatusCode::CONFLICT);
        assert_eq!(AppError::AccountSuspended.status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::ItemNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::PaymentNotCompleted.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::OrderExpired.status(), StatusCode::GONE);
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = AppError::Internal(anyhow::anyhow!("connection refused to 10.0.0.3"));
        assert_eq!(err.code(), "Internal");
        assert_eq!(err.to_string(), "Internal Server Error");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
