//! API error taxonomy
//!
//! Every failure the handlers can surface maps to one `ApiError` variant,
//! and every variant serializes to the same response envelope:
//! `{"success": false, "message": ..., "error": ...}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Auth(String),

    #[error("{0}")]
    NotFound(String),

    #[error("QR encoding failed: {0}")]
    Encoding(String),

    #[error("Failed to fetch logo: {0}")]
    LogoFetch(String),

    #[error("Artifact storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Encoding(_) => StatusCode::BAD_REQUEST,
            ApiError::LogoFetch(_) => StatusCode::BAD_REQUEST,
            ApiError::Storage(_) | ApiError::Database(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn message(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "Invalid request",
            ApiError::Auth(_) => "Unauthorized",
            ApiError::NotFound(_) => "Resource not found",
            ApiError::Encoding(_) => "Failed to generate QR code",
            ApiError::LogoFetch(_) => "Failed to embed logo",
            ApiError::Storage(_) | ApiError::Database(_) | ApiError::Internal(_) => {
                "Internal server error"
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // 500-class detail stays in the logs when running in production
        let detail = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
            let production = std::env::var("APP_ENV")
                .map(|v| v.eq_ignore_ascii_case("production"))
                .unwrap_or(false);
            if production {
                "Something went wrong".to_string()
            } else {
                self.to_string()
            }
        } else {
            self.to_string()
        };

        (
            status,
            Json(json!({
                "success": false,
                "message": self.message(),
                "error": detail,
            })),
        )
            .into_response()
    }
}

impl From<redb::Error> for ApiError {
    fn from(err: redb::Error) -> Self {
        ApiError::Database(err.to_string())
    }
}

impl From<redb::TransactionError> for ApiError {
    fn from(err: redb::TransactionError) -> Self {
        ApiError::Database(err.to_string())
    }
}

impl From<redb::TableError> for ApiError {
    fn from(err: redb::TableError) -> Self {
        ApiError::Database(err.to_string())
    }
}

impl From<redb::StorageError> for ApiError {
    fn from(err: redb::StorageError) -> Self {
        ApiError::Database(err.to_string())
    }
}

impl From<redb::CommitError> for ApiError {
    fn from(err: redb::CommitError) -> Self {
        ApiError::Database(err.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::Storage(err.to_string())
    }
}

impl From<image::ImageError> for ApiError {
    fn from(err: image::ImageError) -> Self {
        ApiError::Internal(format!("image encoding: {}", err))
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Database(format!("record serialization: {}", err))
    }
}
