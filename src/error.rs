use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::advisory::AdvisoryError;
use crate::chart::ChartError;
use crate::inference::SegmentationError;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Advisory service error: {0}")]
    Upstream(String),
}

impl AppError {
    /// Returns the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Config(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Returns a machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::NotFound(_) => "NOT_FOUND",
            Self::ModelUnavailable(_) => "MODEL_UNAVAILABLE",
            Self::Upstream(_) => "UPSTREAM_ERROR",
        }
    }
}

impl From<SegmentationError> for AppError {
    fn from(err: SegmentationError) -> Self {
        match err {
            SegmentationError::InvalidImage(msg) => AppError::BadRequest(msg),
            SegmentationError::ModelUnavailable(msg) => AppError::ModelUnavailable(msg),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<AdvisoryError> for AppError {
    fn from(err: AdvisoryError) -> Self {
        match err {
            AdvisoryError::InvalidCredential(msg) => AppError::Internal(msg),
            other => AppError::Upstream(other.to_string()),
        }
    }
}

impl From<ChartError> for AppError {
    fn from(err: ChartError) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Error response body structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.code(),
                message: self.to_string(),
            },
        };

        let json = serde_json::to_string(&body).unwrap_or_else(|_| {
            r#"{"error":{"code":"INTERNAL_ERROR","message":"Failed to serialize error"}}"#
                .to_string()
        });
        (status, [("content-type", "application/json")], json).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::ModelUnavailable("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::Upstream("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_invalid_image_maps_to_bad_request() {
        let err: AppError = SegmentationError::InvalidImage("corrupt".into()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_advisory_failure_maps_to_bad_gateway() {
        let err: AppError = AdvisoryError::RateLimited.into();
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.code(), "UPSTREAM_ERROR");
    }
}
