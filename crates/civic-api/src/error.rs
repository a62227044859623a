//! API error type and its HTTP mapping

use axum::{
    Json,
    extract::rejection::JsonRejection,
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] civic_core::Error),

    #[error("{0}")]
    BadRequest(String),

    #[error("Missing or invalid bearer token")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("Image too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Full address is required including region and pincode")]
    MissingAddress,

    #[error("No results found")]
    NoGeocodeResults,

    #[error("Upstream service failed: {0}")]
    Upstream(String),
}

/// Error body: `{"error": "..."}` plus an optional hint for the geocoder
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    example: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    suggestion: Option<&'static str>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        use civic_core::Error as Core;
        match self {
            ApiError::Core(e) if e.is_validation() => StatusCode::BAD_REQUEST,
            ApiError::Core(Core::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Core(Core::Conflict(_) | Core::AlreadyExists(_)) => StatusCode::CONFLICT,
            ApiError::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) | ApiError::MissingAddress => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::NoGeocodeResults => StatusCode::NOT_FOUND,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            match &self {
                ApiError::Upstream(_) => self.to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            self.to_string()
        };

        let body = ErrorBody {
            error,
            example: matches!(self, ApiError::MissingAddress)
                .then_some("123 Main St, Bangalore 560001, Karnataka, India"),
            suggestion: matches!(self, ApiError::NoGeocodeResults).then_some(
                "Try format: 'Landmark, Village, Pincode' like 'Dharodi, Parner 414305'",
            ),
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Upstream(e.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use civic_core::Error as Core;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::from(Core::NotFound("x".into())), StatusCode::NOT_FOUND),
            (ApiError::from(Core::Validation("x".into())), StatusCode::BAD_REQUEST),
            (ApiError::from(Core::InvalidStatus("closed".into())), StatusCode::BAD_REQUEST),
            (ApiError::from(Core::InvalidLocation("x".into())), StatusCode::BAD_REQUEST),
            (ApiError::from(Core::Conflict("x".into())), StatusCode::CONFLICT),
            (ApiError::from(Core::Storage("x".into())), StatusCode::INTERNAL_SERVER_ERROR),
            (ApiError::Unauthorized, StatusCode::UNAUTHORIZED),
            (ApiError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (ApiError::PayloadTooLarge { size: 2, max: 1 }, StatusCode::PAYLOAD_TOO_LARGE),
            (ApiError::Upstream("x".into()), StatusCode::BAD_GATEWAY),
        ];
        for (error, status) in cases {
            assert_eq!(error.status(), status, "{error}");
        }
    }

    #[test]
    fn test_storage_error_is_500() {
        let response = ApiError::from(Core::Storage("disk on fire".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
