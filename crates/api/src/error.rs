//! Error responses for the booking API.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use slotgate_common::SlotgateError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] SlotgateError),

    #[error("{0}")]
    BadRequest(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    pub status: u16,
    pub error_code: &'static str,
    pub timestamp: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Domain(e) => match e {
                SlotgateError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
                SlotgateError::ProviderUnavailable(_) | SlotgateError::InvalidSlot(_) => {
                    StatusCode::BAD_REQUEST
                }
                SlotgateError::ScheduleConflict(_) => StatusCode::CONFLICT,
                SlotgateError::NotFound(_) => StatusCode::NOT_FOUND,
                SlotgateError::Forbidden(_) => StatusCode::FORBIDDEN,
                SlotgateError::Unauthenticated => StatusCode::UNAUTHORIZED,
                SlotgateError::Config(_)
                | SlotgateError::Io(_)
                | SlotgateError::Serde(_)
                | SlotgateError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Domain(e) => e.code(),
        }
    }

    fn is_caller_facing(&self) -> bool {
        match self {
            ApiError::BadRequest(_) => true,
            ApiError::Domain(e) => e.is_caller_facing(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let message = if self.is_caller_facing() {
            tracing::warn!(status = status.as_u16(), code, message = %self, "request rejected");
            self.to_string()
        } else {
            tracing::error!(status = status.as_u16(), code, error = %self, "request failed");
            "An unexpected error occurred".to_string()
        };

        let body = ErrorBody {
            success: false,
            message,
            status: status.as_u16(),
            error_code: code,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        let mut response = (status, Json(body)).into_response();
        if let ApiError::Domain(SlotgateError::RateLimitExceeded {
            retry_after_secs, ..
        }) = self
        {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}
