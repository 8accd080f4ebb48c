//! Error envelope returned by every route.
//!
//! All failures render as `{"error": <code>, "message": <text>}` with the
//! status chosen by the variant. Upstream failures are the exception: their
//! status is relayed and their JSON body passed through when it parses.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No tenant context on request")]
    MissingTenant,

    #[error("Session token is invalid")]
    InvalidSession,

    #[error("Session has expired")]
    SessionExpired,

    #[error("{0}")]
    BadRequest(String),

    #[error("Tenant is not entitled to {0}")]
    NotEntitled(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Too many requests")]
    RateLimited,

    #[error("Upstream responded with {status}")]
    Upstream { status: StatusCode, body: Value },

    #[error("Bad gateway: {0}")]
    BadGateway(String),

    #[error("Upstream unavailable: {0}")]
    Unavailable(String),

    #[error("{0} is not configured")]
    NotConfigured(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingTenant | Self::InvalidSession | Self::SessionExpired => {
                StatusCode::UNAUTHORIZED
            }
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotEntitled(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Upstream { status, .. } => *status,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Self::Unavailable(_) | Self::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code placed in the `error` field.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingTenant => "missing_tenant",
            Self::InvalidSession => "invalid_session",
            Self::SessionExpired => "session_expired",
            Self::BadRequest(_) => "bad_request",
            Self::NotEntitled(_) => "not_entitled",
            Self::NotFound(_) => "not_found",
            Self::RateLimited => "rate_limited",
            Self::Upstream { .. } => "upstream_error",
            Self::BadGateway(_) => "bad_gateway",
            Self::Unavailable(_) => "upstream_unavailable",
            Self::NotConfigured(_) => "not_configured",
            Self::Internal(_) => "internal_error",
        }
    }

    pub fn internal(e: impl std::fmt::Display) -> Self {
        Self::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::Upstream { body, .. } => body,
            Self::Internal(msg) => {
                // Full detail stays in the logs; clients get a generic message.
                tracing::error!("Internal error: {}", msg);
                json!({ "error": "internal_error", "message": "Internal server error" })
            }
            other => json!({ "error": other.code(), "message": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self::Internal(format!("{:#}", e))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        Self::BadRequest(e.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_are_unauthorized() {
        assert_eq!(ApiError::MissingTenant.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::InvalidSession.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::SessionExpired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::MissingTenant.code(), "missing_tenant");
    }

    #[test]
    fn upstream_error_keeps_its_status() {
        let err = ApiError::Upstream {
            status: StatusCode::CONFLICT,
            body: json!({ "error": "duplicate" }),
        };
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn unavailable_and_not_configured_are_503() {
        assert_eq!(
            ApiError::Unavailable("agent".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::NotConfigured("OpenAI".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
