use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{debug, error};

use crate::google_drive::DriveError;

/// Every failure a route can answer with. Rendered as `status + {"message"}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Google OAuth is not configured")]
    OAuthUnavailable,
    #[error("{0}")]
    Upstream(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn unauthorized() -> Self {
        ApiError::Unauthorized("Unauthorized".to_string())
    }

    /// Like the `From<DriveError>` conversion, except that a missing entry
    /// is a 404. Only single-entry lookups use this.
    pub fn from_lookup(error: DriveError) -> Self {
        match error {
            DriveError::NotFound(id) => ApiError::NotFound(format!("File not found: {}", id)),
            other => other.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::OAuthUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DriveError> for ApiError {
    fn from(error: DriveError) -> Self {
        match error {
            DriveError::TokenExpired => ApiError::Unauthorized(DriveError::TokenExpired.to_string()),
            DriveError::Other(e) => ApiError::Upstream(format!("{:#}", e)),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("request failed: {}", self);
        } else {
            debug!("request rejected ({}): {}", status, self);
        }
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::google_drive::DriveId;

    #[test]
    fn not_found_is_404_only_for_lookups() {
        let lookup = ApiError::from_lookup(DriveError::NotFound(DriveId::from("x")));
        assert_eq!(lookup.status(), StatusCode::NOT_FOUND);
        let other: ApiError = DriveError::NotFound(DriveId::from("x")).into();
        assert_eq!(other.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn upstream_message_is_forwarded() {
        let error: ApiError = DriveError::Api {
            status: 403,
            message: "Rate Limit Exceeded".to_string(),
        }
        .into();
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.to_string(), "Rate Limit Exceeded");
    }

    #[test]
    fn expired_tokens_are_unauthorized() {
        let error: ApiError = DriveError::TokenExpired.into();
        assert_eq!(error.status(), StatusCode::UNAUTHORIZED);
    }
}
