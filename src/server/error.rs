use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::ScopeError;

/// Error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub ScopeError);

impl AppError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ScopeError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ScopeError::MissingCredential(_) | ScopeError::AllProbesFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
            ScopeError::DigestTooLarge { .. }
            | ScopeError::Storage(_)
            | ScopeError::ReportUnavailable(_)
            | ScopeError::Io(_)
            | ScopeError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("Request failed ({}): {}", status, self.0);
        }
        let body = serde_json::json!({ "success": false, "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl From<ScopeError> for AppError {
    fn from(err: ScopeError) -> Self {
        Self(err)
    }
}
