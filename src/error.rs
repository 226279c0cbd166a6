// src/error.rs
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Terminal failure categories for one streaming turn.
///
/// Malformed frames are not represented here: a `data:` line that fails to
/// parse is kept in the pending buffer and retried once more bytes arrive,
/// so it never surfaces as an error.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Rate limited by the completion API")]
    RateLimited,
    #[error("Insufficient credits on the completion API")]
    QuotaExceeded,
    #[error("Completion API failure (status {status})")]
    UpstreamFailure { status: u16 },
    #[error("Network failure: {0}")]
    NetworkFailure(String),
    #[error("Turn cancelled")]
    Cancelled,
}

impl RelayError {
    /// Stable category identifier surfaced to the browser.
    pub fn category(&self) -> &'static str {
        match self {
            RelayError::RateLimited => "rate_limited",
            RelayError::QuotaExceeded => "quota_exceeded",
            RelayError::UpstreamFailure { .. } => "upstream_failure",
            RelayError::NetworkFailure(_) => "network_failure",
            RelayError::Cancelled => "cancelled",
        }
    }

    /// Short notice shown to the user when the turn fails.
    pub fn notice(&self) -> &'static str {
        match self {
            RelayError::RateLimited => "Request limit exceeded. Try again in a moment.",
            RelayError::QuotaExceeded => "Insufficient credits. Add credits to the workspace.",
            RelayError::UpstreamFailure { .. } => "Failed to run the analysis.",
            RelayError::NetworkFailure(_) => "Connection to the analysis service was lost.",
            RelayError::Cancelled => "The analysis was cancelled.",
        }
    }
}

/// Request-level failures mapped onto HTTP responses by the handlers.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Chat session {0} not found")]
    SessionNotFound(uuid::Uuid),
    #[error("A reply is already being generated for this session")]
    TurnInFlight,
    #[error("No dataset at index {0}")]
    DatasetNotFound(usize),
    #[error("Spreadsheet is empty or unreadable")]
    EmptyDataset,
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),
    #[error("Completion API is not configured")]
    UpstreamNotConfigured,
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Relay(#[from] RelayError),
}

impl ServiceError {
    fn status(&self) -> StatusCode {
        match self {
            ServiceError::SessionNotFound(_) | ServiceError::DatasetNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ServiceError::TurnInFlight => StatusCode::CONFLICT,
            ServiceError::EmptyDataset | ServiceError::UnsupportedFormat(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ServiceError::UpstreamNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::Relay(RelayError::RateLimited) => StatusCode::TOO_MANY_REQUESTS,
            ServiceError::Relay(RelayError::QuotaExceeded) => StatusCode::PAYMENT_REQUIRED,
            ServiceError::Relay(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        } else {
            tracing::warn!("request rejected: {}", self);
        }
        let body = Json(json!({
            "success": false,
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_error_categories_are_stable() {
        assert_eq!(RelayError::RateLimited.category(), "rate_limited");
        assert_eq!(RelayError::QuotaExceeded.category(), "quota_exceeded");
        assert_eq!(
            RelayError::UpstreamFailure { status: 500 }.category(),
            "upstream_failure"
        );
    }

    #[test]
    fn relay_errors_map_to_http_statuses() {
        assert_eq!(
            ServiceError::Relay(RelayError::RateLimited).status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ServiceError::Relay(RelayError::QuotaExceeded).status(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(ServiceError::TurnInFlight.status(), StatusCode::CONFLICT);
    }
}
