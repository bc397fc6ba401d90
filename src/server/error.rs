//! Error responses with a JSON `{"error": ...}` body

use crate::error::ResizerError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl ResizerError {
    /// HTTP status for this error
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            ResizerError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ResizerError::BudgetUnreachable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ResizerError::BackgroundRemovalUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            other if other.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ResizerError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            tracing::error!(error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
            self.to_string()
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ResizerError::MissingImage.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ResizerError::unsupported_format("gif").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ResizerError::PayloadTooLarge { limit_bytes: 10 }.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ResizerError::BudgetUnreachable {
                target_bytes: 1,
                smallest_bytes: 2
            }
            .status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ResizerError::BackgroundRemovalUnavailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ResizerError::inference("boom").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_details_are_not_leaked() {
        let response = ResizerError::internal("secret path /srv/x").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
