//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use delivery::DeliveryError;
use ledger::LedgerError;
use saga::{ErrorKind, SagaError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request carried no owner identity.
    #[error("Missing x-user-id header")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// Failure reported by the saga or one of the engines.
    #[error(transparent)]
    Saga(#[from] SagaError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Saga(err) => match err.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::InsufficientResource | ErrorKind::InvalidState => StatusCode::CONFLICT,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Forbidden => StatusCode::FORBIDDEN,
                ErrorKind::RemoteUnavailable => StatusCode::SERVICE_UNAVAILABLE,
                ErrorKind::NotReady | ErrorKind::ForeignEvent | ErrorKind::Internal => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "internal server error");
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
        }

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Saga(err.into())
    }
}

impl From<DeliveryError> for ApiError {
    fn from(err: DeliveryError) -> Self {
        ApiError::Saga(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saga_kinds_map_to_statuses() {
        let cases = [
            (SagaError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (SagaError::InsufficientResource("x".into()), StatusCode::CONFLICT),
            (SagaError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (SagaError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (SagaError::InvalidState("x".into()), StatusCode::CONFLICT),
            (SagaError::RemoteUnavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (SagaError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_message_is_passed_through() {
        let err = ApiError::from(SagaError::Validation("Product not found: X".into()));
        assert_eq!(err.to_string(), "Product not found: X");
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_engine_errors_convert() {
        let err = ApiError::from(DeliveryError::NotFound("DEL-1".into()));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
