//! Conversion of engine and application errors into HTTP responses.
//!
//! Every error body has the same shape:
//! `{ "error": "<ERROR_CODE>", "message": "<text>" }`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{error, warn};

use referra_core::EngineError;
use referra_shared::AppError;

/// Result type for handlers.
pub type ApiResult<T> = Result<T, Response>;

fn error_body(status: StatusCode, code: &str, message: &str) -> Response {
    (status, Json(json!({ "error": code, "message": message }))).into_response()
}

/// Maps an engine error to its response.
///
/// Persistence failures are logged and reported without their details.
pub fn engine_error_response(err: EngineError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    match &err {
        EngineError::Persistence(detail) => {
            error!(error = %detail, "persistence failure");
            error_body(status, err.error_code(), "An internal error occurred")
        }
        EngineError::Unauthorized(_) => {
            warn!(error = %err, "re-authentication rejected");
            error_body(status, err.error_code(), &err.to_string())
        }
        _ => error_body(status, err.error_code(), &err.to_string()),
    }
}

/// Maps an application error to its response.
pub fn app_error_response(err: &AppError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    error_body(status, err.error_code(), &err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use referra_shared::types::{PartnerId, PayoutBatchId};
    use rstest::rstest;

    #[rstest]
    #[case(EngineError::Validation("bad".into()), StatusCode::BAD_REQUEST)]
    #[case(EngineError::StateConflict("no".into()), StatusCode::CONFLICT)]
    #[case(EngineError::TierLocked(PartnerId::new()), StatusCode::LOCKED)]
    #[case(EngineError::AlreadyCompleted(PayoutBatchId::new()), StatusCode::CONFLICT)]
    #[case(EngineError::NoEligiblePartners, StatusCode::UNPROCESSABLE_ENTITY)]
    #[case(EngineError::Unauthorized("wrong password".into()), StatusCode::UNAUTHORIZED)]
    #[case(EngineError::Persistence("connection reset".into()), StatusCode::INTERNAL_SERVER_ERROR)]
    fn test_engine_error_status(#[case] err: EngineError, #[case] expected: StatusCode) {
        assert_eq!(engine_error_response(err).status(), expected);
    }

    #[test]
    fn test_not_found_status() {
        let err = EngineError::not_found("deal", uuid::Uuid::nil());
        assert_eq!(engine_error_response(err).status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_app_error_status() {
        let response = app_error_response(&AppError::Forbidden("admins only".into()));
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
