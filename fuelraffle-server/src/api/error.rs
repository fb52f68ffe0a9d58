//! Mapping of pipeline failures to HTTP responses.
//!
//! Every error body is an [`ErrorResponse`] so front-ends can switch on the
//! code. Internal details are logged, never returned.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use fuelraffle_core::PipelineError;
use fuelraffle_core::events::BusError;
use fuelraffle_sdk::objects::{ErrorCode, ErrorResponse};
use fuelraffle_sdk::signature::SigningError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("event bus error: {0}")]
    Bus(#[from] BusError),

    #[error(transparent)]
    Signing(#[from] SigningError),

    #[error("{0}")]
    BadRequest(String),
}

pub(crate) fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidCode | ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
        ErrorCode::ExpiredCode => StatusCode::GONE,
        ErrorCode::AlreadyUsed | ErrorCode::StateConflict => StatusCode::CONFLICT,
        ErrorCode::NotYetEligible => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// An error body with the status its code maps to.
pub(crate) fn error_response(code: ErrorCode, message: impl Into<String>) -> Response {
    (
        status_for(code),
        Json(ErrorResponse {
            code,
            message: message.into(),
        }),
    )
        .into_response()
}

impl ApiError {
    fn code(&self) -> ErrorCode {
        match self {
            ApiError::Pipeline(e) => e.error_code(),
            ApiError::Bus(_) => ErrorCode::Internal,
            ApiError::Signing(SigningError::InvalidExpiration { .. }) => ErrorCode::BadRequest,
            ApiError::Signing(SigningError::Serialize(_)) => ErrorCode::Internal,
            ApiError::BadRequest(_) => ErrorCode::BadRequest,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.code();
        if code == ErrorCode::Internal {
            tracing::error!(error = %self, "API request failed");
            return error_response(code, "internal server error");
        }
        tracing::debug!(error = %self, ?code, "API request rejected");
        error_response(code, self.to_string())
    }
}
