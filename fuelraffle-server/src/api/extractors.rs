//! Custom Axum extractors for request authentication.
//!
//! Provides `AdminAuth`, which checks the `Fuelraffle-Admin-Authorization`
//! header against the argon2 hash of the configured admin secret.

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Response},
};
use fuelraffle_sdk::objects::ErrorCode;
use fuelraffle_sdk::signature::ADMIN_AUTH_HEADER;

use crate::api::error::error_response;
use crate::state::AppState;

/// Proof that the request carried the admin secret.
///
/// # Header format
///
/// ```text
/// Fuelraffle-Admin-Authorization: {plaintext_admin_secret}
/// ```
pub struct AdminAuth;

/// Errors returned by the [`AdminAuth`] extractor.
#[derive(Debug)]
pub enum AdminAuthError {
    MissingHeader,
    InvalidHeader,
    Rejected,
    /// The stored hash could not be parsed or the check did not finish.
    Internal(String),
}

impl IntoResponse for AdminAuthError {
    fn into_response(self) -> Response {
        match self {
            AdminAuthError::MissingHeader => error_response(
                ErrorCode::Unauthorized,
                format!("missing {ADMIN_AUTH_HEADER} header"),
            ),
            AdminAuthError::InvalidHeader => error_response(
                ErrorCode::BadRequest,
                format!("invalid {ADMIN_AUTH_HEADER} header"),
            ),
            AdminAuthError::Rejected => {
                error_response(ErrorCode::Unauthorized, "admin secret rejected")
            }
            AdminAuthError::Internal(e) => {
                tracing::error!(error = %e, "Admin secret verification failed");
                error_response(ErrorCode::Internal, "internal server error")
            }
        }
    }
}

impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = AdminAuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let secret = parts
            .headers
            .get(ADMIN_AUTH_HEADER)
            .ok_or(AdminAuthError::MissingHeader)?
            .to_str()
            .map_err(|_| AdminAuthError::InvalidHeader)?
            .to_owned();

        let hash = state.admin.read().await.secret_hash().to_owned();

        // Argon2 verification blocks.
        let verified = tokio::task::spawn_blocking(move || verify_secret(&secret, &hash))
            .await
            .map_err(|e| AdminAuthError::Internal(e.to_string()))??;

        if verified {
            Ok(AdminAuth)
        } else {
            tracing::warn!("Rejected admin request with a wrong secret");
            Err(AdminAuthError::Rejected)
        }
    }
}

fn verify_secret(secret: &str, hash: &str) -> Result<bool, AdminAuthError> {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};

    let parsed = PasswordHash::new(hash).map_err(|e| AdminAuthError::Internal(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(secret.as_bytes(), &parsed)
        .is_ok())
}
