//! QR token issuance and verification.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use fuelraffle_core::PipelineError;
use fuelraffle_sdk::objects::{GenerateQrRequest, GenerateQrResponse, VerifyQrRequest};
use fuelraffle_sdk::signature::QrPayload;

use crate::api::error::ApiError;
use crate::api::extractors::AdminAuth;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/qr/generate", post(generate_qr))
        .route("/qr/verify", post(verify_qr))
}

/// `POST /qr/generate`: sign a token for a dispenser display.
///
/// `expiration_hours` defaults to the configured value and is bounded by the
/// configured maximum.
async fn generate_qr(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Json(request): Json<GenerateQrRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let hours = request
        .expiration_hours
        .unwrap_or(state.default_expiration_hours);
    let token = state
        .signer
        .sign(request.station_id, request.dispenser_id, hours)?;

    tracing::info!(
        station_id = %request.station_id,
        dispenser_id = %request.dispenser_id,
        expires_at = token.payload.expires_at,
        "QR token issued"
    );

    Ok((
        StatusCode::CREATED,
        Json(GenerateQrResponse {
            content: token.content(),
            payload: token.payload,
        }),
    ))
}

/// `POST /qr/verify`: return the payload of a valid, unexpired token.
async fn verify_qr(
    State(state): State<AppState>,
    Json(request): Json<VerifyQrRequest>,
) -> Result<Json<QrPayload>, ApiError> {
    let payload = state
        .signer
        .verify(&request.content)
        .map_err(PipelineError::from)?;
    Ok(Json(payload))
}
