//! Winner claim flow.
//!
//! These endpoints are driven by the claim desk and the delivery
//! collaborator. Every change publishes `raffle.winner.updated`.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use fuelraffle_core::lifecycle::DeliveryInfo;
use fuelraffle_sdk::objects::{
    ClaimRequest, DeliveryInfoRequest, DeliveryStatusRequest, VerifyWinnerRequest, WinnerResponse,
};
use time::OffsetDateTime;
use uuid::Uuid;

use super::winner_to_response;
use crate::api::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/winners/{winner_id}", get(get_winner))
        .route("/winners/{winner_id}/claim", post(claim))
        .route("/winners/{winner_id}/verify", post(verify))
        .route("/winners/{winner_id}/forfeit", post(forfeit))
        .route("/winners/{winner_id}/delivery", post(set_delivery_info))
        .route(
            "/winners/{winner_id}/delivery-status",
            post(update_delivery_status),
        )
}

async fn get_winner(
    State(state): State<AppState>,
    Path(winner_id): Path<Uuid>,
) -> Result<Json<WinnerResponse>, ApiError> {
    let winner = state.claims.winner(winner_id).await?;
    Ok(Json(winner_to_response(&winner)))
}

/// `POST /winners/{winner_id}/claim`: claim before the deadline.
async fn claim(
    State(state): State<AppState>,
    Path(winner_id): Path<Uuid>,
    Json(request): Json<ClaimRequest>,
) -> Result<Json<WinnerResponse>, ApiError> {
    let winner = state
        .claims
        .claim(winner_id, &request.processed_by, OffsetDateTime::now_utc())
        .await?;
    Ok(Json(winner_to_response(&winner)))
}

/// `POST /winners/{winner_id}/verify`: record an identity check.
async fn verify(
    State(state): State<AppState>,
    Path(winner_id): Path<Uuid>,
    Json(request): Json<VerifyWinnerRequest>,
) -> Result<Json<WinnerResponse>, ApiError> {
    let winner = state
        .claims
        .verify(
            winner_id,
            &request.verified_by,
            &request.identity_document_ref,
            OffsetDateTime::now_utc(),
        )
        .await?;
    Ok(Json(winner_to_response(&winner)))
}

async fn forfeit(
    State(state): State<AppState>,
    Path(winner_id): Path<Uuid>,
) -> Result<Json<WinnerResponse>, ApiError> {
    let winner = state
        .claims
        .forfeit(winner_id, OffsetDateTime::now_utc())
        .await?;
    Ok(Json(winner_to_response(&winner)))
}

async fn set_delivery_info(
    State(state): State<AppState>,
    Path(winner_id): Path<Uuid>,
    Json(request): Json<DeliveryInfoRequest>,
) -> Result<Json<WinnerResponse>, ApiError> {
    let info = DeliveryInfo {
        recipient: request.recipient,
        address: request.address,
        method: request.method,
        tracking_reference: request.tracking_reference,
    };
    let winner = state
        .claims
        .set_delivery_info(winner_id, info, OffsetDateTime::now_utc())
        .await?;
    Ok(Json(winner_to_response(&winner)))
}

/// `POST /winners/{winner_id}/delivery-status`: progress from the delivery
/// collaborator. `DELIVERED` completes a claimed physical prize.
async fn update_delivery_status(
    State(state): State<AppState>,
    Path(winner_id): Path<Uuid>,
    Json(request): Json<DeliveryStatusRequest>,
) -> Result<Json<WinnerResponse>, ApiError> {
    let winner = state
        .claims
        .update_delivery_status(
            winner_id,
            request.status,
            request.note,
            OffsetDateTime::now_utc(),
        )
        .await?;
    Ok(Json(winner_to_response(&winner)))
}
