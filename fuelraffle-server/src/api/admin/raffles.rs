use axum::{
    Json,
    extract::{Path, State},
};
use fuelraffle_core::utils::draw_selection::from_hex;
use fuelraffle_sdk::objects::{DrawRequest, DrawResponse, RaffleResponse};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::extractors::AdminAuth;
use crate::api::{raffle_to_response, winner_to_response};
use crate::state::AppState;

pub async fn activate(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(raffle_id): Path<Uuid>,
) -> Result<Json<RaffleResponse>, ApiError> {
    let raffle = state.draws.activate(raffle_id).await?;
    Ok(Json(raffle_to_response(&raffle)))
}

pub async fn pause(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(raffle_id): Path<Uuid>,
) -> Result<Json<RaffleResponse>, ApiError> {
    let raffle = state.draws.pause(raffle_id).await?;
    Ok(Json(raffle_to_response(&raffle)))
}

pub async fn resume(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(raffle_id): Path<Uuid>,
) -> Result<Json<RaffleResponse>, ApiError> {
    let raffle = state.draws.resume(raffle_id).await?;
    Ok(Json(raffle_to_response(&raffle)))
}

pub async fn cancel(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(raffle_id): Path<Uuid>,
) -> Result<Json<RaffleResponse>, ApiError> {
    let raffle = state.draws.cancel(raffle_id).await?;
    Ok(Json(raffle_to_response(&raffle)))
}

/// `POST /raffles/{raffle_id}/draw`: draw winners once registration has closed.
///
/// An optional hex `reveal` replaces the server-derived one; it must match the
/// commitment published at activation.
pub async fn draw(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(raffle_id): Path<Uuid>,
    Json(request): Json<DrawRequest>,
) -> Result<Json<DrawResponse>, ApiError> {
    let reveal = request
        .reveal
        .map(|hex| {
            from_hex(&hex).ok_or_else(|| ApiError::BadRequest("reveal must be hex".to_string()))
        })
        .transpose()?;

    let outcome = state
        .draws
        .draw(raffle_id, reveal, OffsetDateTime::now_utc())
        .await?;

    Ok(Json(DrawResponse {
        raffle_id: outcome.raffle_id,
        seed: outcome.seed.to_string(),
        eligible_tickets: outcome.eligible_tickets,
        winners: outcome.winners.iter().map(winner_to_response).collect(),
    }))
}
