//! On-demand runs of the periodic sweeps.

use axum::{Json, extract::State};
use fuelraffle_sdk::objects::SweepResponse;
use time::OffsetDateTime;

use crate::api::error::ApiError;
use crate::api::extractors::AdminAuth;
use crate::state::AppState;

pub async fn sweep_winners(
    State(state): State<AppState>,
    _auth: AdminAuth,
) -> Result<Json<SweepResponse>, ApiError> {
    let affected = state
        .sweeper
        .sweep_winners(OffsetDateTime::now_utc())
        .await?;
    Ok(Json(SweepResponse { affected }))
}

pub async fn sweep_tickets(
    State(state): State<AppState>,
    _auth: AdminAuth,
) -> Result<Json<SweepResponse>, ApiError> {
    let affected = state
        .sweeper
        .sweep_tickets(OffsetDateTime::now_utc())
        .await?;
    Ok(Json(SweepResponse { affected }))
}
