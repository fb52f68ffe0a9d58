//! HTTP API.
//!
//! # Endpoints
//!
//! - `POST /qr/generate`                    – sign a dispenser QR token (admin)
//! - `POST /qr/verify`                      – check a scanned token
//! - `POST /redemptions`                    – redeem a coupon with a scanned token
//! - `POST /engagements`                    – report a completed ad engagement
//! - `GET  /users/{user_id}/tickets/balance` – active ticket count
//! - `POST /users/{user_id}/raffles/{raffle_id}/join` – enter unassigned tickets
//! - `GET  /winners/{winner_id}`            – winner status
//! - `POST /winners/{winner_id}/...`        – claim, verify, forfeit, delivery
//! - `/admin/...`                           – see [`admin`]

use axum::Router;
use fuelraffle_core::entities::raffle::Raffle;
use fuelraffle_core::entities::raffle_winner::RaffleWinner;
use fuelraffle_sdk::objects::{RaffleResponse, WinnerResponse};

use crate::state::AppState;

mod admin;
pub mod error;
pub mod extractors;
mod qr;
mod redemptions;
mod tickets;
mod winners;

#[cfg(test)]
mod tests;

/// Build the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(qr::router())
        .merge(redemptions::router())
        .merge(tickets::router())
        .merge(winners::router())
        .nest("/admin", admin::router())
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

pub(crate) fn winner_to_response(w: &RaffleWinner) -> WinnerResponse {
    WinnerResponse {
        winner_id: w.id,
        raffle_id: w.raffle_id,
        user_id: w.user_id,
        ticket_id: w.ticket_id,
        prize_id: w.prize_id,
        status: w.status.into(),
        won_at: w.won_at.unix_timestamp(),
        claim_deadline: w.claim_deadline.unix_timestamp(),
        is_verified: w.is_verified,
        claimed_at: w.claimed_at.map(|t| t.unix_timestamp()),
    }
}

pub(crate) fn raffle_to_response(r: &Raffle) -> RaffleResponse {
    RaffleResponse {
        raffle_id: r.id,
        status: r.status.into(),
        seed_commitment: r.seed_commitment.clone(),
    }
}
