//! Admin API handlers.
//!
//! These endpoints are called by operators and require the
//! `Fuelraffle-Admin-Authorization` header with the plaintext admin secret.
//!
//! # Endpoints
//!
//! - `POST /raffles/{raffle_id}/activate`          – DRAFT to ACTIVE, fixes the seed commitment
//! - `POST /raffles/{raffle_id}/pause`             – ACTIVE to PAUSED
//! - `POST /raffles/{raffle_id}/resume`            – PAUSED to ACTIVE
//! - `POST /raffles/{raffle_id}/cancel`            – cancel the raffle and its tickets
//! - `POST /raffles/{raffle_id}/draw`              – draw winners now
//! - `POST /redemptions/{redemption_id}/void`      – void a redemption
//! - `POST /winners/{winner_id}/disqualify`        – disqualify a winner
//! - `POST /sweeps/winners`                        – expire overdue winners
//! - `POST /sweeps/tickets`                        – expire stale tickets

use axum::{Router, routing::post};

use crate::state::AppState;

mod raffles;
mod sweeps;
mod void_redemption;
mod winners;

/// Build the Admin API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/raffles/{raffle_id}/activate", post(raffles::activate))
        .route("/raffles/{raffle_id}/pause", post(raffles::pause))
        .route("/raffles/{raffle_id}/resume", post(raffles::resume))
        .route("/raffles/{raffle_id}/cancel", post(raffles::cancel))
        .route("/raffles/{raffle_id}/draw", post(raffles::draw))
        .route(
            "/redemptions/{redemption_id}/void",
            post(void_redemption::void_redemption),
        )
        .route(
            "/winners/{winner_id}/disqualify",
            post(winners::disqualify),
        )
        .route("/sweeps/winners", post(sweeps::sweep_winners))
        .route("/sweeps/tickets", post(sweeps::sweep_tickets))
}
