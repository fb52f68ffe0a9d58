pub mod api;
pub mod engagement;
pub mod error;
pub mod events;

pub use api::*;
pub use engagement::EngagementDetails;
pub use error::{ErrorCode, ErrorResponse};
pub use events::*;

use serde::{Deserialize, Serialize};

/// Where a batch of raffle tickets came from.
///
/// This is the API/DTO version without sqlx::Type.
/// For database operations, use the version in `fuelraffle-core::entities`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketSource {
    Redemption,
    AdEngagement,
    Promotional,
}

impl std::fmt::Display for TicketSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TicketSource::Redemption => write!(f, "REDEMPTION"),
            TicketSource::AdEngagement => write!(f, "AD_ENGAGEMENT"),
            TicketSource::Promotional => write!(f, "PROMOTIONAL"),
        }
    }
}

/// Winner status for API responses and notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WinnerStatus {
    PendingClaim,
    Claimed,
    Expired,
    Forfeited,
    Disqualified,
    Delivered,
}

/// Raffle status for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RaffleStatus {
    Draft,
    Active,
    Paused,
    Completed,
    Cancelled,
}

/// Progress reported by the delivery collaborator for a physical prize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Preparing,
    Shipped,
    InTransit,
    Delivered,
    Failed,
}
