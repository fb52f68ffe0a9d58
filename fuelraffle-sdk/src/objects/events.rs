//! Event bus payloads.
//!
//! Each payload travels on its own topic. Timestamps are unix seconds.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::engagement::EngagementDetails;
use super::{TicketSource, WinnerStatus};

/// Topic names used on the event bus.
pub mod topics {
    pub const REDEMPTION_COMPLETED: &str = "redemption.completed";
    pub const AD_ENGAGEMENT_COMPLETED: &str = "ad.engagement.completed";
    pub const TICKETS_GENERATED: &str = "raffle.tickets.generated";
    pub const WINNER_SELECTED: &str = "raffle.winner.selected";
    pub const WINNER_UPDATED: &str = "raffle.winner.updated";
}

/// Published once per committed redemption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionCompletedPayload {
    pub redemption_id: Uuid,
    pub user_id: Uuid,
    pub station_id: Uuid,
    pub coupon_id: Uuid,
    pub tickets_eligible: u32,
    pub idempotency_key: String,
    pub occurred_at: i64,
}

/// Published by the ad service when a user finishes engaging with an ad.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdEngagementCompletedPayload {
    pub engagement_id: Uuid,
    pub user_id: Uuid,
    pub advertisement_id: Uuid,
    pub base_tickets: u32,
    /// Bonus computed by the producer. Consumers recompute it from `engagement`.
    pub bonus_tickets: u32,
    pub idempotency_key: String,
    pub occurred_at: i64,
    pub engagement: EngagementDetails,
}

/// Published after a ticket batch is appended to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketsGeneratedPayload {
    pub ticket_ids: Vec<Uuid>,
    pub user_id: Uuid,
    pub raffle_id: Option<Uuid>,
    pub source_type: TicketSource,
    pub source_event_id: String,
}

/// Published once per winner after the draw commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerSelectedPayload {
    pub raffle_id: Uuid,
    pub winner_id: Uuid,
    pub user_id: Uuid,
    pub prize_id: Uuid,
    pub ticket_id: Uuid,
    pub won_at: i64,
    pub claim_deadline: i64,
}

/// Published whenever a winner changes status or verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerUpdatedPayload {
    pub winner_id: Uuid,
    pub raffle_id: Uuid,
    pub user_id: Uuid,
    pub status: WinnerStatus,
    pub is_verified: bool,
    pub at: i64,
}
