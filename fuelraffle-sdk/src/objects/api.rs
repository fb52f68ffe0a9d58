//! HTTP request and response types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::engagement::EngagementDetails;
use super::{DeliveryStatus, RaffleStatus, WinnerStatus};
use crate::signature::QrPayload;

// ---------------------------------------------------------------------------
// QR
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateQrRequest {
    pub station_id: Uuid,
    pub dispenser_id: Uuid,
    /// Falls back to the configured default when absent.
    pub expiration_hours: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateQrResponse {
    /// Scannable content to render as a QR code.
    pub content: String,
    pub payload: QrPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyQrRequest {
    pub content: String,
}

// ---------------------------------------------------------------------------
// Redemptions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeemRequest {
    pub qr_content: String,
    pub coupon_id: Uuid,
    pub user_id: Uuid,
    pub fuel_amount: Decimal,
    pub fuel_price: Decimal,
}

/// How a redemption request was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RedemptionOutcomeKind {
    /// Stored and announced on the bus.
    Completed,
    /// Stored, but the announcement is waiting for reconciliation.
    NotificationPending,
    /// An earlier request with the same idempotency key already succeeded.
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionResponse {
    pub redemption_id: Uuid,
    pub idempotency_key: String,
    pub tickets_eligible: u32,
    pub outcome: RedemptionOutcomeKind,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoidRedemptionRequest {
    pub reason: String,
    pub voided_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionVoidResponse {
    pub void_id: Uuid,
    pub redemption_id: Uuid,
    pub voided_at: i64,
}

// ---------------------------------------------------------------------------
// Engagements and tickets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordEngagementRequest {
    pub engagement_id: Uuid,
    pub user_id: Uuid,
    pub advertisement_id: Uuid,
    pub base_tickets: u32,
    pub engagement: EngagementDetails,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordEngagementResponse {
    pub qualifies: bool,
    pub base_tickets: u32,
    pub bonus_tickets: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketBalanceResponse {
    pub user_id: Uuid,
    pub active_tickets: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRaffleResponse {
    pub user_id: Uuid,
    pub raffle_id: Uuid,
    /// Unassigned tickets moved into the raffle by this call.
    pub tickets_moved: u64,
}

// ---------------------------------------------------------------------------
// Raffles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DrawRequest {
    /// Hex-encoded reveal value from an external beacon. When absent the
    /// server recomputes the reveal it committed to at activation.
    pub reveal: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaffleResponse {
    pub raffle_id: Uuid,
    pub status: RaffleStatus,
    pub seed_commitment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawResponse {
    pub raffle_id: Uuid,
    /// Decimal string, since JSON numbers lose precision above 2^53.
    pub seed: String,
    pub eligible_tickets: usize,
    pub winners: Vec<WinnerResponse>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepResponse {
    pub affected: u64,
}

// ---------------------------------------------------------------------------
// Winners
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRequest {
    pub processed_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyWinnerRequest {
    pub verified_by: String,
    /// Reference to the identity document in the document store, never the
    /// document itself.
    pub identity_document_ref: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryInfoRequest {
    pub recipient: String,
    pub address: String,
    pub method: String,
    pub tracking_reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStatusRequest {
    pub status: DeliveryStatus,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisqualifyRequest {
    pub reason: String,
    pub decided_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinnerResponse {
    pub winner_id: Uuid,
    pub raffle_id: Uuid,
    pub user_id: Uuid,
    pub ticket_id: Uuid,
    pub prize_id: Uuid,
    pub status: WinnerStatus,
    pub won_at: i64,
    pub claim_deadline: i64,
    pub is_verified: bool,
    pub claimed_at: Option<i64>,
}
