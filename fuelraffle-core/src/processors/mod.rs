//! Pipeline processors.
//!
//! - `RedemptionProcessor`: verifies a scanned QR token, records the redemption,
//!   publishes `redemption.completed`
//! - `OutboxRelay`: re-publishes redemptions whose event never went out
//! - `TicketIssuer` / `TicketIssuanceConsumer`: receive `redemption.completed` and
//!   `ad.engagement.completed`, mint ticket batches, emit `raffle.tickets.generated`
//! - `DrawEngine` / `DrawScheduler`: raffle lifecycle and draws, emit
//!   `raffle.winner.selected`
//! - `WinnerClaims`: winner state machine, emits `raffle.winner.updated`
//! - `Sweeper`: expires overdue winners and stale tickets

pub mod draw_engine;
pub mod outbox_relay;
pub mod redemption;
pub mod sweeper;
pub mod ticket_issuance;
pub mod winner_claims;

pub use draw_engine::{DrawEngine, DrawOutcome, DrawScheduler};
pub use outbox_relay::{OutboxRelay, RelayReport};
pub use redemption::{RedeemCommand, RedemptionProcessor, RedemptionReceipt, VoidRedemption};
pub use sweeper::Sweeper;
pub use ticket_issuance::{IssuanceOutcome, TicketIssuanceConsumer, TicketIssuer};
pub use winner_claims::WinnerClaims;
