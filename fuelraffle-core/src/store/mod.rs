//! Storage seams.
//!
//! Each component depends on the narrowest trait it needs. [`PgStore`] is the
//! production adapter; [`MemoryStore`] enforces the same uniqueness rules in
//! memory and backs the tests.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::entities::coupon::Coupon;
use crate::entities::prize::Prize;
use crate::entities::raffle::Raffle;
use crate::entities::raffle_ticket::{RaffleTicket, TicketBatch};
use crate::entities::raffle_winner::RaffleWinner;
use crate::entities::redemption::{NewRedemption, Redemption, RedemptionVoid};
use crate::entities::{RaffleStatus, TicketSource, TicketStatus, WinnerStatus};
use crate::error::PipelineError;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

/// Read-only view of the campaign service's coupons.
#[async_trait]
pub trait CouponDirectory: Send + Sync {
    async fn coupon(&self, coupon_id: Uuid) -> Result<Option<Coupon>, PipelineError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedemptionInsert {
    Inserted(Redemption),
    /// A redemption with the same idempotency key already exists.
    Existing(Redemption),
}

#[async_trait]
pub trait RedemptionStore: Send + Sync {
    async fn redemption_by_key(&self, key: &str) -> Result<Option<Redemption>, PipelineError>;

    /// Insert the redemption and bind its coupon in one transaction.
    ///
    /// Fails with `AlreadyUsed` when the coupon backs another live redemption.
    async fn insert_redemption(
        &self,
        new: NewRedemption,
    ) -> Result<RedemptionInsert, PipelineError>;

    /// Append a void record and free the coupon.
    async fn void_redemption(&self, void: RedemptionVoid)
    -> Result<RedemptionVoid, PipelineError>;

    async fn unpublished_redemptions(
        &self,
        limit: i64,
        max_attempts: i32,
    ) -> Result<Vec<Redemption>, PipelineError>;

    async fn mark_published(
        &self,
        redemption_id: Uuid,
        at: OffsetDateTime,
    ) -> Result<(), PipelineError>;

    async fn record_publish_failure(&self, redemption_id: Uuid) -> Result<(), PipelineError>;
}

/// A ticket batch to mint for one source event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueTickets {
    pub source_type: TicketSource,
    pub source_event_id: String,
    pub user_id: Uuid,
    pub count: u32,
    pub generated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueOutcome {
    Issued {
        batch: TicketBatch,
        tickets: Vec<RaffleTicket>,
    },
    /// The source event already minted a batch.
    Duplicate,
}

#[async_trait]
pub trait TicketLedger: Send + Sync {
    /// Inbox insert, raffle resolution, number allocation and grant in one
    /// transaction.
    async fn issue(&self, request: IssueTickets) -> Result<IssueOutcome, PipelineError>;

    /// Append tickets atomically. A ticket number collision rejects the batch.
    async fn grant(&self, tickets: Vec<RaffleTicket>) -> Result<(), PipelineError>;

    /// ACTIVE tickets of a user across all raffles.
    async fn balance(&self, user_id: Uuid) -> Result<i64, PipelineError>;

    /// ACTIVE -> CONSUMED. Nothing changes unless every ticket is ACTIVE in `raffle_id`.
    async fn consume(&self, ticket_ids: &[Uuid], raffle_id: Uuid) -> Result<(), PipelineError>;

    /// CONSUMED -> WON.
    async fn mark_winner(&self, ticket_id: Uuid, raffle_id: Uuid) -> Result<(), PipelineError>;

    /// Move a user's unassigned ACTIVE tickets into an ACTIVE raffle.
    async fn associate(&self, user_id: Uuid, raffle_id: Uuid) -> Result<u64, PipelineError>;

    /// Expire ACTIVE tickets generated before `cutoff` or sitting in completed raffles.
    async fn expire(&self, cutoff: OffsetDateTime) -> Result<u64, PipelineError>;

    /// ACTIVE tickets of a raffle ordered by ticket number.
    async fn active_tickets(&self, raffle_id: Uuid) -> Result<Vec<RaffleTicket>, PipelineError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaffleTransition {
    pub raffle_id: Uuid,
    pub from: RaffleStatus,
    pub to: RaffleStatus,
    /// Set on activation.
    pub seed_commitment: Option<String>,
}

/// Everything a draw writes, committed together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawCommit {
    pub raffle_id: Uuid,
    pub seed: u64,
    pub completed_at: OffsetDateTime,
    pub winners: Vec<RaffleWinner>,
}

#[async_trait]
pub trait RaffleStore: Send + Sync {
    async fn raffle(&self, raffle_id: Uuid) -> Result<Option<Raffle>, PipelineError>;

    async fn prizes(&self, raffle_id: Uuid) -> Result<Vec<Prize>, PipelineError>;

    async fn prize(&self, prize_id: Uuid) -> Result<Option<Prize>, PipelineError>;

    async fn due_raffles(&self, now: OffsetDateTime) -> Result<Vec<Raffle>, PipelineError>;

    /// Compare-and-set the raffle status. Cancelling also cancels its ACTIVE tickets.
    async fn transition_raffle(
        &self,
        transition: RaffleTransition,
    ) -> Result<Raffle, PipelineError>;

    /// Lock the raffle, re-check it is ACTIVE, consume and mark the winning
    /// tickets, insert the winners and complete the raffle.
    async fn commit_draw(&self, commit: DrawCommit) -> Result<Vec<RaffleWinner>, PipelineError>;
}

#[async_trait]
pub trait WinnerStore: Send + Sync {
    async fn winner(&self, winner_id: Uuid) -> Result<Option<RaffleWinner>, PipelineError>;

    async fn overdue_winners(
        &self,
        now: OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<RaffleWinner>, PipelineError>;

    /// Persist `winner` if the stored status is still `expected`.
    ///
    /// Returns `false` if another writer moved it first.
    async fn save_winner(
        &self,
        winner: &RaffleWinner,
        expected: WinnerStatus,
    ) -> Result<bool, PipelineError>;
}

/// Every store the pipeline needs, as one object.
pub trait PipelineStore:
    CouponDirectory + RedemptionStore + TicketLedger + RaffleStore + WinnerStore
{
}

impl<T> PipelineStore for T where
    T: CouponDirectory + RedemptionStore + TicketLedger + RaffleStore + WinnerStore
{
}

/// Tickets `first..first + count` for one batch.
pub(crate) fn mint_tickets(
    batch: &TicketBatch,
    first_number: i64,
    count: u32,
) -> Vec<RaffleTicket> {
    (0..i64::from(count))
        .map(|offset| RaffleTicket {
            id: Uuid::now_v7(),
            user_id: batch.user_id,
            raffle_id: batch.raffle_id,
            ticket_number: first_number + offset,
            status: TicketStatus::Active,
            source_type: batch.source_type,
            source_event_id: batch.source_event_id.clone(),
            batch_id: batch.id,
            generated_at: batch.created_at,
        })
        .collect()
}

pub(crate) fn new_batch(
    request: &IssueTickets,
    raffle_id: Option<Uuid>,
) -> Result<TicketBatch, PipelineError> {
    let ticket_count = i32::try_from(request.count).map_err(|_| {
        PipelineError::InvalidInput(format!(
            "ticket count {} for {} does not fit a batch",
            request.count, request.source_event_id
        ))
    })?;
    Ok(TicketBatch {
        id: Uuid::now_v7(),
        source_type: request.source_type,
        source_event_id: request.source_event_id.clone(),
        user_id: request.user_id,
        raffle_id,
        ticket_count,
        created_at: request.generated_at,
    })
}
