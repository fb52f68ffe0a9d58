//! In-memory adapter.
//!
//! One mutex guards the whole state, so every trait method is atomic the way a
//! Postgres transaction is. The uniqueness rules of the schema are checked by
//! hand: inbox key, ticket number per raffle, idempotency key, coupon claim and
//! the two winner pairs.

use super::{
    CouponDirectory, DrawCommit, IssueOutcome, IssueTickets, RaffleStore, RaffleTransition,
    RedemptionInsert, RedemptionStore, TicketLedger, WinnerStore, mint_tickets, new_batch,
};
use crate::entities::coupon::Coupon;
use crate::entities::prize::Prize;
use crate::entities::raffle::Raffle;
use crate::entities::raffle_ticket::{RaffleTicket, TicketBatch, UNASSIGNED_SCOPE};
use crate::entities::raffle_winner::RaffleWinner;
use crate::entities::redemption::{NewRedemption, Redemption, RedemptionVoid};
use crate::entities::{RaffleStatus, TicketSource, TicketStatus, WinnerStatus};
use crate::error::{EligibilityError, PipelineError};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct State {
    coupons: HashMap<Uuid, Coupon>,
    redemptions: HashMap<Uuid, Redemption>,
    redemption_keys: HashMap<String, Uuid>,
    coupon_claims: HashMap<Uuid, Uuid>,
    voids: HashMap<Uuid, RedemptionVoid>,
    batches: HashMap<(TicketSource, String), TicketBatch>,
    tickets: Vec<RaffleTicket>,
    counters: HashMap<Uuid, i64>,
    raffles: HashMap<Uuid, Raffle>,
    prizes: HashMap<Uuid, Prize>,
    winners: HashMap<Uuid, RaffleWinner>,
}

impl State {
    fn allocate(&mut self, raffle_id: Option<Uuid>, count: i64) -> i64 {
        let next = self
            .counters
            .entry(raffle_id.unwrap_or(UNASSIGNED_SCOPE))
            .or_insert(1);
        let first = *next;
        *next += count;
        first
    }

    fn has_room(&self, raffle: &Raffle, user_id: Uuid) -> bool {
        let Some(max) = raffle.max_participants else {
            return true;
        };
        let participants: HashSet<Uuid> = self
            .tickets
            .iter()
            .filter(|t| t.raffle_id == Some(raffle.id))
            .map(|t| t.user_id)
            .collect();
        participants.contains(&user_id)
            || i64::try_from(participants.len()).unwrap_or(i64::MAX) < i64::from(max)
    }

    fn open_raffle(&self, at: OffsetDateTime) -> Option<&Raffle> {
        self.raffles
            .values()
            .filter(|r| r.accepts_registration_at(at))
            .min_by_key(|r| (r.draw_at, r.id))
    }

    fn check_numbers(&self, tickets: &[RaffleTicket]) -> Result<(), PipelineError> {
        let mut taken: HashSet<(Option<Uuid>, i64)> = self
            .tickets
            .iter()
            .map(|t| (t.raffle_id, t.ticket_number))
            .collect();
        for ticket in tickets {
            if !taken.insert((ticket.raffle_id, ticket.ticket_number)) {
                return Err(PipelineError::ConstraintViolation(
                    "raffle_tickets_raffle_id_ticket_number_key".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn require_active(&self, ticket_ids: &[Uuid], raffle_id: Uuid) -> Result<(), PipelineError> {
        for id in ticket_ids {
            let active = self.tickets.iter().any(|t| {
                t.id == *id && t.raffle_id == Some(raffle_id) && t.status == TicketStatus::Active
            });
            if !active {
                return Err(EligibilityError::TicketNotActive(*id).into());
            }
        }
        Ok(())
    }

    /// ACTIVE -> CONSUMED for the whole batch, or nothing.
    fn consume(&mut self, ticket_ids: &[Uuid], raffle_id: Uuid) -> Result<(), PipelineError> {
        self.require_active(ticket_ids, raffle_id)?;
        self.set_status(ticket_ids, TicketStatus::Consumed);
        Ok(())
    }

    /// CONSUMED -> WON, once per (ticket, raffle).
    fn mark_won(&mut self, ticket_id: Uuid, raffle_id: Uuid) -> Result<(), PipelineError> {
        let ticket = self.tickets.iter_mut().find(|t| {
            t.id == ticket_id && t.raffle_id == Some(raffle_id) && t.status == TicketStatus::Consumed
        });
        match ticket {
            Some(ticket) => {
                ticket.status = TicketStatus::Won;
                Ok(())
            }
            None => Err(PipelineError::conflict(
                "ticket",
                ticket_id,
                "not consumed",
                TicketStatus::Won,
            )),
        }
    }

    fn set_status(&mut self, ticket_ids: &[Uuid], to: TicketStatus) {
        for ticket in self.tickets.iter_mut() {
            if ticket_ids.contains(&ticket.id) {
                ticket.status = to;
            }
        }
    }
}

/// Test double and single-process store.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_coupon(&self, coupon: Coupon) {
        self.state.lock().await.coupons.insert(coupon.id, coupon);
    }

    pub async fn insert_raffle(&self, raffle: Raffle) {
        self.state.lock().await.raffles.insert(raffle.id, raffle);
    }

    pub async fn insert_prize(&self, prize: Prize) {
        self.state.lock().await.prizes.insert(prize.id, prize);
    }

    pub async fn insert_winner(&self, winner: RaffleWinner) {
        self.state.lock().await.winners.insert(winner.id, winner);
    }

    pub async fn tickets_for_user(&self, user_id: Uuid) -> Vec<RaffleTicket> {
        let state = self.state.lock().await;
        state
            .tickets
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn ticket(&self, ticket_id: Uuid) -> Option<RaffleTicket> {
        let state = self.state.lock().await;
        state.tickets.iter().find(|t| t.id == ticket_id).cloned()
    }

    pub async fn batch_count(&self) -> usize {
        self.state.lock().await.batches.len()
    }

    pub async fn redemption(&self, redemption_id: Uuid) -> Option<Redemption> {
        self.state
            .lock()
            .await
            .redemptions
            .get(&redemption_id)
            .cloned()
    }
}

#[async_trait]
impl CouponDirectory for MemoryStore {
    async fn coupon(&self, coupon_id: Uuid) -> Result<Option<Coupon>, PipelineError> {
        Ok(self.state.lock().await.coupons.get(&coupon_id).cloned())
    }
}

#[async_trait]
impl RedemptionStore for MemoryStore {
    async fn redemption_by_key(&self, key: &str) -> Result<Option<Redemption>, PipelineError> {
        let state = self.state.lock().await;
        Ok(state
            .redemption_keys
            .get(key)
            .and_then(|id| state.redemptions.get(id))
            .cloned())
    }

    async fn insert_redemption(
        &self,
        new: NewRedemption,
    ) -> Result<RedemptionInsert, PipelineError> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state
            .redemption_keys
            .get(&new.idempotency_key)
            .and_then(|id| state.redemptions.get(id))
        {
            return Ok(RedemptionInsert::Existing(existing.clone()));
        }
        if state.coupon_claims.contains_key(&new.coupon_id) {
            return Err(PipelineError::AlreadyUsed {
                coupon_id: new.coupon_id,
            });
        }

        let record = new.into_record();
        state
            .redemption_keys
            .insert(record.idempotency_key.clone(), record.id);
        state.coupon_claims.insert(record.coupon_id, record.id);
        state.redemptions.insert(record.id, record.clone());
        Ok(RedemptionInsert::Inserted(record))
    }

    async fn void_redemption(
        &self,
        void: RedemptionVoid,
    ) -> Result<RedemptionVoid, PipelineError> {
        let mut state = self.state.lock().await;
        if !state.redemptions.contains_key(&void.redemption_id) {
            return Err(PipelineError::NotFound("redemption", void.redemption_id));
        }
        if state.voids.contains_key(&void.redemption_id) {
            return Err(PipelineError::conflict(
                "redemption",
                void.redemption_id,
                "voided",
                "voided",
            ));
        }
        state
            .coupon_claims
            .retain(|_, redemption_id| *redemption_id != void.redemption_id);
        state.voids.insert(void.redemption_id, void.clone());
        Ok(void)
    }

    async fn unpublished_redemptions(
        &self,
        limit: i64,
        max_attempts: i32,
    ) -> Result<Vec<Redemption>, PipelineError> {
        let state = self.state.lock().await;
        let mut pending: Vec<Redemption> = state
            .redemptions
            .values()
            .filter(|r| r.published_at.is_none() && r.publish_attempts < max_attempts)
            .cloned()
            .collect();
        pending.sort_by_key(|r| (r.created_at, r.id));
        pending.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(pending)
    }

    async fn mark_published(
        &self,
        redemption_id: Uuid,
        at: OffsetDateTime,
    ) -> Result<(), PipelineError> {
        let mut state = self.state.lock().await;
        if let Some(r) = state.redemptions.get_mut(&redemption_id) {
            if r.published_at.is_none() {
                r.published_at = Some(at);
                r.publish_attempts += 1;
            }
        }
        Ok(())
    }

    async fn record_publish_failure(&self, redemption_id: Uuid) -> Result<(), PipelineError> {
        let mut state = self.state.lock().await;
        if let Some(r) = state.redemptions.get_mut(&redemption_id) {
            if r.published_at.is_none() {
                r.publish_attempts += 1;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TicketLedger for MemoryStore {
    async fn issue(&self, request: IssueTickets) -> Result<IssueOutcome, PipelineError> {
        let mut state = self.state.lock().await;
        let inbox_key = (request.source_type, request.source_event_id.clone());
        if state.batches.contains_key(&inbox_key) {
            return Ok(IssueOutcome::Duplicate);
        }

        let raffle_id = state
            .open_raffle(request.generated_at)
            .filter(|raffle| state.has_room(raffle, request.user_id))
            .map(|raffle| raffle.id);

        let batch = new_batch(&request, raffle_id)?;
        let first = state.allocate(raffle_id, i64::from(request.count));
        let tickets = mint_tickets(&batch, first, request.count);
        state.check_numbers(&tickets)?;

        state.batches.insert(inbox_key, batch.clone());
        state.tickets.extend(tickets.iter().cloned());
        Ok(IssueOutcome::Issued { batch, tickets })
    }

    async fn grant(&self, tickets: Vec<RaffleTicket>) -> Result<(), PipelineError> {
        let mut state = self.state.lock().await;
        state.check_numbers(&tickets)?;
        state.tickets.extend(tickets);
        Ok(())
    }

    async fn balance(&self, user_id: Uuid) -> Result<i64, PipelineError> {
        let state = self.state.lock().await;
        let count = state
            .tickets
            .iter()
            .filter(|t| t.user_id == user_id && t.status == TicketStatus::Active)
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn consume(&self, ticket_ids: &[Uuid], raffle_id: Uuid) -> Result<(), PipelineError> {
        self.state.lock().await.consume(ticket_ids, raffle_id)
    }

    async fn mark_winner(&self, ticket_id: Uuid, raffle_id: Uuid) -> Result<(), PipelineError> {
        self.state.lock().await.mark_won(ticket_id, raffle_id)
    }

    async fn associate(&self, user_id: Uuid, raffle_id: Uuid) -> Result<u64, PipelineError> {
        let mut state = self.state.lock().await;
        let raffle = state
            .raffles
            .get(&raffle_id)
            .cloned()
            .ok_or(PipelineError::NotFound("raffle", raffle_id))?;
        if raffle.status != RaffleStatus::Active {
            return Err(EligibilityError::RaffleNotActive {
                raffle_id,
                status: raffle.status,
            }
            .into());
        }

        let mut pool: Vec<(i64, Uuid)> = state
            .tickets
            .iter()
            .filter(|t| {
                t.user_id == user_id && t.raffle_id.is_none() && t.status == TicketStatus::Active
            })
            .map(|t| (t.ticket_number, t.id))
            .collect();
        if pool.is_empty() {
            return Ok(0);
        }
        if !state.has_room(&raffle, user_id) {
            return Err(PipelineError::ConstraintViolation(format!(
                "raffle {raffle_id} reached its participant limit"
            )));
        }
        pool.sort();

        let count = i64::try_from(pool.len()).unwrap_or(i64::MAX);
        let first = state.allocate(Some(raffle_id), count);
        let numbers: HashMap<Uuid, i64> = pool
            .iter()
            .zip(first..)
            .map(|((_, id), number)| (*id, number))
            .collect();
        for ticket in state.tickets.iter_mut() {
            if let Some(number) = numbers.get(&ticket.id) {
                ticket.raffle_id = Some(raffle_id);
                ticket.ticket_number = *number;
            }
        }
        Ok(pool.len() as u64)
    }

    async fn expire(&self, cutoff: OffsetDateTime) -> Result<u64, PipelineError> {
        let mut state = self.state.lock().await;
        let completed: HashSet<Uuid> = state
            .raffles
            .values()
            .filter(|r| r.status == RaffleStatus::Completed)
            .map(|r| r.id)
            .collect();
        let mut expired = 0;
        for ticket in state.tickets.iter_mut() {
            let in_completed = ticket.raffle_id.is_some_and(|id| completed.contains(&id));
            if ticket.status == TicketStatus::Active
                && (ticket.generated_at < cutoff || in_completed)
            {
                ticket.status = TicketStatus::Expired;
                expired += 1;
            }
        }
        Ok(expired)
    }

    async fn active_tickets(&self, raffle_id: Uuid) -> Result<Vec<RaffleTicket>, PipelineError> {
        let state = self.state.lock().await;
        let mut tickets: Vec<RaffleTicket> = state
            .tickets
            .iter()
            .filter(|t| t.raffle_id == Some(raffle_id) && t.status == TicketStatus::Active)
            .cloned()
            .collect();
        tickets.sort_by_key(|t| t.ticket_number);
        Ok(tickets)
    }
}

#[async_trait]
impl RaffleStore for MemoryStore {
    async fn raffle(&self, raffle_id: Uuid) -> Result<Option<Raffle>, PipelineError> {
        Ok(self.state.lock().await.raffles.get(&raffle_id).cloned())
    }

    async fn prizes(&self, raffle_id: Uuid) -> Result<Vec<Prize>, PipelineError> {
        let state = self.state.lock().await;
        let mut prizes: Vec<Prize> = state
            .prizes
            .values()
            .filter(|p| p.raffle_id == raffle_id)
            .cloned()
            .collect();
        prizes.sort_by_key(|p| (p.tier, p.id));
        Ok(prizes)
    }

    async fn prize(&self, prize_id: Uuid) -> Result<Option<Prize>, PipelineError> {
        Ok(self.state.lock().await.prizes.get(&prize_id).cloned())
    }

    async fn due_raffles(&self, now: OffsetDateTime) -> Result<Vec<Raffle>, PipelineError> {
        let state = self.state.lock().await;
        let mut due: Vec<Raffle> = state
            .raffles
            .values()
            .filter(|r| r.is_due_at(now))
            .cloned()
            .collect();
        due.sort_by_key(|r| r.draw_at);
        Ok(due)
    }

    async fn transition_raffle(
        &self,
        transition: RaffleTransition,
    ) -> Result<Raffle, PipelineError> {
        let mut state = self.state.lock().await;
        let raffle = state
            .raffles
            .get_mut(&transition.raffle_id)
            .ok_or(PipelineError::NotFound("raffle", transition.raffle_id))?;
        if raffle.status != transition.from {
            return Err(PipelineError::conflict(
                "raffle",
                raffle.id,
                raffle.status,
                transition.to,
            ));
        }
        raffle.status = transition.to;
        if let Some(commitment) = transition.seed_commitment {
            raffle.seed_commitment = Some(commitment);
        }
        let updated = raffle.clone();

        if transition.to == RaffleStatus::Cancelled {
            for ticket in state.tickets.iter_mut() {
                if ticket.raffle_id == Some(updated.id) && ticket.status == TicketStatus::Active {
                    ticket.status = TicketStatus::Cancelled;
                }
            }
        }
        Ok(updated)
    }

    async fn commit_draw(&self, commit: DrawCommit) -> Result<Vec<RaffleWinner>, PipelineError> {
        let mut state = self.state.lock().await;
        let raffle = state
            .raffles
            .get(&commit.raffle_id)
            .ok_or(PipelineError::NotFound("raffle", commit.raffle_id))?;
        if raffle.status != RaffleStatus::Active {
            return Err(PipelineError::conflict(
                "raffle",
                raffle.id,
                raffle.status,
                RaffleStatus::Completed,
            ));
        }

        let ticket_ids: Vec<Uuid> = commit.winners.iter().map(|w| w.ticket_id).collect();
        state.require_active(&ticket_ids, commit.raffle_id)?;

        let mut pairs: HashSet<(Uuid, Uuid)> = HashSet::new();
        let mut per_raffle: HashSet<(Uuid, Uuid)> = HashSet::new();
        for existing in state.winners.values() {
            pairs.insert((existing.ticket_id, existing.prize_id));
            per_raffle.insert((existing.ticket_id, existing.raffle_id));
        }
        for winner in &commit.winners {
            if !pairs.insert((winner.ticket_id, winner.prize_id))
                || !per_raffle.insert((winner.ticket_id, winner.raffle_id))
            {
                return Err(PipelineError::ConstraintViolation(
                    "raffle_winners_ticket_id_raffle_id_key".to_string(),
                ));
            }
        }

        state.consume(&ticket_ids, commit.raffle_id)?;
        for ticket_id in &ticket_ids {
            state.mark_won(*ticket_id, commit.raffle_id)?;
        }
        for winner in &commit.winners {
            state.winners.insert(winner.id, winner.clone());
        }
        if let Some(raffle) = state.raffles.get_mut(&commit.raffle_id) {
            raffle.status = RaffleStatus::Completed;
            raffle.draw_seed = Some(i64::from_be_bytes(commit.seed.to_be_bytes()));
            raffle.completed_at = Some(commit.completed_at);
        }
        Ok(commit.winners)
    }
}

#[async_trait]
impl WinnerStore for MemoryStore {
    async fn winner(&self, winner_id: Uuid) -> Result<Option<RaffleWinner>, PipelineError> {
        Ok(self.state.lock().await.winners.get(&winner_id).cloned())
    }

    async fn overdue_winners(
        &self,
        now: OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<RaffleWinner>, PipelineError> {
        let state = self.state.lock().await;
        let mut overdue: Vec<RaffleWinner> = state
            .winners
            .values()
            .filter(|w| w.status == WinnerStatus::PendingClaim && w.claim_deadline <= now)
            .cloned()
            .collect();
        overdue.sort_by_key(|w| w.claim_deadline);
        overdue.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(overdue)
    }

    async fn save_winner(
        &self,
        winner: &RaffleWinner,
        expected: WinnerStatus,
    ) -> Result<bool, PipelineError> {
        let mut state = self.state.lock().await;
        match state.winners.get_mut(&winner.id) {
            Some(stored) if stored.status == expected => {
                *stored = winner.clone();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(PipelineError::NotFound("winner", winner.id)),
        }
    }
}
