//! PostgreSQL adapter.
//!
//! Reads go through the `Processor` structs in `entities`; every multi-step
//! write runs in one transaction built from the entities' `_tx` helpers.

use super::{
    CouponDirectory, DrawCommit, IssueOutcome, IssueTickets, RaffleStore, RaffleTransition,
    RedemptionInsert, RedemptionStore, TicketLedger, WinnerStore, mint_tickets, new_batch,
};
use crate::entities::coupon::{Coupon, GetCouponById};
use crate::entities::prize::{GetPrizeById, GetPrizesForRaffle, Prize};
use crate::entities::raffle::{GetDueRaffles, GetRaffleById, Raffle};
use crate::entities::raffle_ticket::{
    ExpireTickets, GetActiveTicketBalance, GetActiveTicketsForRaffle, RaffleTicket,
};
use crate::entities::raffle_winner::{
    GetWinnerById, ListOverdueWinners, RaffleWinner,
};
use crate::entities::redemption::{
    GetRedemptionByKey, ListUnpublishedRedemptions, MarkRedemptionPublished, NewRedemption,
    RecordRedemptionPublishFailure, Redemption, RedemptionVoid,
};
use crate::entities::{RaffleStatus, TicketStatus, WinnerStatus};
use crate::error::{EligibilityError, PipelineError};
use crate::framework::DatabaseProcessor;
use async_trait::async_trait;
use kanau::processor::Processor;
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PgStore {
    db: DatabaseProcessor,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            db: DatabaseProcessor::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db.pool
    }
}

/// Whether a new user may still join `raffle` inside `tx`.
async fn has_room_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    raffle: &Raffle,
    user_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let Some(max) = raffle.max_participants else {
        return Ok(true);
    };
    if RaffleTicket::is_participant_tx(tx, raffle.id, user_id).await? {
        return Ok(true);
    }
    Ok(RaffleTicket::participant_count_tx(tx, raffle.id).await? < i64::from(max))
}

#[async_trait]
impl CouponDirectory for PgStore {
    async fn coupon(&self, coupon_id: Uuid) -> Result<Option<Coupon>, PipelineError> {
        Ok(self.db.process(GetCouponById { coupon_id }).await?)
    }
}

#[async_trait]
impl RedemptionStore for PgStore {
    async fn redemption_by_key(&self, key: &str) -> Result<Option<Redemption>, PipelineError> {
        Ok(self
            .db
            .process(GetRedemptionByKey {
                idempotency_key: key.to_string(),
            })
            .await?)
    }

    async fn insert_redemption(
        &self,
        new: NewRedemption,
    ) -> Result<RedemptionInsert, PipelineError> {
        let mut tx = self.db.begin().await?;

        let Some(inserted) = Redemption::insert_tx(&mut tx, &new).await? else {
            tx.rollback().await?;
            let existing = self
                .redemption_by_key(&new.idempotency_key)
                .await?
                .ok_or(PipelineError::NotFound("redemption", new.id))?;
            return Ok(RedemptionInsert::Existing(existing));
        };

        if !Redemption::claim_coupon_tx(&mut tx, new.coupon_id, inserted.id).await? {
            tx.rollback().await?;
            return Err(PipelineError::AlreadyUsed {
                coupon_id: new.coupon_id,
            });
        }

        tx.commit().await?;
        Ok(RedemptionInsert::Inserted(inserted))
    }

    async fn void_redemption(
        &self,
        void: RedemptionVoid,
    ) -> Result<RedemptionVoid, PipelineError> {
        let mut tx = self.db.begin().await?;
        if Redemption::lock_tx(&mut tx, void.redemption_id)
            .await?
            .is_none()
        {
            return Err(PipelineError::NotFound("redemption", void.redemption_id));
        }
        if Redemption::is_voided_tx(&mut tx, void.redemption_id).await? {
            return Err(PipelineError::conflict(
                "redemption",
                void.redemption_id,
                "voided",
                "voided",
            ));
        }
        let record = Redemption::void_tx(&mut tx, &void).await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn unpublished_redemptions(
        &self,
        limit: i64,
        max_attempts: i32,
    ) -> Result<Vec<Redemption>, PipelineError> {
        Ok(self
            .db
            .process(ListUnpublishedRedemptions {
                limit,
                max_attempts,
            })
            .await?)
    }

    async fn mark_published(
        &self,
        redemption_id: Uuid,
        at: OffsetDateTime,
    ) -> Result<(), PipelineError> {
        self.db
            .process(MarkRedemptionPublished {
                redemption_id,
                published_at: at,
            })
            .await?;
        Ok(())
    }

    async fn record_publish_failure(&self, redemption_id: Uuid) -> Result<(), PipelineError> {
        self.db
            .process(RecordRedemptionPublishFailure { redemption_id })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TicketLedger for PgStore {
    async fn issue(&self, request: IssueTickets) -> Result<IssueOutcome, PipelineError> {
        let mut tx = self.db.begin().await?;

        let open = Raffle::lock_open_for_registration_tx(&mut tx, request.generated_at).await?;
        let raffle = match open {
            Some(raffle) => {
                if has_room_tx(&mut tx, &raffle, request.user_id).await? {
                    Some(raffle.id)
                } else {
                    debug!(
                        raffle_id = %raffle.id,
                        user_id = %request.user_id,
                        "Raffle full, minting unassigned"
                    );
                    None
                }
            }
            None => None,
        };

        let batch = new_batch(&request, raffle)?;
        if !RaffleTicket::insert_batch_tx(&mut tx, &batch).await? {
            tx.rollback().await?;
            return Ok(IssueOutcome::Duplicate);
        }

        let first =
            RaffleTicket::allocate_numbers_tx(&mut tx, raffle, i64::from(request.count)).await?;
        let tickets = mint_tickets(&batch, first, request.count);
        RaffleTicket::insert_many_tx(&mut tx, &tickets).await?;

        tx.commit().await?;
        Ok(IssueOutcome::Issued { batch, tickets })
    }

    async fn grant(&self, tickets: Vec<RaffleTicket>) -> Result<(), PipelineError> {
        let mut tx = self.db.begin().await?;
        RaffleTicket::insert_many_tx(&mut tx, &tickets).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn balance(&self, user_id: Uuid) -> Result<i64, PipelineError> {
        Ok(self.db.process(GetActiveTicketBalance { user_id }).await?)
    }

    async fn consume(&self, ticket_ids: &[Uuid], raffle_id: Uuid) -> Result<(), PipelineError> {
        let mut tx = self.db.begin().await?;
        let active = RaffleTicket::lock_active_tx(&mut tx, ticket_ids, raffle_id).await?;
        if let Some(missing) = ticket_ids.iter().find(|id| !active.contains(id)) {
            return Err(EligibilityError::TicketNotActive(*missing).into());
        }
        RaffleTicket::consume_tx(&mut tx, ticket_ids, raffle_id).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn mark_winner(&self, ticket_id: Uuid, raffle_id: Uuid) -> Result<(), PipelineError> {
        let mut tx = self.db.begin().await?;
        if RaffleTicket::mark_won_tx(&mut tx, ticket_id, raffle_id).await? != 1 {
            return Err(PipelineError::conflict(
                "ticket",
                ticket_id,
                "not consumed",
                TicketStatus::Won,
            ));
        }
        tx.commit().await?;
        Ok(())
    }

    async fn associate(&self, user_id: Uuid, raffle_id: Uuid) -> Result<u64, PipelineError> {
        let mut tx = self.db.begin().await?;
        let raffle = Raffle::lock_tx(&mut tx, raffle_id)
            .await?
            .ok_or(PipelineError::NotFound("raffle", raffle_id))?;
        if raffle.status != RaffleStatus::Active {
            return Err(EligibilityError::RaffleNotActive {
                raffle_id,
                status: raffle.status,
            }
            .into());
        }

        let ids = RaffleTicket::lock_unassigned_for_user_tx(&mut tx, user_id).await?;
        if ids.is_empty() {
            return Ok(0);
        }
        if !has_room_tx(&mut tx, &raffle, user_id).await? {
            return Err(PipelineError::ConstraintViolation(format!(
                "raffle {raffle_id} reached its participant limit"
            )));
        }

        let count = i64::try_from(ids.len()).unwrap_or(i64::MAX);
        let first = RaffleTicket::allocate_numbers_tx(&mut tx, Some(raffle_id), count).await?;
        let numbers: Vec<i64> = (first..first + count).collect();
        let moved = RaffleTicket::assign_tx(&mut tx, raffle_id, &ids, &numbers).await?;
        tx.commit().await?;
        Ok(moved)
    }

    async fn expire(&self, cutoff: OffsetDateTime) -> Result<u64, PipelineError> {
        Ok(self.db.process(ExpireTickets { cutoff }).await?)
    }

    async fn active_tickets(&self, raffle_id: Uuid) -> Result<Vec<RaffleTicket>, PipelineError> {
        Ok(self.db.process(GetActiveTicketsForRaffle { raffle_id }).await?)
    }
}

#[async_trait]
impl RaffleStore for PgStore {
    async fn raffle(&self, raffle_id: Uuid) -> Result<Option<Raffle>, PipelineError> {
        Ok(self.db.process(GetRaffleById { raffle_id }).await?)
    }

    async fn prizes(&self, raffle_id: Uuid) -> Result<Vec<Prize>, PipelineError> {
        Ok(self.db.process(GetPrizesForRaffle { raffle_id }).await?)
    }

    async fn prize(&self, prize_id: Uuid) -> Result<Option<Prize>, PipelineError> {
        Ok(self.db.process(GetPrizeById { prize_id }).await?)
    }

    async fn due_raffles(&self, now: OffsetDateTime) -> Result<Vec<Raffle>, PipelineError> {
        Ok(self.db.process(GetDueRaffles { now }).await?)
    }

    async fn transition_raffle(
        &self,
        transition: RaffleTransition,
    ) -> Result<Raffle, PipelineError> {
        let mut tx = self.db.begin().await?;
        let mut raffle = Raffle::lock_tx(&mut tx, transition.raffle_id)
            .await?
            .ok_or(PipelineError::NotFound("raffle", transition.raffle_id))?;
        if raffle.status != transition.from {
            return Err(PipelineError::conflict(
                "raffle",
                raffle.id,
                raffle.status,
                transition.to,
            ));
        }

        Raffle::update_status_tx(
            &mut tx,
            raffle.id,
            transition.from,
            transition.to,
            transition.seed_commitment.as_deref(),
        )
        .await?;
        if transition.to == RaffleStatus::Cancelled {
            let cancelled = RaffleTicket::cancel_for_raffle_tx(&mut tx, raffle.id).await?;
            debug!(raffle_id = %raffle.id, cancelled, "Cancelled raffle tickets");
        }
        tx.commit().await?;

        raffle.status = transition.to;
        if let Some(commitment) = transition.seed_commitment {
            raffle.seed_commitment = Some(commitment);
        }
        Ok(raffle)
    }

    async fn commit_draw(&self, commit: DrawCommit) -> Result<Vec<RaffleWinner>, PipelineError> {
        let mut tx = self.db.begin().await?;
        let raffle = Raffle::lock_tx(&mut tx, commit.raffle_id)
            .await?
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
        let active = RaffleTicket::lock_active_tx(&mut tx, &ticket_ids, raffle.id).await?;
        if let Some(missing) = ticket_ids.iter().find(|id| !active.contains(id)) {
            return Err(EligibilityError::TicketNotActive(*missing).into());
        }
        RaffleTicket::consume_tx(&mut tx, &ticket_ids, raffle.id).await?;
        for ticket_id in &ticket_ids {
            if RaffleTicket::mark_won_tx(&mut tx, *ticket_id, raffle.id).await? != 1 {
                return Err(PipelineError::conflict(
                    "ticket",
                    *ticket_id,
                    "not consumed",
                    TicketStatus::Won,
                ));
            }
        }
        RaffleWinner::insert_many_tx(&mut tx, &commit.winners).await?;

        let seed = i64::from_be_bytes(commit.seed.to_be_bytes());
        if !Raffle::complete_tx(&mut tx, raffle.id, seed, commit.completed_at).await? {
            return Err(PipelineError::conflict(
                "raffle",
                raffle.id,
                raffle.status,
                RaffleStatus::Completed,
            ));
        }
        tx.commit().await?;
        Ok(commit.winners)
    }
}

#[async_trait]
impl WinnerStore for PgStore {
    async fn winner(&self, winner_id: Uuid) -> Result<Option<RaffleWinner>, PipelineError> {
        Ok(self.db.process(GetWinnerById { winner_id }).await?)
    }

    async fn overdue_winners(
        &self,
        now: OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<RaffleWinner>, PipelineError> {
        Ok(self.db.process(ListOverdueWinners { now, limit }).await?)
    }

    async fn save_winner(
        &self,
        winner: &RaffleWinner,
        expected: WinnerStatus,
    ) -> Result<bool, PipelineError> {
        Ok(RaffleWinner::compare_and_set(self.pool(), winner, expected).await?)
    }
}
