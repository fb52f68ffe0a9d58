//! WinnerClaims service.
//!
//! Loads a winner, applies one of the pure operations from
//! [`crate::lifecycle::winner`], stores the result with a compare-and-set on the
//! previous status and publishes the resulting events.

use crate::entities::prize::Prize;
use crate::entities::raffle_winner::RaffleWinner;
use crate::error::PipelineError;
use crate::events::EventPublisher;
use crate::lifecycle::winner::{self, DeliveryInfo, WinnerUpdate};
use crate::store::{RaffleStore, WinnerStore};
use fuelraffle_sdk::objects::DeliveryStatus;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Overdue winners handled per store round trip.
const EXPIRE_BATCH: i64 = 100;

pub struct WinnerClaims<S: ?Sized> {
    store: Arc<S>,
    publisher: Arc<dyn EventPublisher>,
}

impl<S> WinnerClaims<S>
where
    S: WinnerStore + RaffleStore + ?Sized,
{
    pub fn new(store: Arc<S>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self { store, publisher }
    }

    pub async fn winner(&self, winner_id: Uuid) -> Result<RaffleWinner, PipelineError> {
        self.store
            .winner(winner_id)
            .await?
            .ok_or(PipelineError::NotFound("winner", winner_id))
    }

    async fn with_prize(&self, winner_id: Uuid) -> Result<(RaffleWinner, Prize), PipelineError> {
        let winner = self.winner(winner_id).await?;
        let prize = self
            .store
            .prize(winner.prize_id)
            .await?
            .ok_or(PipelineError::NotFound("prize", winner.prize_id))?;
        Ok((winner, prize))
    }

    async fn commit(&self, update: WinnerUpdate) -> Result<RaffleWinner, PipelineError> {
        let WinnerUpdate {
            winner,
            expected_status,
            events,
        } = update;

        if !self.store.save_winner(&winner, expected_status).await? {
            // Someone else moved the winner first; report what it is now.
            let current = self.winner(winner.id).await?;
            return Err(PipelineError::conflict(
                "winner",
                winner.id,
                current.status,
                winner.status,
            ));
        }
        debug!(winner_id = %winner.id, status = %winner.status, "Winner saved");

        for event in &events {
            if let Err(e) = self.publisher.publish(event).await {
                warn!(
                    winner_id = %winner.id,
                    topic = event.topic(),
                    error = %e,
                    "Failed to publish winner event"
                );
            }
        }
        Ok(winner)
    }

    #[tracing::instrument(skip(self, processed_by), err)]
    pub async fn claim(
        &self,
        winner_id: Uuid,
        processed_by: &str,
        now: OffsetDateTime,
    ) -> Result<RaffleWinner, PipelineError> {
        let (current, prize) = self.with_prize(winner_id).await?;
        let claimed = self
            .commit(winner::claim(&current, &prize, processed_by, now)?)
            .await?;
        info!(winner_id = %claimed.id, prize_id = %prize.id, "Prize claimed");
        Ok(claimed)
    }

    #[tracing::instrument(skip(self, verified_by, identity_document_ref), err)]
    pub async fn verify(
        &self,
        winner_id: Uuid,
        verified_by: &str,
        identity_document_ref: &str,
        now: OffsetDateTime,
    ) -> Result<RaffleWinner, PipelineError> {
        let current = self.winner(winner_id).await?;
        self.commit(winner::verify(&current, verified_by, identity_document_ref, now)?)
            .await
    }

    pub async fn forfeit(
        &self,
        winner_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<RaffleWinner, PipelineError> {
        let current = self.winner(winner_id).await?;
        let forfeited = self.commit(winner::forfeit(&current, now)?).await?;
        info!(winner_id = %forfeited.id, "Prize forfeited");
        Ok(forfeited)
    }

    pub async fn disqualify(
        &self,
        winner_id: Uuid,
        reason: &str,
        decided_by: &str,
        now: OffsetDateTime,
    ) -> Result<RaffleWinner, PipelineError> {
        if reason.trim().is_empty() {
            return Err(PipelineError::InvalidInput(
                "disqualification needs a reason".to_string(),
            ));
        }
        let current = self.winner(winner_id).await?;
        let disqualified = self
            .commit(winner::disqualify(&current, reason, decided_by, now)?)
            .await?;
        info!(winner_id = %disqualified.id, decided_by, "Winner disqualified");
        Ok(disqualified)
    }

    pub async fn set_delivery_info(
        &self,
        winner_id: Uuid,
        info: DeliveryInfo,
        now: OffsetDateTime,
    ) -> Result<RaffleWinner, PipelineError> {
        let current = self.winner(winner_id).await?;
        self.commit(winner::set_delivery_info(&current, info, now)?)
            .await
    }

    pub async fn update_delivery_status(
        &self,
        winner_id: Uuid,
        status: DeliveryStatus,
        note: Option<String>,
        now: OffsetDateTime,
    ) -> Result<RaffleWinner, PipelineError> {
        let (current, prize) = self.with_prize(winner_id).await?;
        self.commit(winner::update_delivery_status(
            &current, &prize, status, note, now,
        )?)
        .await
    }

    /// Expire every PENDING_CLAIM winner whose deadline has passed.
    ///
    /// Winners claimed concurrently are skipped. Returns how many expired.
    pub async fn expire_overdue(&self, now: OffsetDateTime) -> Result<u64, PipelineError> {
        let mut expired = 0u64;
        loop {
            let overdue = self.store.overdue_winners(now, EXPIRE_BATCH).await?;
            let fetched = overdue.len();
            let mut progressed = false;

            for current in overdue {
                match self.commit(winner::expire(&current, now)?).await {
                    Ok(_) => {
                        expired += 1;
                        progressed = true;
                    }
                    Err(PipelineError::StateConflict { .. }) => {
                        debug!(winner_id = %current.id, "Winner changed before expiry");
                        progressed = true;
                    }
                    Err(e) => return Err(e),
                }
            }

            if fetched < usize::try_from(EXPIRE_BATCH).unwrap_or(usize::MAX) || !progressed {
                break;
            }
        }
        if expired > 0 {
            info!(expired, "Expired overdue winners");
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{PrizeDelivery, WinnerStatus};
    use crate::error::{EligibilityError, ExpiredKind};
    use crate::store::MemoryStore;
    use crate::test_support::{RecordingPublisher, after_draw, prize};
    use crate::events::PipelineEvent;

    struct Harness {
        store: Arc<MemoryStore>,
        publisher: Arc<RecordingPublisher>,
        claims: WinnerClaims<MemoryStore>,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let publisher = Arc::new(RecordingPublisher::default());
        let claims = WinnerClaims::new(
            Arc::clone(&store),
            Arc::clone(&publisher) as Arc<dyn EventPublisher>,
        );
        Harness {
            store,
            publisher,
            claims,
        }
    }

    async fn seeded_winner(h: &Harness, prize: Prize) -> RaffleWinner {
        let won_at = after_draw();
        let winner = RaffleWinner::pending(
            prize.raffle_id,
            Uuid::now_v7(),
            Uuid::now_v7(),
            prize.id,
            won_at,
            won_at + time::Duration::days(7),
        );
        h.store.insert_prize(prize).await;
        h.store.insert_winner(winner.clone()).await;
        winner
    }

    #[tokio::test]
    async fn test_claim_then_deliver_physical_prize() {
        let h = harness();
        let winner = seeded_winner(&h, prize(Uuid::now_v7(), 1, PrizeDelivery::Physical)).await;
        let later = after_draw() + time::Duration::days(1);

        let claimed = h.claims.claim(winner.id, "desk-3", later).await.unwrap();
        assert_eq!(claimed.status, WinnerStatus::Claimed);
        assert_eq!(claimed.processed_by.as_deref(), Some("desk-3"));

        assert!(matches!(
            h.claims
                .update_delivery_status(winner.id, DeliveryStatus::Shipped, None, later)
                .await,
            Err(PipelineError::Eligibility(
                EligibilityError::DeliveryInfoMissing(_)
            ))
        ));

        h.claims
            .set_delivery_info(
                winner.id,
                DeliveryInfo {
                    recipient: "A. Driver".to_string(),
                    address: "1 Forecourt Way".to_string(),
                    method: "courier".to_string(),
                    tracking_reference: Some("TRK-1".to_string()),
                },
                later,
            )
            .await
            .unwrap();
        h.claims
            .update_delivery_status(winner.id, DeliveryStatus::Shipped, None, later)
            .await
            .unwrap();
        let delivered = h
            .claims
            .update_delivery_status(
                winner.id,
                DeliveryStatus::Delivered,
                Some("signed for".to_string()),
                later,
            )
            .await
            .unwrap();
        assert_eq!(delivered.status, WinnerStatus::Delivered);
        assert_eq!(delivered.delivery_log.len(), 3);

        let events = h.publisher.events().await;
        assert_eq!(events.len(), 4);
        assert!(matches!(
            events.last(),
            Some(PipelineEvent::WinnerUpdated(p))
                if p.status == fuelraffle_sdk::objects::WinnerStatus::Delivered
        ));
    }

    #[tokio::test]
    async fn test_claim_rules() {
        let h = harness();
        let mut guarded = prize(Uuid::now_v7(), 1, PrizeDelivery::Digital);
        guarded.requires_identity_verification = true;
        let winner = seeded_winner(&h, guarded).await;
        let later = after_draw() + time::Duration::hours(2);

        assert!(matches!(
            h.claims.claim(winner.id, "desk", later).await,
            Err(PipelineError::Eligibility(
                EligibilityError::VerificationRequired(_)
            ))
        ));

        let verified = h
            .claims
            .verify(winner.id, "kyc-officer", "passport:123", later)
            .await
            .unwrap();
        assert!(verified.is_verified);
        assert_eq!(verified.status, WinnerStatus::PendingClaim);

        h.claims.claim(winner.id, "desk", later).await.unwrap();
        assert!(matches!(
            h.claims.claim(winner.id, "desk", later).await,
            Err(PipelineError::StateConflict { .. })
        ));
        assert!(matches!(
            h.claims.forfeit(winner.id, later).await,
            Err(PipelineError::StateConflict { .. })
        ));

        let disqualified = h
            .claims
            .disqualify(winner.id, "fraud", "auditor", later)
            .await
            .unwrap();
        assert_eq!(disqualified.status, WinnerStatus::Disqualified);
    }

    #[tokio::test]
    async fn test_late_claim_is_rejected_and_sweep_expires() {
        let h = harness();
        let winner = seeded_winner(&h, prize(Uuid::now_v7(), 2, PrizeDelivery::Digital)).await;
        let too_late = winner.claim_deadline + time::Duration::seconds(1);

        assert!(matches!(
            h.claims.claim(winner.id, "desk", too_late).await,
            Err(PipelineError::Expired(ExpiredKind::ClaimDeadline(_)))
        ));
        assert_eq!(h.claims.expire_overdue(after_draw()).await.unwrap(), 0);
        assert_eq!(h.claims.expire_overdue(too_late).await.unwrap(), 1);

        let expired = h.claims.winner(winner.id).await.unwrap();
        assert_eq!(expired.status, WinnerStatus::Expired);
        assert!(matches!(
            h.claims.claim(winner.id, "desk", too_late).await,
            Err(PipelineError::StateConflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_stale_write_is_a_conflict() {
        let h = harness();
        let winner = seeded_winner(&h, prize(Uuid::now_v7(), 1, PrizeDelivery::Digital)).await;
        let later = after_draw() + time::Duration::hours(1);

        // Computed against PENDING_CLAIM, committed after the winner forfeits.
        let stale = winner::claim(&winner, &prize(winner.raffle_id, 1, PrizeDelivery::Digital), "desk", later)
            .unwrap();
        h.claims.forfeit(winner.id, later).await.unwrap();

        assert!(matches!(
            h.claims.commit(stale).await,
            Err(PipelineError::StateConflict { ref from, .. }) if from == "Forfeited"
        ));
    }

    #[tokio::test]
    async fn test_unknown_winner() {
        let h = harness();
        assert!(matches!(
            h.claims.forfeit(Uuid::now_v7(), after_draw()).await,
            Err(PipelineError::NotFound("winner", _))
        ));
    }
}
