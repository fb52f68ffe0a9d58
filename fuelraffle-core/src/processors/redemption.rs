//! RedemptionProcessor.
//!
//! Turns a scanned QR token plus a coupon into a persisted redemption and a
//! `redemption.completed` event:
//! - verifies the token against the station signing key (no side effects on failure)
//! - derives the idempotency key and short-circuits rescans
//! - validates the coupon, then commits the redemption
//! - publishes after commit, retrying with backoff; if every retry fails the row
//!   stays unpublished and the outbox relay picks it up

use crate::config::{ConfigStore, PipelineConfig};
use crate::entities::redemption::{NewRedemption, Redemption, RedemptionVoid};
use crate::error::{EligibilityError, ExpiredKind, PipelineError};
use crate::events::{EventPublisher, PipelineEvent};
use crate::store::{CouponDirectory, RedemptionInsert, RedemptionStore};
use crate::utils::idempotency::redemption_key;
use crate::utils::retry::with_backoff;
use fuelraffle_sdk::objects::{RedemptionCompletedPayload, RedemptionOutcomeKind};
use fuelraffle_sdk::signature::verify_content;
use kanau::processor::Processor;
use rust_decimal::Decimal;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A redemption attempt at a dispenser.
#[derive(Debug, Clone)]
pub struct RedeemCommand {
    pub qr_content: String,
    pub coupon_id: Uuid,
    pub user_id: Uuid,
    pub fuel_amount: Decimal,
    pub fuel_price: Decimal,
    pub now: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct VoidRedemption {
    pub redemption_id: Uuid,
    pub reason: String,
    pub voided_by: String,
    pub now: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedemptionReceipt {
    pub redemption: Redemption,
    pub outcome: RedemptionOutcomeKind,
}

/// The `redemption.completed` event for a committed redemption.
pub(crate) fn completed_event(redemption: &Redemption) -> PipelineEvent {
    PipelineEvent::RedemptionCompleted(RedemptionCompletedPayload {
        redemption_id: redemption.id,
        user_id: redemption.user_id,
        station_id: redemption.station_id,
        coupon_id: redemption.coupon_id,
        tickets_eligible: u32::try_from(redemption.tickets_eligible).unwrap_or(0),
        idempotency_key: redemption.idempotency_key.clone(),
        occurred_at: redemption.created_at.unix_timestamp(),
    })
}

pub struct RedemptionProcessor<S: ?Sized> {
    store: Arc<S>,
    publisher: Arc<dyn EventPublisher>,
    config: ConfigStore<PipelineConfig>,
    public_key: Arc<[u8]>,
}

impl<S> RedemptionProcessor<S>
where
    S: RedemptionStore + CouponDirectory + ?Sized,
{
    /// # Arguments
    ///
    /// * `public_key` - Ed25519 public key the station tokens are verified against
    pub fn new(
        store: Arc<S>,
        publisher: Arc<dyn EventPublisher>,
        config: ConfigStore<PipelineConfig>,
        public_key: Arc<[u8]>,
    ) -> Self {
        Self {
            store,
            publisher,
            config,
            public_key,
        }
    }

    async fn publish(&self, redemption: &Redemption) -> Result<RedemptionOutcomeKind, PipelineError> {
        let policy = self.config.read().await.redemption.publish_retry;
        let event = completed_event(redemption);
        let publisher = &self.publisher;
        let event_ref = &event;

        let published = with_backoff(&policy, "publish redemption.completed", move || {
            publisher.publish(event_ref)
        })
        .await;

        match published {
            Ok(()) => {
                self.store
                    .mark_published(redemption.id, OffsetDateTime::now_utc())
                    .await?;
                Ok(RedemptionOutcomeKind::Completed)
            }
            Err(e) => {
                warn!(
                    redemption_id = %redemption.id,
                    error = %e,
                    "Publish retries exhausted, redemption left for the outbox relay"
                );
                self.store.record_publish_failure(redemption.id).await?;
                Ok(RedemptionOutcomeKind::NotificationPending)
            }
        }
    }
}

impl<S> Processor<RedeemCommand> for RedemptionProcessor<S>
where
    S: RedemptionStore + CouponDirectory + ?Sized,
{
    type Output = RedemptionReceipt;
    type Error = PipelineError;

    #[tracing::instrument(skip_all, err, fields(coupon_id = %cmd.coupon_id, user_id = %cmd.user_id))]
    async fn process(&self, cmd: RedeemCommand) -> Result<RedemptionReceipt, PipelineError> {
        if cmd.fuel_amount <= Decimal::ZERO {
            return Err(PipelineError::InvalidInput(
                "fuel amount must be positive".to_string(),
            ));
        }
        if cmd.fuel_price < Decimal::ZERO {
            return Err(PipelineError::InvalidInput(
                "fuel price must not be negative".to_string(),
            ));
        }

        let payload = verify_content(&cmd.qr_content, &self.public_key, cmd.now.unix_timestamp())?;
        let key = redemption_key(
            payload.station_id,
            payload.dispenser_id,
            cmd.coupon_id,
            payload.issued_at,
        );

        if let Some(existing) = self.store.redemption_by_key(&key).await? {
            debug!(redemption_id = %existing.id, "Redemption already recorded");
            return Ok(RedemptionReceipt {
                redemption: existing,
                outcome: RedemptionOutcomeKind::Duplicate,
            });
        }

        let coupon = self
            .store
            .coupon(cmd.coupon_id)
            .await?
            .ok_or(PipelineError::NotFound("coupon", cmd.coupon_id))?;
        if !coupon.active {
            return Err(EligibilityError::CouponInactive(coupon.id).into());
        }
        if coupon.is_expired_at(cmd.now) {
            return Err(PipelineError::Expired(ExpiredKind::Coupon(coupon.id)));
        }
        if coupon.owner_user_id.is_some_and(|owner| owner != cmd.user_id) {
            return Err(EligibilityError::CouponNotOwned {
                coupon_id: coupon.id,
                user_id: cmd.user_id,
            }
            .into());
        }

        let token_issued_at = OffsetDateTime::from_unix_timestamp(payload.issued_at)
            .map_err(|e| PipelineError::InvalidInput(format!("token issue time: {e}")))?;
        let new = NewRedemption {
            id: Uuid::now_v7(),
            idempotency_key: key,
            coupon_id: coupon.id,
            station_id: payload.station_id,
            dispenser_id: payload.dispenser_id,
            user_id: cmd.user_id,
            fuel_amount: cmd.fuel_amount,
            fuel_price: cmd.fuel_price,
            tickets_eligible: coupon.tickets_per_redemption.max(0),
            token_issued_at,
            created_at: cmd.now,
        };

        let redemption = match self.store.insert_redemption(new).await? {
            RedemptionInsert::Inserted(redemption) => redemption,
            RedemptionInsert::Existing(existing) => {
                debug!(redemption_id = %existing.id, "Lost insert race to an identical redemption");
                return Ok(RedemptionReceipt {
                    redemption: existing,
                    outcome: RedemptionOutcomeKind::Duplicate,
                });
            }
        };

        info!(
            redemption_id = %redemption.id,
            station_id = %redemption.station_id,
            tickets_eligible = redemption.tickets_eligible,
            "Redemption recorded"
        );

        let outcome = self.publish(&redemption).await?;
        Ok(RedemptionReceipt {
            redemption,
            outcome,
        })
    }
}

impl<S> Processor<VoidRedemption> for RedemptionProcessor<S>
where
    S: RedemptionStore + CouponDirectory + ?Sized,
{
    type Output = RedemptionVoid;
    type Error = PipelineError;

    #[tracing::instrument(skip_all, err, fields(redemption_id = %cmd.redemption_id))]
    async fn process(&self, cmd: VoidRedemption) -> Result<RedemptionVoid, PipelineError> {
        if cmd.reason.trim().is_empty() {
            return Err(PipelineError::InvalidInput(
                "a void needs a reason".to_string(),
            ));
        }
        let void = self
            .store
            .void_redemption(RedemptionVoid {
                id: Uuid::now_v7(),
                redemption_id: cmd.redemption_id,
                reason: cmd.reason,
                voided_by: cmd.voided_by,
                voided_at: cmd.now,
            })
            .await?;
        info!(void_id = %void.id, voided_by = %void.voided_by, "Redemption voided");
        Ok(void)
    }
}
