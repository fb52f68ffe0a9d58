//! Fixtures shared by the processor tests.

use crate::entities::coupon::Coupon;
use crate::entities::prize::Prize;
use crate::entities::raffle::Raffle;
use crate::entities::{PrizeDelivery, RaffleStatus};
use crate::events::{BusError, EventPublisher, PipelineEvent};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use time::OffsetDateTime;
use time::macros::datetime;
use tokio::sync::Mutex;
use uuid::Uuid;

pub const SECRET: &[u8] = b"draw-secret-for-tests";

pub fn raffle(status: RaffleStatus) -> Raffle {
    Raffle {
        id: Uuid::now_v7(),
        name: "March fill-up raffle".to_string(),
        status,
        registration_start: datetime!(2026-03-01 00:00 UTC),
        registration_end: datetime!(2026-03-31 00:00 UTC),
        draw_at: datetime!(2026-04-01 12:00 UTC),
        max_participants: None,
        min_tickets_to_participate: 1,
        allow_multiple_wins: false,
        seed_commitment: None,
        draw_seed: None,
        completed_at: None,
    }
}

pub fn prize(raffle_id: Uuid, tier: i32, delivery: PrizeDelivery) -> Prize {
    Prize {
        id: Uuid::now_v7(),
        raffle_id,
        name: format!("Tier {tier} prize"),
        tier,
        quantity: 1,
        delivery,
        requires_identity_verification: false,
    }
}

pub fn coupon(owner: Option<Uuid>, tickets: i32) -> Coupon {
    Coupon {
        id: Uuid::now_v7(),
        owner_user_id: owner,
        active: true,
        expires_at: Some(datetime!(2026-12-31 00:00 UTC)),
        tickets_per_redemption: tickets,
    }
}

/// Inside the registration window of [`raffle`].
pub fn during_registration() -> OffsetDateTime {
    datetime!(2026-03-10 09:30 UTC)
}

/// After the draw time of [`raffle`].
pub fn after_draw() -> OffsetDateTime {
    datetime!(2026-04-01 12:05 UTC)
}

/// Records every published event and can be switched to fail.
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<PipelineEvent>>,
    failing: AtomicBool,
}

impl RecordingPublisher {
    pub fn failing() -> Self {
        let publisher = Self::default();
        publisher.set_failing(true);
        publisher
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().await.clone()
    }

    pub async fn topics(&self) -> Vec<&'static str> {
        self.events.lock().await.iter().map(|e| e.topic()).collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &PipelineEvent) -> Result<(), BusError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BusError::Unavailable("broker down".to_string()));
        }
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}
