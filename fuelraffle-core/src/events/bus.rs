//! Publishing seam and an in-process, at-least-once bus.
//!
//! [`InProcessBus`] behaves like a topic-routed broker: every subscription
//! bound to a topic gets its own copy of each message, bodies travel as JSON,
//! a negatively acknowledged delivery comes back after a delay, and a message
//! that keeps failing is moved to a bounded dead-letter list.

use super::channels::{DeliveryReceiver, DeliverySender, delivery_channel};
use super::types::{Delivery, PipelineEvent};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("event codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    #[error("bus unavailable: {0}")]
    Unavailable(String),
}

/// Anything events can be published to.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &PipelineEvent) -> Result<(), BusError>;
}

/// Dead letters kept before the oldest are dropped.
pub const MAX_DEAD_LETTERS: usize = 1024;

/// A message that exhausted its deliveries.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub delivery: Delivery,
    pub subscription: String,
    pub reason: String,
}

#[derive(Clone, Default)]
pub struct InProcessBus {
    routes: Arc<RwLock<HashMap<&'static str, Vec<DeliverySender>>>>,
    dead_letters: Arc<RwLock<VecDeque<DeadLetter>>>,
}

impl InProcessBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a new subscription to `topics`.
    ///
    /// Only messages published after this call are delivered.
    pub async fn subscribe(
        &self,
        name: impl Into<String>,
        topics: &[&'static str],
        max_delivery_attempts: u32,
        redelivery_delay: Duration,
    ) -> Subscription {
        let (tx, rx) = delivery_channel();
        let mut routes = self.routes.write().await;
        for topic in topics {
            routes.entry(*topic).or_default().push(tx.clone());
        }
        Subscription {
            name: name.into(),
            rx,
            redeliver_tx: tx,
            max_delivery_attempts: max_delivery_attempts.max(1),
            redelivery_delay,
            dead_letters: Arc::clone(&self.dead_letters),
        }
    }

    /// Dead letters, oldest first.
    pub async fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters.read().await.iter().cloned().collect()
    }
}

#[async_trait]
impl EventPublisher for InProcessBus {
    async fn publish(&self, event: &PipelineEvent) -> Result<(), BusError> {
        let body = event.encode()?;
        let topic = event.topic();
        let subscribers: Vec<DeliverySender> = self
            .routes
            .read()
            .await
            .get(topic)
            .cloned()
            .unwrap_or_default();

        let message_id = Uuid::now_v7();
        debug!(
            topic,
            message_id = %message_id,
            subscribers = subscribers.len(),
            "Publishing event"
        );

        for sender in subscribers {
            let delivery = Delivery {
                message_id,
                topic,
                routing_key: event.routing_key(),
                body: body.clone(),
                attempt: 1,
            };
            // A dropped subscription just stops receiving.
            if sender.send(delivery).await.is_err() {
                debug!(topic, "Subscription closed, skipping");
            }
        }
        Ok(())
    }
}

/// The receiving end of one subscription.
pub struct Subscription {
    name: String,
    rx: DeliveryReceiver,
    redeliver_tx: DeliverySender,
    max_delivery_attempts: u32,
    redelivery_delay: Duration,
    dead_letters: Arc<RwLock<VecDeque<DeadLetter>>>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Delivery> {
        self.rx.try_recv().ok()
    }

    /// Hand a failed delivery back to the bus.
    ///
    /// It is redelivered after the redelivery delay, or dead-lettered once it
    /// has been delivered `max_delivery_attempts` times.
    pub async fn nack(&self, mut delivery: Delivery, reason: impl Into<String>) {
        let reason = reason.into();
        if delivery.attempt >= self.max_delivery_attempts {
            error!(
                subscription = %self.name,
                topic = delivery.topic,
                message_id = %delivery.message_id,
                attempts = delivery.attempt,
                reason = %reason,
                "Delivery attempts exhausted, dead-lettering"
            );
            let mut dead_letters = self.dead_letters.write().await;
            if dead_letters.len() >= MAX_DEAD_LETTERS
                && let Some(dropped) = dead_letters.pop_front()
            {
                warn!(
                    subscription = %dropped.subscription,
                    message_id = %dropped.delivery.message_id,
                    "Dead-letter list full, dropping oldest"
                );
            }
            dead_letters.push_back(DeadLetter {
                delivery,
                subscription: self.name.clone(),
                reason,
            });
            return;
        }

        warn!(
            subscription = %self.name,
            topic = delivery.topic,
            message_id = %delivery.message_id,
            attempt = delivery.attempt,
            reason = %reason,
            "Delivery failed, scheduling redelivery"
        );
        delivery.attempt += 1;
        let tx = self.redeliver_tx.clone();
        let delay = self.redelivery_delay;
        let name = self.name.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let message_id = delivery.message_id;
            if tx.send(delivery).await.is_err() {
                warn!(
                    subscription = %name,
                    message_id = %message_id,
                    "Subscription closed before redelivery, message lost"
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fuelraffle_sdk::objects::{RedemptionCompletedPayload, topics};

    fn redemption_event() -> PipelineEvent {
        PipelineEvent::RedemptionCompleted(RedemptionCompletedPayload {
            redemption_id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            station_id: Uuid::now_v7(),
            coupon_id: Uuid::now_v7(),
            tickets_eligible: 3,
            idempotency_key: "key".to_string(),
            occurred_at: 1_700_000_000,
        })
    }

    #[tokio::test]
    async fn test_each_subscription_gets_a_copy() {
        let bus = InProcessBus::new();
        let mut a = bus
            .subscribe("a", &[topics::REDEMPTION_COMPLETED], 3, Duration::ZERO)
            .await;
        let mut b = bus
            .subscribe("b", &[topics::REDEMPTION_COMPLETED], 3, Duration::ZERO)
            .await;
        let mut other = bus
            .subscribe("other", &[topics::WINNER_SELECTED], 3, Duration::ZERO)
            .await;

        let event = redemption_event();
        bus.publish(&event).await.unwrap();

        assert_eq!(a.recv().await.unwrap().event().unwrap(), event);
        assert_eq!(b.recv().await.unwrap().event().unwrap(), event);
        assert!(other.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_nack_redelivers_then_dead_letters() {
        let bus = InProcessBus::new();
        let mut sub = bus
            .subscribe(
                "flaky",
                &[topics::REDEMPTION_COMPLETED],
                2,
                Duration::from_millis(1),
            )
            .await;
        bus.publish(&redemption_event()).await.unwrap();

        let first = sub.recv().await.unwrap();
        assert_eq!(first.attempt, 1);
        sub.nack(first, "boom").await;

        let second = sub.recv().await.unwrap();
        assert_eq!(second.attempt, 2);
        sub.nack(second, "boom again").await;

        let dead = bus.dead_letters().await;
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].subscription, "flaky");
        assert_eq!(dead[0].reason, "boom again");
    }
    #[tokio::test]
    async fn test_dead_letters_are_bounded() {
        let bus = InProcessBus::new();
        let sub = bus
            .subscribe("doomed", &[topics::REDEMPTION_COMPLETED], 1, Duration::ZERO)
            .await;
        let body = redemption_event().encode().unwrap();

        let mut ids = Vec::new();
        for _ in 0..MAX_DEAD_LETTERS + 5 {
            let delivery = Delivery {
                message_id: Uuid::now_v7(),
                topic: topics::REDEMPTION_COMPLETED,
                routing_key: Uuid::now_v7(),
                body: body.clone(),
                attempt: 1,
            };
            ids.push(delivery.message_id);
            sub.nack(delivery, "poison").await;
        }

        let dead = bus.dead_letters().await;
        assert_eq!(dead.len(), MAX_DEAD_LETTERS);
        assert_eq!(dead[0].delivery.message_id, ids[5]);
        assert_eq!(dead[MAX_DEAD_LETTERS - 1].delivery.message_id, ids[ids.len() - 1]);
    }
}
