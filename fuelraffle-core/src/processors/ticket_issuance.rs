//! Ticket issuance.
//!
//! [`TicketIssuer`] turns one `redemption.completed` or `ad.engagement.completed`
//! event into one ticket batch. The ledger's inbox makes this idempotent: the
//! idempotency key carried by the event is the batch's source event id, and a
//! second delivery of the same event finds the batch and mints nothing.
//!
//! [`TicketIssuanceConsumer`] drives the issuer from a bus subscription and
//! nacks deliveries that fail so the bus can redeliver or dead-letter them.

use crate::config::{ConfigStore, PipelineConfig};
use crate::entities::TicketSource;
use crate::error::PipelineError;
use crate::events::{Delivery, EventPublisher, PipelineEvent, Subscription};
use crate::store::{IssueOutcome, IssueTickets, TicketLedger};
use crate::utils::ad_multiplier::{calculate_bonus_tickets, qualifies_for_rewards};
use crate::utils::idempotency::engagement_key;
use fuelraffle_sdk::objects::{
    AdEngagementCompletedPayload, RedemptionCompletedPayload, TicketsGeneratedPayload,
};
use kanau::processor::Processor;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// What handling one event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssuanceOutcome {
    Issued {
        batch_id: Uuid,
        raffle_id: Option<Uuid>,
        ticket_ids: Vec<Uuid>,
    },
    /// The source event already minted its batch.
    Duplicate,
    /// Nothing to mint: zero tickets, or an engagement that does not qualify.
    Skipped,
}

pub struct TicketIssuer<S: ?Sized> {
    ledger: Arc<S>,
    publisher: Arc<dyn EventPublisher>,
    config: ConfigStore<PipelineConfig>,
}

impl<S> TicketIssuer<S>
where
    S: TicketLedger + ?Sized,
{
    pub fn new(
        ledger: Arc<S>,
        publisher: Arc<dyn EventPublisher>,
        config: ConfigStore<PipelineConfig>,
    ) -> Self {
        Self {
            ledger,
            publisher,
            config,
        }
    }

    fn redemption_request(payload: &RedemptionCompletedPayload) -> Result<IssueTickets, PipelineError> {
        Ok(IssueTickets {
            source_type: TicketSource::Redemption,
            source_event_id: payload.idempotency_key.clone(),
            user_id: payload.user_id,
            count: payload.tickets_eligible,
            generated_at: generated_at(payload.occurred_at)?,
        })
    }

    async fn engagement_request(
        &self,
        payload: &AdEngagementCompletedPayload,
    ) -> Result<Option<IssueTickets>, PipelineError> {
        let rules = self.config.read().await.ad_rewards.clone();
        if !qualifies_for_rewards(&rules, &payload.engagement) {
            debug!(
                engagement_id = %payload.engagement_id,
                "Engagement does not qualify for tickets"
            );
            return Ok(None);
        }

        let base = payload.base_tickets.min(rules.max_tickets_per_engagement);
        if base != payload.base_tickets {
            warn!(
                engagement_id = %payload.engagement_id,
                reported = payload.base_tickets,
                cap = rules.max_tickets_per_engagement,
                "Base tickets above the per-engagement cap, clamping"
            );
        }
        let bonus = calculate_bonus_tickets(&rules, base, &payload.engagement);
        if bonus != payload.bonus_tickets {
            warn!(
                engagement_id = %payload.engagement_id,
                reported = payload.bonus_tickets,
                computed = bonus,
                "Producer bonus differs from local rules, using local rules"
            );
        }

        let source_event_id = if payload.idempotency_key.is_empty() {
            engagement_key(payload.engagement_id, payload.user_id)
        } else {
            payload.idempotency_key.clone()
        };
        Ok(Some(IssueTickets {
            source_type: TicketSource::AdEngagement,
            source_event_id,
            user_id: payload.user_id,
            count: base.saturating_add(bonus),
            generated_at: generated_at(payload.occurred_at)?,
        }))
    }

    async fn announce(&self, request: &IssueTickets, raffle_id: Option<Uuid>, ticket_ids: &[Uuid]) {
        let event = PipelineEvent::TicketsGenerated(TicketsGeneratedPayload {
            ticket_ids: ticket_ids.to_vec(),
            user_id: request.user_id,
            raffle_id,
            source_type: request.source_type.into(),
            source_event_id: request.source_event_id.clone(),
        });
        if let Err(e) = self.publisher.publish(&event).await {
            warn!(
                source_event_id = %request.source_event_id,
                error = %e,
                "Failed to publish raffle.tickets.generated"
            );
        }
    }
}

fn generated_at(occurred_at: i64) -> Result<OffsetDateTime, PipelineError> {
    OffsetDateTime::from_unix_timestamp(occurred_at)
        .map_err(|e| PipelineError::InvalidInput(format!("occurredAt {occurred_at}: {e}")))
}

impl<S> Processor<PipelineEvent> for TicketIssuer<S>
where
    S: TicketLedger + ?Sized,
{
    type Output = IssuanceOutcome;
    type Error = PipelineError;

    #[tracing::instrument(skip_all, err, fields(topic = event.topic()))]
    async fn process(&self, event: PipelineEvent) -> Result<IssuanceOutcome, PipelineError> {
        let request = match &event {
            PipelineEvent::RedemptionCompleted(payload) => Self::redemption_request(payload)?,
            PipelineEvent::AdEngagementCompleted(payload) => {
                match self.engagement_request(payload).await? {
                    Some(request) => request,
                    None => return Ok(IssuanceOutcome::Skipped),
                }
            }
            other => {
                return Err(PipelineError::InvalidInput(format!(
                    "ticket issuance does not handle {}",
                    other.topic()
                )));
            }
        };

        if request.count == 0 {
            debug!(source_event_id = %request.source_event_id, "Zero tickets, nothing to mint");
            return Ok(IssuanceOutcome::Skipped);
        }

        match self.ledger.issue(request.clone()).await? {
            IssueOutcome::Duplicate => {
                debug!(
                    source_type = %request.source_type,
                    source_event_id = %request.source_event_id,
                    "Batch already minted"
                );
                Ok(IssuanceOutcome::Duplicate)
            }
            IssueOutcome::Issued { batch, tickets } => {
                let ticket_ids: Vec<Uuid> = tickets.iter().map(|t| t.id).collect();
                info!(
                    batch_id = %batch.id,
                    user_id = %batch.user_id,
                    raffle_id = ?batch.raffle_id,
                    count = ticket_ids.len(),
                    "Tickets issued"
                );
                self.announce(&request, batch.raffle_id, &ticket_ids).await;
                Ok(IssuanceOutcome::Issued {
                    batch_id: batch.id,
                    raffle_id: batch.raffle_id,
                    ticket_ids,
                })
            }
        }
    }
}

/// Feeds deliveries from a bus subscription into a [`TicketIssuer`].
pub struct TicketIssuanceConsumer<S: ?Sized> {
    issuer: TicketIssuer<S>,
    subscription: Subscription,
}

impl<S> TicketIssuanceConsumer<S>
where
    S: TicketLedger + ?Sized,
{
    pub fn new(issuer: TicketIssuer<S>, subscription: Subscription) -> Self {
        Self {
            issuer,
            subscription,
        }
    }

    async fn handle(&self, delivery: Delivery) {
        let event = match delivery.event() {
            Ok(event) => event,
            Err(e) => {
                self.subscription.nack(delivery, e.to_string()).await;
                return;
            }
        };
        match self.issuer.process(event).await {
            Ok(_) | Err(PipelineError::DuplicateEvent { .. }) => {}
            Err(e) => {
                error!(
                    message_id = %delivery.message_id,
                    attempt = delivery.attempt,
                    error = %e,
                    "Ticket issuance failed"
                );
                self.subscription.nack(delivery, e.to_string()).await;
            }
        }
    }

    /// Wait for one delivery and handle it. Returns `false` once the
    /// subscription is closed.
    pub async fn handle_next(&mut self) -> bool {
        match self.subscription.recv().await {
            Some(delivery) => {
                self.handle(delivery).await;
                true
            }
            None => false,
        }
    }

    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        info!("TicketIssuanceConsumer started");
        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("TicketIssuanceConsumer received shutdown signal");
                        break;
                    }
                }

                Some(delivery) = self.subscription.recv() => {
                    debug!(
                        topic = delivery.topic,
                        message_id = %delivery.message_id,
                        attempt = delivery.attempt,
                        "Received delivery"
                    );
                    self.handle(delivery).await;
                }

                else => {
                    info!("Issuance subscription closed");
                    break;
                }
            }
        }
    }
}
