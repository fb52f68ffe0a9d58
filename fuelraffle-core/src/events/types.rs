//! Event type definitions.
//!
//! Events carry full payloads because downstream consumers live in other
//! services and cannot re-fetch from this database.

use fuelraffle_sdk::objects::{
    AdEngagementCompletedPayload, RedemptionCompletedPayload, TicketsGeneratedPayload,
    WinnerSelectedPayload, WinnerUpdatedPayload, topics,
};
use uuid::Uuid;

use super::bus::BusError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    RedemptionCompleted(RedemptionCompletedPayload),
    AdEngagementCompleted(AdEngagementCompletedPayload),
    TicketsGenerated(TicketsGeneratedPayload),
    WinnerSelected(WinnerSelectedPayload),
    WinnerUpdated(WinnerUpdatedPayload),
}

impl PipelineEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            PipelineEvent::RedemptionCompleted(_) => topics::REDEMPTION_COMPLETED,
            PipelineEvent::AdEngagementCompleted(_) => topics::AD_ENGAGEMENT_COMPLETED,
            PipelineEvent::TicketsGenerated(_) => topics::TICKETS_GENERATED,
            PipelineEvent::WinnerSelected(_) => topics::WINNER_SELECTED,
            PipelineEvent::WinnerUpdated(_) => topics::WINNER_UPDATED,
        }
    }

    /// Partitioning key: the user for ticket traffic, the raffle for draw traffic.
    pub fn routing_key(&self) -> Uuid {
        match self {
            PipelineEvent::RedemptionCompleted(p) => p.user_id,
            PipelineEvent::AdEngagementCompleted(p) => p.user_id,
            PipelineEvent::TicketsGenerated(p) => p.user_id,
            PipelineEvent::WinnerSelected(p) => p.raffle_id,
            PipelineEvent::WinnerUpdated(p) => p.raffle_id,
        }
    }

    /// JSON body as it goes on the wire.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            PipelineEvent::RedemptionCompleted(p) => serde_json::to_vec(p),
            PipelineEvent::AdEngagementCompleted(p) => serde_json::to_vec(p),
            PipelineEvent::TicketsGenerated(p) => serde_json::to_vec(p),
            PipelineEvent::WinnerSelected(p) => serde_json::to_vec(p),
            PipelineEvent::WinnerUpdated(p) => serde_json::to_vec(p),
        }
    }

    pub fn decode(topic: &str, body: &[u8]) -> Result<Self, BusError> {
        let event = match topic {
            topics::REDEMPTION_COMPLETED => {
                PipelineEvent::RedemptionCompleted(serde_json::from_slice(body)?)
            }
            topics::AD_ENGAGEMENT_COMPLETED => {
                PipelineEvent::AdEngagementCompleted(serde_json::from_slice(body)?)
            }
            topics::TICKETS_GENERATED => {
                PipelineEvent::TicketsGenerated(serde_json::from_slice(body)?)
            }
            topics::WINNER_SELECTED => PipelineEvent::WinnerSelected(serde_json::from_slice(body)?),
            topics::WINNER_UPDATED => PipelineEvent::WinnerUpdated(serde_json::from_slice(body)?),
            other => return Err(BusError::UnknownTopic(other.to_string())),
        };
        Ok(event)
    }
}

/// One delivery of a message to one subscription.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message_id: Uuid,
    pub topic: &'static str,
    pub routing_key: Uuid,
    pub body: Vec<u8>,
    /// 1 on first delivery.
    pub attempt: u32,
}

impl Delivery {
    pub fn event(&self) -> Result<PipelineEvent, BusError> {
        PipelineEvent::decode(self.topic, &self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fuelraffle_sdk::objects::EngagementDetails;

    #[test]
    fn test_wire_format_is_camel_case_and_decodes() {
        let event = PipelineEvent::AdEngagementCompleted(AdEngagementCompletedPayload {
            engagement_id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            advertisement_id: Uuid::now_v7(),
            base_tickets: 1,
            bonus_tickets: 2,
            idempotency_key: "eng-1".to_string(),
            occurred_at: 1_700_000_000,
            engagement: EngagementDetails::default(),
        });
        let body = event.encode().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json.get("idempotencyKey").is_some());
        assert!(json["engagement"].get("durationSeconds").is_some());

        assert_eq!(PipelineEvent::decode(event.topic(), &body).unwrap(), event);
    }

    #[test]
    fn test_unknown_topic_and_garbage_are_rejected() {
        assert!(matches!(
            PipelineEvent::decode("nope", b"{}"),
            Err(BusError::UnknownTopic(_))
        ));
        assert!(matches!(
            PipelineEvent::decode(topics::REDEMPTION_COMPLETED, b"{"),
            Err(BusError::Codec(_))
        ));
    }
}
