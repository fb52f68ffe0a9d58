//! Pipeline events and the bus they travel on.
//!
//! # Event Flow
//!
//! 1. `RedemptionProcessor` publishes `redemption.completed` after commit
//! 2. The ad service publishes `ad.engagement.completed`
//! 3. `TicketIssuanceConsumer` consumes both and publishes `raffle.tickets.generated`
//! 4. `DrawEngine` publishes `raffle.winner.selected` per winner
//! 5. `WinnerClaims` publishes `raffle.winner.updated` per transition
//!
//! Delivery is at-least-once: every consumer must tolerate duplicates.

pub mod bus;
pub mod channels;
pub mod types;

pub use bus::{BusError, DeadLetter, EventPublisher, InProcessBus, Subscription};
pub use channels::{DEFAULT_CHANNEL_BUFFER, DeliveryReceiver, DeliverySender, delivery_channel};
pub use types::{Delivery, PipelineEvent};
