//! Channel factory for bus subscriptions.

use super::types::Delivery;
use tokio::sync::mpsc;

/// Default buffer size for subscription channels.
///
/// Publishers wait when a subscriber falls this far behind.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

pub type DeliverySender = mpsc::Sender<Delivery>;
pub type DeliveryReceiver = mpsc::Receiver<Delivery>;

/// Create the channel backing one subscription.
pub fn delivery_channel() -> (DeliverySender, DeliveryReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}
