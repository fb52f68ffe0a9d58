//! State machines for raffles and winners.
//!
//! Legality lives in one transition table per entity. Winner operations are
//! pure: they return the new winner plus the events to publish, and the caller
//! persists with a compare-and-set on the previous status.

pub mod raffle;
pub mod winner;

pub use raffle::RaffleAction;
pub use winner::{DeliveryInfo, WinnerUpdate};
