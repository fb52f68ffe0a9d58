pub mod ad_multiplier;
pub mod draw_selection;
pub mod idempotency;
pub mod retry;
