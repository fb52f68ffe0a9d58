//! Runtime configuration types for the ticket pipeline.
//!
//! These are validated values shared by the processors. Loading and parsing
//! the TOML file is the server crate's job.

mod ad_rewards;
mod config_store;
mod draw;
mod pipeline;

pub use ad_rewards::AdRewardConfig;
pub use config_store::{ConfigStore, ConfigWatcher};
pub use draw::DrawConfig;
pub use pipeline::{IssuanceConfig, PipelineConfig, RedemptionConfig, RetryPolicy};
