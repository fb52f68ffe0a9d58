use super::{AdRewardConfig, DrawConfig};
use std::time::Duration;

/// Exponential backoff: attempt `n` waits `base_delay * 2^n`, capped at
/// `max_exponent` doublings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_exponent: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
            max_exponent: 11,
        }
    }
}

/// Redemption publishing and outbox relay settings.
#[derive(Debug, Clone)]
pub struct RedemptionConfig {
    pub publish_retry: RetryPolicy,
    pub outbox_interval: Duration,
    pub outbox_batch_size: i64,
    /// Outbox rows that failed this many times are left for manual reconciliation.
    pub outbox_max_attempts: i32,
}

impl Default for RedemptionConfig {
    fn default() -> Self {
        Self {
            publish_retry: RetryPolicy::default(),
            outbox_interval: Duration::from_secs(10),
            outbox_batch_size: 50,
            outbox_max_attempts: 20,
        }
    }
}

/// Ticket issuance consumer settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuanceConfig {
    /// Deliveries of one message before it is dead-lettered.
    pub max_delivery_attempts: u32,
}

impl Default for IssuanceConfig {
    fn default() -> Self {
        Self {
            max_delivery_attempts: 5,
        }
    }
}

/// Every tunable of the pipeline, reloadable as one unit.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub ad_rewards: AdRewardConfig,
    pub draw: DrawConfig,
    pub redemption: RedemptionConfig,
    pub issuance: IssuanceConfig,
}

impl PipelineConfig {
    /// Defaults everywhere except the seed secret, which has none.
    pub fn with_seed_secret(seed_secret: impl Into<Box<[u8]>>) -> Self {
        Self {
            ad_rewards: AdRewardConfig::default(),
            draw: DrawConfig::new(seed_secret),
            redemption: RedemptionConfig::default(),
            issuance: IssuanceConfig::default(),
        }
    }
}
