//! TOML file configuration structures.
//!
//! These structs directly map to the `fuelraffle-config.toml` file format.
//! Every pipeline section is optional and falls back to the core defaults.

use fuelraffle_core::config::{AdRewardConfig, IssuanceConfig, RedemptionConfig};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub server: ServerConfig,
    pub admin: AdminConfig,
    #[serde(default)]
    pub signing: SigningConfig,
    pub draw: DrawConfig,
    #[serde(default)]
    pub ad_rewards: AdRewardsConfig,
    #[serde(default)]
    pub redemption: RedemptionPublishConfig,
    #[serde(default)]
    pub issuance: IssuanceSection,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080))
}

/// Admin configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// The admin secret. If this is plaintext (doesn't start with `$argon2`),
    /// it will be hashed and the config file will be rewritten.
    pub secret: String,
}

/// QR token signing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningConfig {
    /// Base64 PKCS#8 Ed25519 key. Generated and written back when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(default = "default_max_expiration_hours")]
    pub max_expiration_hours: u32,
    #[serde(default = "default_expiration_hours")]
    pub default_expiration_hours: u32,
}

fn default_max_expiration_hours() -> u32 {
    fuelraffle_sdk::signature::DEFAULT_MAX_EXPIRATION_HOURS
}

fn default_expiration_hours() -> u32 {
    24
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            private_key: None,
            max_expiration_hours: default_max_expiration_hours(),
            default_expiration_hours: default_expiration_hours(),
        }
    }
}

/// Draw and sweep settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawConfig {
    /// Key every raffle's seed reveal is derived from. Keep it private until
    /// draws are audited.
    pub seed_secret: String,
    #[serde(default = "default_claim_grace_days")]
    pub claim_grace_days: u32,
    #[serde(default = "default_scheduler_interval_secs")]
    pub scheduler_interval_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_ticket_lifetime_days")]
    pub ticket_lifetime_days: u32,
}

fn default_claim_grace_days() -> u32 {
    7
}

fn default_scheduler_interval_secs() -> u64 {
    60
}

fn default_sweep_interval_secs() -> u64 {
    300
}

fn default_ticket_lifetime_days() -> u32 {
    365
}

/// Ad engagement bonus rules. Missing keys keep their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdRewardsConfig {
    pub min_duration_seconds: u32,
    pub require_completion: bool,
    pub completion_bonus: u32,
    pub click_bonus: u32,
    pub per_interaction_bonus: u32,
    pub max_interaction_bonus: u32,
    pub extended_view_seconds: u32,
    pub extended_view_bonus: u32,
    pub quality_threshold: u8,
    pub quality_bonus: u32,
    pub frequency_threshold: u32,
    pub frequency_bonus: u32,
    pub global_multiplier_percent: u32,
    pub max_tickets_per_engagement: u32,
}

impl Default for AdRewardsConfig {
    fn default() -> Self {
        let d = AdRewardConfig::default();
        Self {
            min_duration_seconds: d.min_duration_seconds,
            require_completion: d.require_completion,
            completion_bonus: d.completion_bonus,
            click_bonus: d.click_bonus,
            per_interaction_bonus: d.per_interaction_bonus,
            max_interaction_bonus: d.max_interaction_bonus,
            extended_view_seconds: d.extended_view_seconds,
            extended_view_bonus: d.extended_view_bonus,
            quality_threshold: d.quality_threshold,
            quality_bonus: d.quality_bonus,
            frequency_threshold: d.frequency_threshold,
            frequency_bonus: d.frequency_bonus,
            global_multiplier_percent: d.global_multiplier_percent,
            max_tickets_per_engagement: d.max_tickets_per_engagement,
        }
    }
}

/// Publishing of `redemption.completed` and the outbox relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedemptionPublishConfig {
    pub publish_max_retries: u32,
    pub publish_base_delay_ms: u64,
    pub outbox_interval_secs: u64,
    pub outbox_batch_size: i64,
    pub outbox_max_attempts: i32,
}

impl Default for RedemptionPublishConfig {
    fn default() -> Self {
        let d = RedemptionConfig::default();
        Self {
            publish_max_retries: d.publish_retry.max_retries,
            publish_base_delay_ms: u64::try_from(d.publish_retry.base_delay.as_millis())
                .unwrap_or(u64::MAX),
            outbox_interval_secs: d.outbox_interval.as_secs(),
            outbox_batch_size: d.outbox_batch_size,
            outbox_max_attempts: d.outbox_max_attempts,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuanceSection {
    pub max_delivery_attempts: u32,
    pub redelivery_delay_ms: u64,
}

impl Default for IssuanceSection {
    fn default() -> Self {
        Self {
            max_delivery_attempts: IssuanceConfig::default().max_delivery_attempts,
            redelivery_delay_ms: 1000,
        }
    }
}

impl FileConfig {
    /// Check if the admin secret is already hashed (argon2 format).
    pub fn is_admin_secret_hashed(&self) -> bool {
        self.admin.secret.starts_with("$argon2")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_parsing() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"

[admin]
secret = "test-secret"

[draw]
seed_secret = "a-long-enough-draw-secret"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 3000);
        assert_eq!(config.draw.claim_grace_days, 7);
        assert_eq!(config.signing.max_expiration_hours, 72);
        assert!(config.signing.private_key.is_none());
        assert_eq!(config.ad_rewards.max_tickets_per_engagement, 10);
        assert_eq!(config.redemption.publish_max_retries, 3);
        assert_eq!(config.redemption.publish_base_delay_ms, 200);
        assert!(!config.is_admin_secret_hashed());
    }

    #[test]
    fn test_partial_ad_rewards_keep_defaults() {
        let toml_str = r#"
[server]

[admin]
secret = "$argon2id$v=19$m=19456,t=2,p=1$abc123"

[draw]
seed_secret = "a-long-enough-draw-secret"
claim_grace_days = 3

[ad_rewards]
click_bonus = 4
global_multiplier_percent = 150
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen, default_listen_addr());
        assert_eq!(config.draw.claim_grace_days, 3);
        assert_eq!(config.ad_rewards.click_bonus, 4);
        assert_eq!(config.ad_rewards.global_multiplier_percent, 150);
        assert_eq!(config.ad_rewards.min_duration_seconds, 15);
        assert!(config.is_admin_secret_hashed());
    }
}
