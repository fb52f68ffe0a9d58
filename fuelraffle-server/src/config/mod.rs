//! Configuration module for fuelraffle-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables. Also handles admin secret hashing and
//! first-run generation of the QR signing key.

pub mod file;
pub mod runtime;

use crate::config::file::FileConfig;
use crate::config::runtime::{
    AdminConfig, PipelineConfig, ServerConfig, SigningConfig, SubscriptionConfig,
};
use fuelraffle_core::config::{
    AdRewardConfig, DrawConfig, IssuanceConfig, RedemptionConfig, RetryPolicy,
};
use fuelraffle_sdk::signature::Ed25519KeyProvider;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Shortest seed secret accepted, in bytes.
const MIN_SEED_SECRET_LEN: usize = 16;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("password hashing error: {0}")]
    HashError(String),

    #[error("signing key error: {0}")]
    KeyError(#[from] fuelraffle_sdk::signature::KeyError),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Loaded configuration result containing all parts.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub server: ServerConfig,
    pub admin: AdminConfig,
    pub signing: SigningConfig,
    pub subscription: SubscriptionConfig,
    pub pipeline: PipelineConfig,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI overrides
    /// 3. Validate the configuration
    /// 4. Hash the admin secret if it's plaintext
    /// 5. Generate a signing key if none is configured
    /// 6. Rewrite the file if step 4 or 5 changed it
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        let mut file_config: FileConfig = toml::from_str(&config_content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        self.validate(&file_config)?;

        let mut dirty = false;
        if !file_config.is_admin_secret_hashed() {
            file_config.admin.secret = hash_secret(&file_config.admin.secret)?;
            dirty = true;
            tracing::info!("Admin secret hashed");
        }
        if file_config.signing.private_key.is_none() {
            let (_, pkcs8) = Ed25519KeyProvider::generate()?;
            file_config.signing.private_key =
                Some(fast32::base64::RFC4648_NOPAD.encode(&pkcs8));
            dirty = true;
            tracing::warn!("No QR signing key configured, generated a new one");
        }
        if dirty {
            self.rewrite_config(&file_config)?;
            tracing::info!("Config file updated");
        }

        build_loaded_config(file_config)
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }

    fn validate(&self, config: &FileConfig) -> Result<(), ConfigError> {
        if config.admin.secret.is_empty() {
            return Err(ConfigError::ValidationError(
                "admin secret must not be empty".to_string(),
            ));
        }
        if config.draw.seed_secret.len() < MIN_SEED_SECRET_LEN {
            return Err(ConfigError::ValidationError(format!(
                "draw seed secret must be at least {MIN_SEED_SECRET_LEN} bytes"
            )));
        }
        if config.draw.claim_grace_days == 0 {
            return Err(ConfigError::ValidationError(
                "claim grace period must be at least one day".to_string(),
            ));
        }
        let signing = &config.signing;
        if signing.default_expiration_hours == 0
            || signing.default_expiration_hours > signing.max_expiration_hours
        {
            return Err(ConfigError::ValidationError(format!(
                "default QR expiration must be between 1 and {} hours",
                signing.max_expiration_hours
            )));
        }
        if config.ad_rewards.quality_threshold > 100 {
            return Err(ConfigError::ValidationError(
                "quality threshold is a score between 0 and 100".to_string(),
            ));
        }
        if config.redemption.outbox_batch_size <= 0 || config.redemption.outbox_max_attempts <= 0
        {
            return Err(ConfigError::ValidationError(
                "outbox batch size and max attempts must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn rewrite_config(&self, config: &FileConfig) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(config)?;

        // Write atomically: write to temp file, then rename
        let temp_path = self.config_path.with_extension("toml.tmp");
        std::fs::write(&temp_path, toml_string)?;
        std::fs::rename(&temp_path, &self.config_path)?;

        Ok(())
    }
}

pub(crate) fn hash_secret(plaintext: &str) -> Result<String, ConfigError> {
    use argon2::{
        Argon2, PasswordHasher,
        password_hash::{SaltString, rand_core::OsRng},
    };

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ConfigError::HashError(e.to_string()))
}

fn build_loaded_config(file_config: FileConfig) -> Result<LoadedConfig, ConfigError> {
    let FileConfig {
        server,
        admin,
        signing,
        draw,
        ad_rewards,
        redemption,
        issuance,
    } = file_config;

    let private_key = signing.private_key.ok_or_else(|| {
        ConfigError::ValidationError("signing key missing after load".to_string())
    })?;
    // Reject a broken key at load time rather than at the first scan.
    Ed25519KeyProvider::from_pkcs8_base64(&private_key)?;

    let pipeline = PipelineConfig {
        ad_rewards: AdRewardConfig {
            min_duration_seconds: ad_rewards.min_duration_seconds,
            require_completion: ad_rewards.require_completion,
            completion_bonus: ad_rewards.completion_bonus,
            click_bonus: ad_rewards.click_bonus,
            per_interaction_bonus: ad_rewards.per_interaction_bonus,
            max_interaction_bonus: ad_rewards.max_interaction_bonus,
            extended_view_seconds: ad_rewards.extended_view_seconds,
            extended_view_bonus: ad_rewards.extended_view_bonus,
            quality_threshold: ad_rewards.quality_threshold,
            quality_bonus: ad_rewards.quality_bonus,
            frequency_threshold: ad_rewards.frequency_threshold,
            frequency_bonus: ad_rewards.frequency_bonus,
            global_multiplier_percent: ad_rewards.global_multiplier_percent,
            max_tickets_per_engagement: ad_rewards.max_tickets_per_engagement,
        },
        draw: DrawConfig {
            claim_grace_period: time::Duration::days(i64::from(draw.claim_grace_days)),
            seed_secret: draw.seed_secret.into_bytes().into_boxed_slice(),
            scheduler_interval: Duration::from_secs(draw.scheduler_interval_secs.max(1)),
            sweep_interval: Duration::from_secs(draw.sweep_interval_secs.max(1)),
            ticket_lifetime: time::Duration::days(i64::from(draw.ticket_lifetime_days)),
        },
        redemption: RedemptionConfig {
            publish_retry: RetryPolicy {
                max_retries: redemption.publish_max_retries,
                base_delay: Duration::from_millis(redemption.publish_base_delay_ms),
                ..RetryPolicy::default()
            },
            outbox_interval: Duration::from_secs(redemption.outbox_interval_secs.max(1)),
            outbox_batch_size: redemption.outbox_batch_size,
            outbox_max_attempts: redemption.outbox_max_attempts,
        },
        issuance: IssuanceConfig {
            max_delivery_attempts: issuance.max_delivery_attempts,
        },
    };

    Ok(LoadedConfig {
        server: ServerConfig {
            listen: server.listen,
        },
        admin: AdminConfig::new(admin.secret),
        signing: SigningConfig {
            private_key,
            max_expiration_hours: signing.max_expiration_hours,
            default_expiration_hours: signing.default_expiration_hours,
        },
        subscription: SubscriptionConfig {
            redelivery_delay: Duration::from_millis(issuance.redelivery_delay_ms),
        },
        pipeline,
    })
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[server]
listen = "127.0.0.1:3000"

[admin]
secret = "plain-admin-secret"

[draw]
seed_secret = "a-long-enough-draw-secret"
claim_grace_days = 7
"#;

    fn write_config(name: &str, content: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("fuelraffle-{name}-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("fuelraffle-config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_first_load_hashes_secret_and_persists_key() {
        let path = write_config("first-load", MINIMAL);
        let loader = ConfigLoader::new(&path, None);

        let loaded = loader.load().unwrap();
        assert!(loaded.admin.secret_hash().starts_with("$argon2"));
        assert_eq!(
            loaded.pipeline.draw.claim_grace_period,
            time::Duration::days(7)
        );
        assert_eq!(loaded.pipeline.draw.seed_secret_bytes(), b"a-long-enough-draw-secret");

        let rewritten: FileConfig =
            toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(rewritten.is_admin_secret_hashed());
        assert_eq!(
            rewritten.signing.private_key.as_deref(),
            Some(loaded.signing.private_key.as_str())
        );

        // A second load keeps the same hash and key.
        let again = loader.reload().unwrap();
        assert_eq!(again.admin, loaded.admin);
        assert_eq!(again.signing, loaded.signing);
    }

    #[test]
    fn test_listen_override_wins() {
        let path = write_config("override", MINIMAL);
        let listen: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        let loaded = ConfigLoader::new(&path, Some(listen)).load().unwrap();
        assert_eq!(loaded.server.listen, listen);
    }

    #[test]
    fn test_short_seed_secret_is_rejected() {
        let path = write_config(
            "short-seed",
            &MINIMAL.replace("a-long-enough-draw-secret", "short"),
        );
        assert!(matches!(
            ConfigLoader::new(&path, None).load(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_broken_signing_key_is_rejected() {
        let content = format!("{MINIMAL}\n[signing]\nprivate_key = \"bm90IGEga2V5\"\n");
        let path = write_config("bad-key", &content);
        assert!(matches!(
            ConfigLoader::new(&path, None).load(),
            Err(ConfigError::KeyError(_))
        ));
    }
}
