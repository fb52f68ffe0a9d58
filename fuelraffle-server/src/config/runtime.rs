//! Validated configuration the server runs with.
//!
//! Pipeline tunables are the core [`PipelineConfig`]; the types here cover
//! what only the HTTP process needs.

pub use fuelraffle_core::config::PipelineConfig;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub listen: SocketAddr,
}

/// Admin credentials. Only the argon2 hash is kept in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminConfig {
    secret_hash: String,
}

impl AdminConfig {
    pub fn new(secret_hash: String) -> Self {
        Self { secret_hash }
    }

    pub fn secret_hash(&self) -> &str {
        &self.secret_hash
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningConfig {
    /// Base64 PKCS#8 Ed25519 key.
    pub private_key: String,
    pub max_expiration_hours: u32,
    pub default_expiration_hours: u32,
}

/// Settings of the ticket issuance subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionConfig {
    pub redelivery_delay: Duration,
}
