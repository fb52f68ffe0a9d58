//! Draw engine configuration.

use std::time::Duration;

/// Draw and claim window settings.
#[derive(Debug, Clone)]
pub struct DrawConfig {
    /// Time a winner has to claim, counted from the draw.
    pub claim_grace_period: time::Duration,
    /// HMAC key from which each raffle's seed reveal is derived.
    pub seed_secret: Box<[u8]>,
    /// How often the scheduler looks for due raffles.
    pub scheduler_interval: Duration,
    /// How often overdue winners and stale tickets are swept.
    pub sweep_interval: Duration,
    /// Tickets older than this are expired by the sweep.
    pub ticket_lifetime: time::Duration,
}

impl DrawConfig {
    pub fn new(seed_secret: impl Into<Box<[u8]>>) -> Self {
        Self {
            claim_grace_period: time::Duration::days(7),
            seed_secret: seed_secret.into(),
            scheduler_interval: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(300),
            ticket_lifetime: time::Duration::days(365),
        }
    }

    pub fn seed_secret_bytes(&self) -> &[u8] {
        &self.seed_secret
    }
}
