//! Periodic expiry of overdue winners and stale tickets.

use super::winner_claims::WinnerClaims;
use crate::config::{ConfigStore, PipelineConfig};
use crate::error::PipelineError;
use crate::store::{RaffleStore, TicketLedger, WinnerStore};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, error, info};

pub struct Sweeper<S: ?Sized> {
    store: Arc<S>,
    claims: Arc<WinnerClaims<S>>,
    config: ConfigStore<PipelineConfig>,
}

impl<S> Sweeper<S>
where
    S: TicketLedger + WinnerStore + RaffleStore + ?Sized,
{
    pub fn new(
        store: Arc<S>,
        claims: Arc<WinnerClaims<S>>,
        config: ConfigStore<PipelineConfig>,
    ) -> Self {
        Self {
            store,
            claims,
            config,
        }
    }

    /// PENDING_CLAIM winners past their deadline become EXPIRED.
    pub async fn sweep_winners(&self, now: OffsetDateTime) -> Result<u64, PipelineError> {
        self.claims.expire_overdue(now).await
    }

    /// ACTIVE tickets older than the ticket lifetime, or left over in a
    /// completed raffle, become EXPIRED.
    pub async fn sweep_tickets(&self, now: OffsetDateTime) -> Result<u64, PipelineError> {
        let lifetime = self.config.read().await.draw.ticket_lifetime;
        let expired = self.store.expire(now - lifetime).await?;
        if expired > 0 {
            info!(expired, "Expired tickets");
        }
        Ok(expired)
    }

    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!("Sweeper started");
        let mut config_watcher = self.config.subscribe();
        loop {
            let interval = self.config.read().await.draw.sweep_interval;
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Sweeper received shutdown signal");
                        break;
                    }
                }

                Ok(()) = config_watcher.changed() => {
                    debug!("Sweeper rescheduled after config reload");
                }

                _ = tokio::time::sleep(interval) => {
                    let now = OffsetDateTime::now_utc();
                    if let Err(e) = self.sweep_winners(now).await {
                        error!(error = %e, "Winner sweep failed");
                    }
                    if let Err(e) = self.sweep_tickets(now).await {
                        error!(error = %e, "Ticket sweep failed");
                    }
                    debug!("Sweep pass finished");
                }
            }
        }
    }
}
