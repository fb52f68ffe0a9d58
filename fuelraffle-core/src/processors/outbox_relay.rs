//! OutboxRelay processor.
//!
//! Re-publishes `redemption.completed` for redemptions that were committed but
//! never confirmed as published. Consumers are idempotent, so a redemption
//! that the request path publishes concurrently may go out twice.

use super::redemption::completed_event;
use crate::config::{ConfigStore, PipelineConfig};
use crate::error::PipelineError;
use crate::events::EventPublisher;
use crate::store::RedemptionStore;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// What one relay pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayReport {
    pub published: usize,
    pub failed: usize,
}

pub struct OutboxRelay<S: ?Sized> {
    store: Arc<S>,
    publisher: Arc<dyn EventPublisher>,
    config: ConfigStore<PipelineConfig>,
}

impl<S> OutboxRelay<S>
where
    S: RedemptionStore + ?Sized,
{
    pub fn new(
        store: Arc<S>,
        publisher: Arc<dyn EventPublisher>,
        config: ConfigStore<PipelineConfig>,
    ) -> Self {
        Self {
            store,
            publisher,
            config,
        }
    }

    /// Publish one batch of pending redemptions, oldest first.
    pub async fn relay_once(&self) -> Result<RelayReport, PipelineError> {
        let (batch_size, max_attempts) = {
            let config = self.config.read().await;
            (
                config.redemption.outbox_batch_size,
                config.redemption.outbox_max_attempts,
            )
        };

        let pending = self
            .store
            .unpublished_redemptions(batch_size, max_attempts)
            .await?;
        let mut report = RelayReport::default();

        for redemption in pending {
            match self.publisher.publish(&completed_event(&redemption)).await {
                Ok(()) => {
                    self.store
                        .mark_published(redemption.id, OffsetDateTime::now_utc())
                        .await?;
                    report.published += 1;
                }
                Err(e) => {
                    warn!(
                        redemption_id = %redemption.id,
                        attempts = redemption.publish_attempts + 1,
                        error = %e,
                        "Outbox publish failed"
                    );
                    self.store.record_publish_failure(redemption.id).await?;
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!("OutboxRelay started");
        let mut config_watcher = self.config.subscribe();
        loop {
            let interval = self.config.read().await.redemption.outbox_interval;
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("OutboxRelay received shutdown signal");
                        break;
                    }
                }

                Ok(()) = config_watcher.changed() => {
                    debug!("OutboxRelay rescheduled after config reload");
                }

                _ = tokio::time::sleep(interval) => {
                    match self.relay_once().await {
                        Ok(report) if report.published + report.failed > 0 => {
                            info!(
                                published = report.published,
                                failed = report.failed,
                                "Outbox relay pass finished"
                            );
                        }
                        Ok(_) => debug!("Outbox empty"),
                        Err(e) => error!(error = %e, "Outbox relay pass failed"),
                    }
                }
            }
        }
        info!("OutboxRelay stopped");
    }
}
