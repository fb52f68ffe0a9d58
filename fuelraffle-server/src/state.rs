//! Application state shared across all request handlers.

use crate::config::runtime::{AdminConfig, PipelineConfig, SigningConfig};
use fuelraffle_core::config::ConfigStore;
use fuelraffle_core::events::EventPublisher;
use fuelraffle_core::processors::{DrawEngine, RedemptionProcessor, Sweeper, WinnerClaims};
use fuelraffle_core::store::PipelineStore;
use fuelraffle_sdk::signature::{Ed25519KeyProvider, QrSigner};
use std::sync::Arc;
use tokio::sync::RwLock;

/// The storage backend behind every processor.
pub type Store = dyn PipelineStore;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub publisher: Arc<dyn EventPublisher>,
    /// Pipeline tunables (can be reloaded via SIGHUP).
    pub pipeline: ConfigStore<PipelineConfig>,
    /// Admin credentials (can be reloaded via SIGHUP).
    pub admin: Arc<RwLock<AdminConfig>>,
    pub signer: Arc<QrSigner<Ed25519KeyProvider>>,
    pub default_expiration_hours: u32,
    pub redemptions: Arc<RedemptionProcessor<Store>>,
    pub draws: Arc<DrawEngine<Store>>,
    pub claims: Arc<WinnerClaims<Store>>,
    pub sweeper: Arc<Sweeper<Store>>,
}

impl AppState {
    /// Wire the processors around one store, publisher and config.
    pub fn new(
        store: Arc<Store>,
        publisher: Arc<dyn EventPublisher>,
        pipeline: ConfigStore<PipelineConfig>,
        admin: AdminConfig,
        signing: &SigningConfig,
        keys: Ed25519KeyProvider,
    ) -> Self {
        let signer = QrSigner::new(keys, signing.max_expiration_hours);
        let public_key: Arc<[u8]> = Arc::from(signer.public_key());
        let claims = Arc::new(WinnerClaims::new(Arc::clone(&store), Arc::clone(&publisher)));
        Self {
            redemptions: Arc::new(RedemptionProcessor::new(
                Arc::clone(&store),
                Arc::clone(&publisher),
                pipeline.clone(),
                public_key,
            )),
            draws: Arc::new(DrawEngine::new(
                Arc::clone(&store),
                Arc::clone(&publisher),
                pipeline.clone(),
            )),
            sweeper: Arc::new(Sweeper::new(
                Arc::clone(&store),
                Arc::clone(&claims),
                pipeline.clone(),
            )),
            claims,
            store,
            publisher,
            pipeline,
            admin: Arc::new(RwLock::new(admin)),
            signer: Arc::new(signer),
            default_expiration_hours: signing.default_expiration_hours,
        }
    }

    /// Update the admin credentials (used during SIGHUP reload).
    pub async fn update_admin(&self, admin: AdminConfig) {
        let mut current = self.admin.write().await;
        *current = admin;
    }
}
