//! Versioned, hot-swappable configuration.
//!
//! The server replaces the whole [`PipelineConfig`](super::PipelineConfig) on
//! SIGHUP; long-running processors hold a [`ConfigWatcher`] and take a fresh
//! snapshot when it fires.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{RwLock, RwLockReadGuard, watch};

/// Shared configuration value plus a version counter.
pub struct ConfigStore<T> {
    shared: Arc<Shared<T>>,
}

struct Shared<T> {
    value: RwLock<T>,
    version: AtomicU64,
    notify: watch::Sender<u64>,
}

/// Wakes up when the owning [`ConfigStore`] is replaced.
pub struct ConfigWatcher {
    rx: watch::Receiver<u64>,
}

impl<T> ConfigStore<T> {
    pub fn new(initial: T) -> Self {
        let (notify, _) = watch::channel(0u64);
        Self {
            shared: Arc::new(Shared {
                value: RwLock::new(initial),
                version: AtomicU64::new(0),
                notify,
            }),
        }
    }

    /// Swap in a new value and bump the version.
    pub async fn update(&self, value: T) {
        {
            let mut guard = self.shared.value.write().await;
            *guard = value;
        }
        let version = self.shared.version.fetch_add(1, Ordering::Relaxed) + 1;
        self.shared.notify.send_replace(version);
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, T> {
        self.shared.value.read().await
    }

    /// Number of updates applied so far.
    pub fn version(&self) -> u64 {
        self.shared.version.load(Ordering::Relaxed)
    }

    pub fn subscribe(&self) -> ConfigWatcher {
        ConfigWatcher {
            rx: self.shared.notify.subscribe(),
        }
    }
}

impl<T: Clone> ConfigStore<T> {
    /// Clone the current value so no lock is held across awaits.
    pub async fn snapshot(&self) -> T {
        self.shared.value.read().await.clone()
    }
}

impl<T> Clone for ConfigStore<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl ConfigWatcher {
    /// Resolves on the next update, or errors once every store handle is gone.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.rx.changed().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_update_bumps_version_and_notifies() {
        let store = ConfigStore::new(1u32);
        let mut watcher = store.subscribe();
        assert_eq!(store.version(), 0);

        store.update(2).await;

        assert!(watcher.changed().await.is_ok());
        assert_eq!(store.version(), 1);
        assert_eq!(store.snapshot().await, 2);
        assert_eq!(*store.read().await, 2);
    }
}
