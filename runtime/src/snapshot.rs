//! Atomically published process-wide data.
//!
//! Readers call [`Snapshot::load`] and get a complete prior version; they
//! never wait for a refresh. A refresh builds the next version off to the
//! side and swaps it in with one pointer store.

use crate::metrics::RuntimeMetrics;
use arc_swap::ArcSwap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// A copy-on-write snapshot of `T`.
pub struct Snapshot<T> {
    source: &'static str,
    current: Arc<ArcSwap<T>>,
}

impl<T: Send + Sync + 'static> Snapshot<T> {
    /// A snapshot named `source` (for logs and metrics) with an initial value.
    pub fn new(source: &'static str, initial: T) -> Self {
        Self {
            source,
            current: Arc::new(ArcSwap::from_pointee(initial)),
        }
    }

    /// The current version.
    #[must_use]
    pub fn load(&self) -> Arc<T> {
        self.current.load_full()
    }

    /// Replace the current version.
    pub fn publish(&self, next: T) {
        self.current.store(Arc::new(next));
    }

    /// Compute a new version and publish it. A `None` result keeps the
    /// current version. Returns whether a new version was published.
    pub async fn refresh<Fut>(&self, next: Fut) -> bool
    where
        Fut: Future<Output = Option<T>>,
    {
        if let Some(next) = next.await {
            self.publish(next);
            tracing::debug!(source = self.source, "Snapshot refreshed");
            RuntimeMetrics::record_refresh(self.source, "ok");
            true
        } else {
            tracing::warn!(source = self.source, "Snapshot refresh failed, keeping previous version");
            RuntimeMetrics::record_refresh(self.source, "error");
            false
        }
    }

    /// Refresh on a fixed interval until `shutdown` flips to `true`.
    ///
    /// One task per snapshot; refreshes never overlap.
    pub fn refresh_every<F, Fut>(
        &self,
        period: Duration,
        mut load: F,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Option<T>> + Send + 'static,
    {
        let snapshot = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick fires immediately; the initial value is already loaded.
            ticker.tick().await;
            while !*shutdown.borrow() {
                tokio::select! {
                    _ = ticker.tick() => {
                        snapshot.refresh(load()).await;
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!(source = snapshot.source, "Snapshot refresher stopped");
        })
    }
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source,
            current: Arc::clone(&self.current),
        }
    }
}

impl<T> fmt::Debug for Snapshot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}
