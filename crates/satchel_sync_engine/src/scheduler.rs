//! Periodic drain scheduling.

use crate::engine::SyncEngine;
use crate::error::SyncError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// A cancellable background task that drains the queue on a fixed
/// interval.
///
/// The task calls [`SyncEngine::force_sync`] once per interval from a
/// blocking worker, so the async runtime is never blocked by network
/// calls. The single-drain-in-flight lock inside the engine makes an
/// overlap with a manual drain a harmless no-op.
///
/// Dropping or stopping the handle cancels the task; nothing keeps
/// running after sync is disabled.
pub struct PeriodicDrain {
    handle: JoinHandle<()>,
    stop: watch::Sender<bool>,
}

impl PeriodicDrain {
    /// Spawns the drain task on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime; use
    /// [`PeriodicDrain::spawn_on`] to target an explicit handle.
    #[must_use]
    pub fn spawn(engine: Arc<SyncEngine>, interval: Duration) -> Self {
        Self::spawn_on(&tokio::runtime::Handle::current(), engine, interval)
    }

    /// Spawns the drain task on the given runtime handle.
    #[must_use]
    pub fn spawn_on(
        runtime: &tokio::runtime::Handle,
        engine: Arc<SyncEngine>,
        interval: Duration,
    ) -> Self {
        let (stop, mut stop_rx) = watch::channel(false);

        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick completes immediately; consume it so the
            // first drain happens one full interval after enable.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let engine = Arc::clone(&engine);
                        match tokio::task::spawn_blocking(move || engine.force_sync()).await {
                            Ok(Ok(status)) => {
                                debug!(state = ?status.state, "periodic drain finished");
                            }
                            Ok(Err(SyncError::NotAuthenticated)) => {
                                debug!("periodic drain skipped, not authenticated");
                            }
                            Ok(Err(e)) => debug!(error = %e, "periodic drain failed"),
                            Err(e) => debug!(error = %e, "periodic drain task panicked"),
                        }
                    }
                    _ = stop_rx.changed() => break,
                }
            }
        });

        Self { handle, stop }
    }

    /// Stops the task. Idempotent via consumption; after this returns
    /// no further drains fire.
    pub fn stop(self) {
        let _ = self.stop.send(true);
        self.handle.abort();
    }

    /// True while the background task is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RetryConfig, SyncConfig};
    use crate::transport::MockRemote;
    use satchel_store::{migrations, LocalStore, MemoryMedium, MigrationRunner};
    use serde_json::json;

    fn test_engine(remote: Arc<MockRemote>) -> Arc<SyncEngine> {
        let mut runner = MigrationRunner::new();
        runner
            .register(migrations::create_collection(1, "tasks", "id"))
            .unwrap();
        let store = Arc::new(LocalStore::open(Arc::new(MemoryMedium::new()), &runner).unwrap());
        let config = SyncConfig::new().with_retry(RetryConfig::no_retry());
        Arc::new(SyncEngine::new(store, remote, config).unwrap())
    }

    #[tokio::test]
    async fn drains_on_interval() {
        let remote = Arc::new(MockRemote::new());
        let engine = test_engine(Arc::clone(&remote));
        engine.enable_sync("token-1", "alice").unwrap();
        engine.store().put("tasks", json!({"id": "t1"})).unwrap();

        let periodic = PeriodicDrain::spawn(Arc::clone(&engine), Duration::from_millis(10));
        assert!(periodic.is_running());

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(engine.status().pending_items, 0);
        assert_eq!(remote.pushed().len(), 1);

        periodic.stop();
    }

    #[tokio::test]
    async fn stop_cancels_background_work() {
        let remote = Arc::new(MockRemote::new());
        let engine = test_engine(Arc::clone(&remote));
        engine.enable_sync("token-1", "alice").unwrap();

        let periodic = PeriodicDrain::spawn(Arc::clone(&engine), Duration::from_millis(10));
        periodic.stop();
        tokio::time::sleep(Duration::from_millis(30)).await;

        // Items enqueued after the stop are never drained
        engine.store().put("tasks", json!({"id": "t1"})).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(engine.status().pending_items, 1);
        assert!(remote.pushed().is_empty());
    }

    #[tokio::test]
    async fn unauthenticated_ticks_are_harmless() {
        let remote = Arc::new(MockRemote::new());
        let engine = test_engine(remote);

        let periodic = PeriodicDrain::spawn(Arc::clone(&engine), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(periodic.is_running());
        periodic.stop();
    }
}
