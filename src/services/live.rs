//! Live snapshot: recompute when the store reports changes
//!
//! The engine stays stateless; this wrapper owns the subscription. A burst of
//! change notifications within the debounce window triggers one
//! recomputation. Dropping the handle stops the background task.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::services::reconciler::{MetricsEngine, SnapshotRequest};
use crate::store::RecordStore;
use crate::types::MetricsSnapshot;

pub struct LiveSnapshot {
    rx: watch::Receiver<Option<MetricsSnapshot>>,
    task: JoinHandle<()>,
}

impl LiveSnapshot {
    /// Compute once, then again after every debounced burst of changes.
    ///
    /// `request.now` is refreshed on each recomputation so overdue counts
    /// stay current. Must be called inside a tokio runtime.
    pub fn spawn<S>(
        engine: Arc<MetricsEngine<S>>,
        request: SnapshotRequest,
        debounce: Duration,
    ) -> Self
    where
        S: RecordStore + 'static,
    {
        let (tx, rx) = watch::channel(None);

        let task = tokio::spawn(async move {
            // Subscribe first so changes during the initial compute are not lost
            let changes = engine.store().subscribe();
            let mut request = request;

            request.now = Utc::now();
            tx.send_replace(Some(engine.compute_snapshot(&request).await));

            let Some(mut changes) = changes else {
                tracing::debug!("store has no change notifications, live snapshot is static");
                return;
            };

            loop {
                match changes.recv().await {
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                }

                tokio::time::sleep(debounce).await;
                let mut coalesced = 1usize;
                loop {
                    match changes.try_recv() {
                        Ok(_) | Err(TryRecvError::Lagged(_)) => coalesced += 1,
                        Err(_) => break,
                    }
                }

                tracing::debug!(coalesced, "recomputing live snapshot");
                request.now = Utc::now();
                let snapshot = engine.compute_snapshot(&request).await;
                if tx.send(Some(snapshot)).is_err() {
                    // Every receiver is gone
                    break;
                }
            }
        });

        Self { rx, task }
    }

    /// Most recent snapshot, `None` until the first computation finishes
    pub fn latest(&self) -> Option<MetricsSnapshot> {
        self.rx.borrow().clone()
    }

    /// Wait for the next published snapshot. `None` once the task has stopped.
    pub async fn changed(&mut self) -> Option<MetricsSnapshot> {
        self.rx.changed().await.ok()?;
        self.rx.borrow_and_update().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<MetricsSnapshot>> {
        self.rx.clone()
    }
}

impl Drop for LiveSnapshot {
    fn drop(&mut self) {
        self.task.abort();
    }
}
