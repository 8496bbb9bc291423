//! Write-behind persistence for the timer snapshot.
//!
//! The frame loop never waits on storage. It records *that* the state
//! changed ([`WriteBehind`]) and, when a flush is due, hands the latest
//! snapshot to a detached [`PersistWorker`]. The worker always writes the
//! newest snapshot it has seen; intermediate ones are skipped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::database::SnapshotStore;
use crate::timer::TimerState;

/// Dirty tracking with a minimum flush interval.
///
/// Time draining off a running clock is `dirty` and waits for the interval.
/// Grants, commands and pause/reset are `urgent` and flush on the next check,
/// so a crash cannot lose them.
#[derive(Debug, Clone)]
pub struct WriteBehind {
    interval: Duration,
    dirty: bool,
    urgent: bool,
    last_flush: Option<Instant>,
}

impl WriteBehind {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            dirty: false,
            urgent: false,
            last_flush: None,
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn mark_urgent(&mut self) {
        self.dirty = true;
        self.urgent = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_due(&self, now: Instant) -> bool {
        if !self.dirty {
            return false;
        }
        if self.urgent {
            return true;
        }
        match self.last_flush {
            Some(last) => now.saturating_duration_since(last) >= self.interval,
            None => true,
        }
    }

    /// Clears the dirty state and returns `true` when a flush is due.
    pub fn take_if_due(&mut self, now: Instant) -> bool {
        if !self.is_due(now) {
            return false;
        }
        self.dirty = false;
        self.urgent = false;
        self.last_flush = Some(now);
        true
    }

    /// Clears the dirty state unconditionally; `true` if anything was pending.
    pub fn take(&mut self, now: Instant) -> bool {
        let pending = self.dirty;
        self.dirty = false;
        self.urgent = false;
        self.last_flush = Some(now);
        pending
    }
}

/// Detached writer task. Submitting never blocks; failures are logged and
/// swallowed, leaving the next submission to try again.
pub struct PersistWorker {
    tx: watch::Sender<Option<TimerState>>,
    handle: JoinHandle<()>,
}

impl PersistWorker {
    /// Spawn the writer on the current tokio runtime.
    pub fn spawn(store: Arc<dyn SnapshotStore>, key: impl Into<String>) -> Self {
        let key = key.into();
        let (tx, mut rx) = watch::channel::<Option<TimerState>>(None);

        let handle = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let Some(snapshot) = rx.borrow_and_update().clone() else {
                    continue;
                };
                let store = Arc::clone(&store);
                let key = key.clone();
                let written =
                    tokio::task::spawn_blocking(move || store.set(&key, &snapshot)).await;
                match written {
                    Ok(Ok(())) => tracing::trace!("timer snapshot persisted"),
                    Ok(Err(e)) => tracing::warn!("timer snapshot write failed: {e}"),
                    Err(e) => tracing::warn!("timer snapshot writer panicked: {e}"),
                }
            }
        });

        Self { tx, handle }
    }

    /// Queue `snapshot` as the next thing to write, replacing any unwritten one.
    pub fn submit(&self, snapshot: TimerState) {
        self.tx.send_replace(Some(snapshot));
    }

    /// Stop accepting snapshots and wait for the last one to be written.
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.handle.await {
            tracing::warn!("timer snapshot writer did not shut down cleanly: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CoreError, Result};
    use crate::storage::MemoryStore;

    struct FailingStore;

    impl SnapshotStore for FailingStore {
        fn get(&self, _key: &str) -> Result<Option<TimerState>> {
            Err(CoreError::Custom("offline".into()))
        }

        fn set(&self, _key: &str, _snapshot: &TimerState) -> Result<()> {
            Err(CoreError::Custom("offline".into()))
        }
    }

    #[test]
    fn clean_state_is_never_due() {
        let wb = WriteBehind::new(Duration::from_secs(3));
        assert!(!wb.is_due(Instant::now()));
    }

    #[test]
    fn drift_waits_for_interval() {
        let start = Instant::now();
        let mut wb = WriteBehind::new(Duration::from_secs(3));
        wb.mark_dirty();
        assert!(wb.take_if_due(start));

        wb.mark_dirty();
        assert!(!wb.take_if_due(start + Duration::from_secs(1)));
        assert!(wb.is_dirty());
        assert!(wb.take_if_due(start + Duration::from_secs(3)));
        assert!(!wb.is_dirty());
    }

    #[test]
    fn urgent_changes_skip_the_interval() {
        let start = Instant::now();
        let mut wb = WriteBehind::new(Duration::from_secs(3));
        wb.mark_dirty();
        wb.take_if_due(start);
        wb.mark_urgent();
        assert!(wb.take_if_due(start + Duration::from_millis(16)));
    }

    #[test]
    fn take_reports_pending() {
        let mut wb = WriteBehind::new(Duration::from_secs(3));
        assert!(!wb.take(Instant::now()));
        wb.mark_dirty();
        assert!(wb.take(Instant::now()));
    }

    #[tokio::test]
    async fn worker_writes_latest_snapshot() {
        let store = Arc::new(MemoryStore::new());
        let worker = PersistWorker::spawn(store.clone(), "k");
        worker.submit(TimerState::new(1.0, true, 0));
        worker.submit(TimerState::new(2.0, true, 0));
        worker.shutdown().await;
        assert_eq!(store.get("k").unwrap().unwrap().remaining_secs, 2.0);
    }

    #[tokio::test]
    async fn worker_survives_store_failures() {
        let worker = PersistWorker::spawn(Arc::new(FailingStore), "k");
        worker.submit(TimerState::new(1.0, true, 0));
        worker.submit(TimerState::new(2.0, true, 0));
        worker.shutdown().await;
    }
}
