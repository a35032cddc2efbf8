//! # Worker records and the derived cluster status.
//!
//! [`WorkerTable`] is the primary's single source of truth about its pool:
//! one [`WorkerRecord`] per live worker process, keyed by pid. The table is
//! owned by the primary and mutated only from control-channel messages and
//! exit notifications; the health reporter holds a shared read handle.
//!
//! [`ClusterStatus`] is a read-only projection recomputed on demand — it has
//! no identity of its own and is never cached.
//!
//! ## Record lifecycle
//! ```text
//! spawn ──► Starting ──(ready message)──► Ready ──(shutdown)──► Draining
//!    │           │                          │                      │
//!    └───────────┴───────(process exit: record removed)────────────┘
//! ```
//!
//! ## Rules
//! - `Ready` requires an explicit readiness message; absence of a message
//!   keeps the record in `Starting` forever, visible on the health endpoint.
//! - Marking ready is idempotent: a duplicate message is a no-op.
//! - A record never moves backwards out of `Draining`.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use serde::Serialize;
use tokio::sync::RwLock;

/// Lifecycle state of one worker process, as seen by the primary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Spawned; readiness message not yet received.
    Starting,
    /// Bound its listener and reported ready.
    Ready,
    /// Told to drain; expected to exit soon.
    Draining,
    /// Exited (transient: exited records are removed from the table).
    Exited,
}

/// Primary-side record of one worker process.
#[derive(Clone, Debug)]
pub struct WorkerRecord {
    /// OS process id.
    pub pid: u32,
    /// Current lifecycle state.
    pub state: WorkerState,
    /// When the process was spawned.
    pub spawned_at: Instant,
    /// When the readiness message arrived, if it has.
    pub ready_at: Option<Instant>,
}

/// Point-in-time projection of the worker pool, served by `GET /health`.
///
/// Serialized shape:
/// ```json
/// {
///   "totalWorkers": 2,
///   "readyWorkers": 2,
///   "allWorkersReady": true,
///   "workers": { "4243": "ready", "4244": "ready" }
/// }
/// ```
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    /// Number of live worker processes.
    pub total_workers: usize,
    /// Number of workers in [`WorkerState::Ready`].
    pub ready_workers: usize,
    /// `total_workers == ready_workers` (and the pool is non-empty).
    pub all_workers_ready: bool,
    /// Per-pid state map (sorted by pid for stable output).
    pub workers: BTreeMap<u32, WorkerState>,
}

/// Pid-keyed table of [`WorkerRecord`]s.
///
/// Mutations happen on the primary's supervision loop; the health reporter
/// only reads. The lock is held for map operations only, never across await
/// points doing I/O.
#[derive(Debug, Default)]
pub struct WorkerTable {
    inner: RwLock<HashMap<u32, WorkerRecord>>,
}

impl WorkerTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly spawned worker in [`WorkerState::Starting`].
    pub async fn insert_starting(&self, pid: u32) {
        let record = WorkerRecord {
            pid,
            state: WorkerState::Starting,
            spawned_at: Instant::now(),
            ready_at: None,
        };
        self.inner.write().await.insert(pid, record);
    }

    /// Transitions `pid` to [`WorkerState::Ready`].
    ///
    /// Returns `true` if the record transitioned; `false` for a duplicate
    /// message, an unknown pid, or a record already draining (all no-ops).
    pub async fn mark_ready(&self, pid: u32) -> bool {
        let mut inner = self.inner.write().await;
        match inner.get_mut(&pid) {
            Some(rec) if rec.state == WorkerState::Starting => {
                rec.state = WorkerState::Ready;
                rec.ready_at = Some(Instant::now());
                true
            }
            _ => false,
        }
    }

    /// Transitions every record to [`WorkerState::Draining`].
    pub async fn mark_all_draining(&self) {
        let mut inner = self.inner.write().await;
        for rec in inner.values_mut() {
            rec.state = WorkerState::Draining;
        }
    }

    /// Removes the record for an exited worker.
    pub async fn remove(&self, pid: u32) -> Option<WorkerRecord> {
        self.inner.write().await.remove(&pid)
    }

    /// Pids of all live workers.
    pub async fn pids(&self) -> Vec<u32> {
        self.inner.read().await.keys().copied().collect()
    }

    /// True when no workers remain.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Computes the current [`ClusterStatus`] projection.
    ///
    /// Recomputed fresh on every call; the table is small and health queries
    /// are rare relative to mutations.
    pub async fn status(&self) -> ClusterStatus {
        let inner = self.inner.read().await;
        let workers: BTreeMap<u32, WorkerState> =
            inner.values().map(|r| (r.pid, r.state)).collect();
        let total_workers = workers.len();
        let ready_workers = workers
            .values()
            .filter(|s| **s == WorkerState::Ready)
            .count();
        ClusterStatus {
            total_workers,
            ready_workers,
            all_workers_ready: total_workers > 0 && total_workers == ready_workers,
            workers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ready_requires_explicit_signal() {
        let table = WorkerTable::new();
        table.insert_starting(1).await;

        let status = table.status().await;
        assert_eq!(status.total_workers, 1);
        assert_eq!(status.ready_workers, 0);
        assert!(!status.all_workers_ready);
    }

    #[tokio::test]
    async fn test_mark_ready_is_idempotent() {
        let table = WorkerTable::new();
        table.insert_starting(1).await;

        assert!(table.mark_ready(1).await);
        assert!(!table.mark_ready(1).await, "duplicate must be a no-op");

        let status = table.status().await;
        assert_eq!(status.ready_workers, 1);
        assert!(status.all_workers_ready);
    }

    #[tokio::test]
    async fn test_mark_ready_unknown_pid_is_noop() {
        let table = WorkerTable::new();
        assert!(!table.mark_ready(99).await);
        assert!(table.is_empty().await);
    }

    #[tokio::test]
    async fn test_draining_record_ignores_late_ready() {
        let table = WorkerTable::new();
        table.insert_starting(1).await;
        table.mark_all_draining().await;

        assert!(!table.mark_ready(1).await);
        assert_eq!(table.status().await.ready_workers, 0);
    }

    #[tokio::test]
    async fn test_remove_drops_record() {
        let table = WorkerTable::new();
        table.insert_starting(1).await;
        table.insert_starting(2).await;
        table.mark_ready(1).await;

        let removed = table.remove(1).await.unwrap();
        assert_eq!(removed.pid, 1);
        assert_eq!(removed.state, WorkerState::Ready);

        let status = table.status().await;
        assert_eq!(status.total_workers, 1);
        assert_eq!(status.ready_workers, 0);
    }

    #[tokio::test]
    async fn test_status_json_shape() {
        let table = WorkerTable::new();
        table.insert_starting(10).await;
        table.insert_starting(20).await;
        table.mark_ready(10).await;

        let json = serde_json::to_value(table.status().await).unwrap();
        assert_eq!(json["totalWorkers"], 2);
        assert_eq!(json["readyWorkers"], 1);
        assert_eq!(json["allWorkersReady"], false);
        assert_eq!(json["workers"]["10"], "ready");
        assert_eq!(json["workers"]["20"], "starting");
    }

    #[tokio::test]
    async fn test_empty_pool_is_not_all_ready() {
        let table = WorkerTable::new();
        assert!(!table.status().await.all_workers_ready);
    }
}
