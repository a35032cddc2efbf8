//! # Open-connection tracking for one worker.
//!
//! [`ConnectionSet`] records which client connections are currently open so
//! the drain loop can answer one question: "any connections remaining?".
//! Membership is guard-based: accepting inserts via [`ConnectionSet::track`],
//! and dropping the returned [`ConnectionGuard`] removes — whichever way the
//! connection task ends (clean close, error, abort), the entry goes with it.
//!
//! The set is exclusively owned by its worker process; nothing crosses the
//! process boundary here.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

/// Set of currently-open client connections.
///
/// Cloneable; clones share the same underlying set. The interior mutex guards
/// map operations only and is never held across an await point.
#[derive(Clone, Debug, Default)]
pub struct ConnectionSet {
    inner: Arc<Mutex<HashSet<u64>>>,
    next_id: Arc<AtomicU64>,
}

impl ConnectionSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new connection; the entry lives as long as the guard.
    pub fn track(&self) -> ConnectionGuard {
        let id = self.next_id.fetch_add(1, AtomicOrdering::Relaxed);
        self.lock().insert(id);
        ConnectionGuard {
            id,
            inner: Arc::clone(&self.inner),
        }
    }

    /// Number of open connections.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when no connections are open.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<u64>> {
        // A poisoned lock only means a panicking thread held it mid-insert;
        // the set itself is still usable for the drain check.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Removes its connection from the set on drop.
#[derive(Debug)]
pub struct ConnectionGuard {
    id: u64,
    inner: Arc<Mutex<HashSet<u64>>>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let mut set = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        set.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_lifecycle() {
        let conns = ConnectionSet::new();
        assert!(conns.is_empty());

        let g1 = conns.track();
        let g2 = conns.track();
        assert_eq!(conns.len(), 2);

        drop(g1);
        assert_eq!(conns.len(), 1);
        drop(g2);
        assert!(conns.is_empty());
    }

    #[test]
    fn test_clones_share_state() {
        let conns = ConnectionSet::new();
        let view = conns.clone();
        let _g = conns.track();
        assert_eq!(view.len(), 1);
    }
}
