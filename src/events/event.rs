//! # Runtime events emitted by the primary and worker roles.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Pool events**: worker process lifecycle (spawned, ready, exited, restart)
//! - **Serving events**: listener/connection flow inside one worker
//! - **Shutdown events**: drain progression in either role
//!
//! The [`Event`] struct carries metadata such as timestamps, worker pid,
//! exit codes, reasons, and backoff delays.
//!
//! ## Ordering guarantees
//! Each event has a process-locally unique sequence number (`seq`) that
//! increases monotonically. Note that primary and workers are separate
//! processes with separate buses; `seq` orders events within one process only.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use procvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::RestartScheduled)
//!     .with_pid(4242)
//!     .with_delay(Duration::from_secs(2))
//!     .with_reason("exit code 1");
//!
//! assert_eq!(ev.kind, EventKind::RestartScheduled);
//! assert_eq!(ev.pid, Some(4242));
//! assert_eq!(ev.delay_ms, Some(2000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Pool events (primary) ===
    /// A worker process was spawned.
    ///
    /// Sets: `pid`, `at`, `seq`.
    WorkerSpawned,

    /// A worker reported readiness over the control channel.
    ///
    /// Sets: `pid`, `at`, `seq`.
    WorkerReady,

    /// A worker process exited.
    ///
    /// Sets: `pid`, `exit_code` (when the OS reported one),
    /// `reason` (termination signal, when killed), `at`, `seq`.
    WorkerExited,

    /// A replacement spawn was scheduled after backoff.
    ///
    /// Sets: `pid` (the exited worker), `delay_ms`, `at`, `seq`.
    RestartScheduled,

    // === Serving events (worker) ===
    /// The worker bound the shared application listener.
    ///
    /// Sets: `pid`, `at`, `seq`.
    ListenerBound,

    /// A single connection failed (contained; worker keeps serving).
    ///
    /// Sets: `pid`, `reason`, `at`, `seq`.
    ConnectionFailed,

    // === Shutdown events (both roles) ===
    /// A termination signal was observed; drain begins.
    ///
    /// Sets: `at`, `seq`.
    ShutdownRequested,

    /// The worker stopped accepting and entered its drain loop.
    ///
    /// Sets: `pid`, `at`, `seq`.
    DrainStarted,

    /// All connections closed within the drain window.
    ///
    /// Sets: `pid`, `at`, `seq`.
    DrainCompleted,

    /// Drain window elapsed; remaining connections were force-closed.
    ///
    /// Sets: `pid`, `at`, `seq`.
    DrainForced,

    /// All workers exited within the primary's shutdown window.
    ///
    /// Sets: `at`, `seq`.
    AllExitedWithinGrace,

    /// Shutdown window exceeded; stragglers were force-killed.
    ///
    /// Sets: `reason` (remaining pids), `at`, `seq`.
    GraceExceeded,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic per-process sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Process-locally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Worker process id, if applicable.
    pub pid: Option<u32>,
    /// Worker exit code, if the OS reported one.
    pub exit_code: Option<i32>,
    /// Backoff delay before a replacement spawn, in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Human-readable reason (errors, signal names, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next
    /// sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            pid: None,
            exit_code: None,
            delay_ms: None,
            reason: None,
        }
    }

    /// Attaches a worker pid.
    #[inline]
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Attaches an exit code.
    #[inline]
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// Attaches a backoff delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::new(EventKind::WorkerSpawned);
        let b = Event::new(EventKind::WorkerReady);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_builder_sets_fields() {
        let ev = Event::new(EventKind::WorkerExited)
            .with_pid(7)
            .with_exit_code(1)
            .with_reason("SIGKILL");
        assert_eq!(ev.pid, Some(7));
        assert_eq!(ev.exit_code, Some(1));
        assert_eq!(ev.reason.as_deref(), Some("SIGKILL"));
        assert!(ev.delay_ms.is_none());
    }

    #[test]
    fn test_delay_saturates_at_u32_millis() {
        let ev = Event::new(EventKind::RestartScheduled).with_delay(Duration::from_secs(u64::MAX));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }
}
