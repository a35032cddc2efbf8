//! # Shutdown coordination: OS signals and the per-process shutdown state.
//!
//! Provides [`wait_for_shutdown_signal`], an async helper that completes when
//! the process receives a termination signal, and [`ShutdownState`], the
//! monotonic per-process drain state machine shared by both roles.
//!
//! ## Signals
//! **Unix platforms:**
//! - `SIGINT` (Ctrl-C in terminal)
//! - `SIGTERM` (default kill signal, used by systemd/Kubernetes; also what
//!   the primary sends to workers on drain)
//!
//! **Windows platforms:**
//! - `Ctrl-C` via [`tokio::signal::ctrl_c`]
//!
//! ## Re-entrancy
//! Both roles arm the signal future once and disarm it after the first
//! delivery, so a second signal during drain is ignored rather than starting
//! a second drain.

/// Per-process shutdown progression.
///
/// Transitions only move forward; once a process leaves `Running` it never
/// returns, and a regressing [`advance`](ShutdownState::advance) is refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ShutdownPhase {
    /// Serving normally.
    Running,
    /// Drain in progress; no new work is admitted.
    Draining,
    /// Drain window elapsed; terminating unconditionally.
    ForceExiting,
}

/// Monotonic wrapper around [`ShutdownPhase`].
#[derive(Clone, Copy, Debug)]
pub struct ShutdownState {
    phase: ShutdownPhase,
}

impl ShutdownState {
    /// Starts in [`ShutdownPhase::Running`].
    pub fn new() -> Self {
        Self {
            phase: ShutdownPhase::Running,
        }
    }

    /// Current phase.
    #[inline]
    pub fn phase(&self) -> ShutdownPhase {
        self.phase
    }

    /// Advances to `next` if that is a forward transition.
    ///
    /// Returns `true` on transition, `false` when `next` is the current phase
    /// or behind it (the request is ignored).
    pub fn advance(&mut self, next: ShutdownPhase) -> bool {
        if next > self.phase {
            self.phase = next;
            true
        } else {
            false
        }
    }

    /// True while serving normally.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.phase == ShutdownPhase::Running
    }

    /// True once drain has begun (draining or force-exiting).
    #[inline]
    pub fn is_draining(&self) -> bool {
        self.phase >= ShutdownPhase::Draining
    }
}

impl Default for ShutdownState {
    fn default() -> Self {
        Self::new()
    }
}

/// Waits for a termination signal.
///
/// Each call creates independent signal listeners.
///
/// Returns `Ok(())` when any signal is received, or `Err` if signal
/// registration fails.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
    }
    Ok(())
}

/// Waits for a termination signal.
///
/// Each call creates independent signal listeners.
///
/// Returns `Ok(())` when any signal is received, or `Err` if signal
/// registration fails.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        let mut state = ShutdownState::new();
        assert!(state.is_running());

        assert!(state.advance(ShutdownPhase::Draining));
        assert!(state.is_draining());
        assert!(!state.is_running());

        assert!(state.advance(ShutdownPhase::ForceExiting));
        assert_eq!(state.phase(), ShutdownPhase::ForceExiting);
    }

    #[test]
    fn test_never_regresses() {
        let mut state = ShutdownState::new();
        state.advance(ShutdownPhase::ForceExiting);

        assert!(!state.advance(ShutdownPhase::Draining));
        assert!(!state.advance(ShutdownPhase::Running));
        assert_eq!(state.phase(), ShutdownPhase::ForceExiting);
    }

    #[test]
    fn test_duplicate_advance_is_ignored() {
        let mut state = ShutdownState::new();
        assert!(state.advance(ShutdownPhase::Draining));
        assert!(!state.advance(ShutdownPhase::Draining), "no double-drain");
    }
}
