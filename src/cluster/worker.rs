//! # Worker runtime: accept, serve, drain.
//!
//! One [`Worker`] runs per spawned process. It owns the process's share of
//! the application listener, the [`ConnectionSet`], and the drain loop; the
//! injected [`ConnectionHandler`](crate::ConnectionHandler) owns everything
//! between accept and close.
//!
//! ## Flow
//! ```text
//! bind (SO_REUSEPORT) ──► send ready ──► accept loop
//!                                            │
//!       ┌───── signal (SIGINT/SIGTERM) ──────┤
//!       │                                    │
//!       │     ┌── fatal handler error ───────┤
//!       ▼     ▼                              ▼
//!     drain: stop accepting, poll ConnectionSet every drain_poll
//!       ├─ empty before drain_timeout ──► DrainCompleted (graceful)
//!       └─ deadline hit ──► cancel + abort connections ──► DrainForced
//! ```
//!
//! ## Rules
//! - Readiness is sent once, after a successful bind, never before.
//! - A failed connection is contained: logged, published, forgotten.
//! - A *fatal* handler error (or a handler panic) stops the accept loop and
//!   drains with the standard timeout; in-flight connections get their
//!   chance to finish.
//! - Both drain outcomes are a clean exit; the forced one is logged as a
//!   distinct condition but is not a failure.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use log::{debug, error, info, warn};
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::cluster::connections::ConnectionSet;
use crate::cluster::shutdown::{self, ShutdownPhase, ShutdownState};
use crate::cluster::{control, listener};
use crate::config::Config;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::handlers::HandlerRef;

/// How a drain ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrainOutcome {
    /// All connections closed on their own within the window.
    Graceful,
    /// The window elapsed; remaining connections were force-closed.
    Forced,
}

/// Serves connections in one worker process and participates in coordinated
/// shutdown.
pub struct Worker {
    cfg: Config,
    bus: Bus,
    handler: HandlerRef,
}

impl Worker {
    /// Creates a worker runtime for this process.
    pub fn new(cfg: Config, bus: Bus, handler: HandlerRef) -> Self {
        Self { cfg, bus, handler }
    }

    /// Runs until a termination signal or a fatal handler error, then drains.
    ///
    /// Returns `Ok(())` for both graceful and forced drains; only setup
    /// failures (bind, signal registration) surface as errors.
    pub async fn run(&self) -> Result<(), RuntimeError> {
        let pid = std::process::id();
        let app_addr = self.cfg.app_addr();

        let listener = listener::bind_reuseport(app_addr)?;
        self.bus
            .publish(Event::new(EventKind::ListenerBound).with_pid(pid));
        info!("[worker {pid}] listening on {app_addr}");

        if let Err(err) = control::send_ready(pid).await {
            // Not fatal: the worker serves anyway and simply stays `Starting`
            // on the health endpoint.
            warn!("[worker {pid}] failed to send readiness message: {err}");
        }

        let conns = ConnectionSet::new();
        let force_close = CancellationToken::new();
        let fatal = CancellationToken::new();
        let mut tasks = JoinSet::new();
        let mut state = ShutdownState::new();

        let signal = shutdown::wait_for_shutdown_signal();
        tokio::pin!(signal);

        loop {
            tokio::select! {
                res = &mut signal => {
                    res.map_err(|source| RuntimeError::Signal { source })?;
                    info!("[worker {pid}] termination signal received, draining");
                    break;
                }
                _ = fatal.cancelled() => {
                    warn!("[worker {pid}] fatal handler error, draining");
                    break;
                }
                Some(res) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(err) = res {
                        // Panics are already contained inside the task; this
                        // only sees aborts and runtime teardown.
                        debug!("[worker {pid}] connection task ended abnormally: {err}");
                    }
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        self.dispatch(stream, peer, &conns, &force_close, &fatal, &mut tasks);
                    }
                    Err(err) => {
                        warn!("[worker {pid}] accept failed: {err}");
                        self.bus.publish(
                            Event::new(EventKind::ConnectionFailed)
                                .with_pid(pid)
                                .with_reason(err.to_string()),
                        );
                    }
                }
            }
        }

        state.advance(ShutdownPhase::Draining);
        drop(listener); // stop accepting immediately
        self.bus
            .publish(Event::new(EventKind::DrainStarted).with_pid(pid));

        let outcome = drain(
            &conns,
            &force_close,
            &mut tasks,
            self.cfg.drain_timeout,
            self.cfg.drain_poll,
        )
        .await;

        match outcome {
            DrainOutcome::Graceful => {
                info!("[worker {pid}] drained cleanly");
                self.bus
                    .publish(Event::new(EventKind::DrainCompleted).with_pid(pid));
            }
            DrainOutcome::Forced => {
                state.advance(ShutdownPhase::ForceExiting);
                warn!(
                    "[worker {pid}] drain timeout {:?} elapsed, forced remaining connections closed",
                    self.cfg.drain_timeout
                );
                self.bus
                    .publish(Event::new(EventKind::DrainForced).with_pid(pid));
            }
        }
        Ok(())
    }

    /// Registers an accepted connection and serves it on its own task.
    fn dispatch(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        conns: &ConnectionSet,
        force_close: &CancellationToken,
        fatal: &CancellationToken,
        tasks: &mut JoinSet<()>,
    ) {
        let guard = conns.track();
        let handler = Arc::clone(&self.handler);
        let token = force_close.child_token();
        let fatal = fatal.clone();
        let bus = self.bus.clone();
        let pid = std::process::id();

        tasks.spawn(async move {
            let _guard = guard;

            if !handler.ready().await {
                debug!("[worker {pid}] handler not ready, rejecting {peer}");
                handler.reject(stream).await;
                return;
            }

            let fut = handler.handle(stream, peer, token);
            match std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(err)) if err.is_fatal() => {
                    error!("[worker {pid}] {} from {peer}: {err}", err.as_label());
                    bus.publish(
                        Event::new(EventKind::ConnectionFailed)
                            .with_pid(pid)
                            .with_reason(err.to_string()),
                    );
                    fatal.cancel();
                }
                Ok(Err(err)) => {
                    debug!("[worker {pid}] {} from {peer}: {err}", err.as_label());
                    bus.publish(
                        Event::new(EventKind::ConnectionFailed)
                            .with_pid(pid)
                            .with_reason(err.to_string()),
                    );
                }
                Err(panic) => {
                    let info = panic
                        .downcast_ref::<&str>()
                        .map(|s| (*s).to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "handler panicked".to_string());
                    error!("[worker {pid}] handler panicked serving {peer}: {info}");
                    bus.publish(
                        Event::new(EventKind::ConnectionFailed)
                            .with_pid(pid)
                            .with_reason(info),
                    );
                    fatal.cancel();
                }
            }
        });
    }
}

/// Waits for the connection set to empty, polling every `poll`, up to
/// `timeout`; on deadline, cancels and aborts the remaining connection tasks.
///
/// The wait is polled rather than blocking so the deadline is honored even
/// when connections never close.
pub(crate) async fn drain(
    conns: &ConnectionSet,
    force_close: &CancellationToken,
    tasks: &mut JoinSet<()>,
    timeout: Duration,
    poll: Duration,
) -> DrainOutcome {
    let deadline = Instant::now() + timeout;
    loop {
        if conns.is_empty() {
            while tasks.join_next().await.is_some() {}
            return DrainOutcome::Graceful;
        }

        let now = Instant::now();
        if now >= deadline {
            force_close.cancel();
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
            return DrainOutcome::Forced;
        }

        time::sleep(poll.min(deadline - now)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLL: Duration = Duration::from_millis(500);

    #[tokio::test(start_paused = true)]
    async fn test_drain_with_no_connections_is_immediate() {
        let conns = ConnectionSet::new();
        let force_close = CancellationToken::new();
        let mut tasks = JoinSet::new();

        let started = Instant::now();
        let outcome = drain(&conns, &force_close, &mut tasks, Duration::from_secs(30), POLL).await;

        assert_eq!(outcome, DrainOutcome::Graceful);
        assert!(
            started.elapsed() < POLL,
            "empty set must not wait a full poll interval"
        );
        assert!(!force_close.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_completes_once_connections_close() {
        let conns = ConnectionSet::new();
        let force_close = CancellationToken::new();
        let mut tasks = JoinSet::new();

        let guard = conns.track();
        tasks.spawn(async move {
            let _guard = guard;
            time::sleep(Duration::from_secs(1)).await;
        });

        let started = Instant::now();
        let outcome = drain(&conns, &force_close, &mut tasks, Duration::from_secs(30), POLL).await;

        assert_eq!(outcome, DrainOutcome::Graceful);
        // Closed at 1s; observed no later than the next poll tick.
        assert!(started.elapsed() <= Duration::from_millis(1500));
        assert!(!force_close.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_forces_at_deadline_when_connections_stick() {
        let conns = ConnectionSet::new();
        let force_close = CancellationToken::new();
        let mut tasks = JoinSet::new();

        let guard = conns.track();
        tasks.spawn(async move {
            let _guard = guard;
            std::future::pending::<()>().await;
        });

        let timeout = Duration::from_secs(3);
        let started = Instant::now();
        let outcome = drain(&conns, &force_close, &mut tasks, timeout, POLL).await;

        assert_eq!(outcome, DrainOutcome::Forced);
        assert!(started.elapsed() >= timeout);
        assert!(started.elapsed() < timeout + POLL);
        assert!(force_close.is_cancelled());
        assert!(conns.is_empty(), "aborted tasks must release their guards");
    }
}
