//! # Primary supervisor: owns the worker pool lifecycle.
//!
//! The [`Primary`] spawns one worker process per configured slot (re-exec of
//! the current executable with the role marker env var), monitors each child
//! through a per-child monitor task, and drives everything from a single
//! supervision loop fed by one mpsc channel.
//!
//! ## Wiring
//! ```text
//!                       ┌──────────────────────────────────────────┐
//!                       │ Primary supervision loop                 │
//!  signal ────────────► │  - WorkerTable (pid → record)            │
//!                       │  - restart scheduling (fixed backoff)    │
//!                       │  - shutdown window enforcement           │
//!                       └───▲──────────▲──────────▲────────────────┘
//!                           │          │          │   mpsc<Control>
//!                     ┌─────┴────┐ ┌───┴──────┐ ┌─┴────────┐
//!                     │ monitor 1│ │ monitor 2│ │ backoff  │
//!                     │ (child)  │ │ (child)  │ │ timers   │
//!                     └───▲──────┘ └───▲──────┘ └──────────┘
//!                         │ stdout pipe │
//!                      worker 1      worker 2      ...
//! ```
//!
//! ## Rules
//! - A worker exit is never fatal to the primary; while running, every exit
//!   schedules exactly one replacement after `restart_backoff`.
//! - Readiness is recorded idempotently; duplicates and unknown pids are
//!   logged and dropped.
//! - The first termination signal starts the drain; the signal arm is then
//!   disarmed, so repeats cannot double-drain or reset the window.
//! - Exceeding `drain_timeout + grace` force-kills stragglers; that outcome
//!   is logged as its own condition but the shutdown still returns `Ok`.
//! - Errors in the supervision machinery itself (spawn, bind, signal
//!   registration) are fatal: the primary has no higher-level supervisor.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::cluster::control::ControlMessage;
use crate::cluster::records::WorkerTable;
use crate::cluster::shutdown::{self, ShutdownPhase, ShutdownState};
use crate::config::{self, Config};
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::health;

/// Messages feeding the supervision loop.
#[derive(Debug)]
enum Control {
    /// A worker reported readiness over its stdout pipe.
    Ready { pid: u32 },
    /// A worker process terminated.
    Exited {
        pid: u32,
        code: Option<i32>,
        signal: Option<i32>,
    },
    /// A restart backoff timer fired.
    Respawn,
}

/// Spawns, monitors, restarts, and drains the worker pool.
pub struct Primary {
    cfg: Config,
    bus: Bus,
    table: Arc<WorkerTable>,
}

impl Primary {
    /// Creates a primary supervisor with an empty worker table.
    pub fn new(cfg: Config, bus: Bus) -> Self {
        Self {
            cfg,
            bus,
            table: Arc::new(WorkerTable::new()),
        }
    }

    /// Shared read handle for the health reporter (and tests).
    pub fn table(&self) -> Arc<WorkerTable> {
        Arc::clone(&self.table)
    }

    /// Runs the supervision loop until a completed shutdown.
    pub async fn run(&self) -> Result<(), RuntimeError> {
        let pid = std::process::id();
        info!(
            "[primary {pid}] starting, pool size {} on port {}",
            self.cfg.workers, self.cfg.app_port
        );

        let (tx, mut rx) = mpsc::unbounded_channel::<Control>();
        for _ in 0..self.cfg.workers {
            self.spawn_worker(&tx).await?;
        }

        let health_listener = health::bind(self.cfg.health_addr()).await?;
        let health_token = CancellationToken::new();
        let health_task = tokio::spawn(health::serve(
            health_listener,
            self.table(),
            health_token.clone(),
        ));

        let mut state = ShutdownState::new();
        let signal = shutdown::wait_for_shutdown_signal();
        tokio::pin!(signal);

        // Armed (reset to the real window) when drain starts.
        let deadline = time::sleep(FAR_FUTURE);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                res = &mut signal, if state.is_running() => {
                    res.map_err(|source| RuntimeError::Signal { source })?;
                    state.advance(ShutdownPhase::Draining);
                    info!("[primary {pid}] shutdown signal received, draining workers");
                    self.bus.publish(Event::new(EventKind::ShutdownRequested));
                    self.table.mark_all_draining().await;
                    self.signal_workers().await;
                    deadline.as_mut().reset(Instant::now() + self.cfg.shutdown_window());

                    if self.table.is_empty().await {
                        self.bus.publish(Event::new(EventKind::AllExitedWithinGrace));
                        break;
                    }
                }
                _ = deadline.as_mut(), if state.is_draining() => {
                    state.advance(ShutdownPhase::ForceExiting);
                    let remaining = self.table.pids().await;
                    let err = RuntimeError::GraceExceeded {
                        window: self.cfg.shutdown_window(),
                        remaining: remaining.clone(),
                    };
                    warn!("[primary {pid}] {}", err.as_message());
                    self.bus.publish(
                        Event::new(EventKind::GraceExceeded).with_reason(format!("{remaining:?}")),
                    );
                    self.force_kill_workers(&remaining).await;
                    break;
                }
                Some(msg) = rx.recv() => match msg {
                    Control::Ready { pid } => self.on_ready(pid).await,
                    Control::Exited { pid: worker, code, signal } => {
                        self.on_exit(worker, code, signal, &tx, &state).await;
                        if state.is_draining() && self.table.is_empty().await {
                            info!("[primary {pid}] all workers exited within the window");
                            self.bus.publish(Event::new(EventKind::AllExitedWithinGrace));
                            break;
                        }
                    }
                    Control::Respawn => {
                        if state.is_running() {
                            self.spawn_worker(&tx).await?;
                        }
                    }
                }
            }
        }

        health_token.cancel();
        let _ = health_task.await;
        Ok(())
    }

    /// Records a readiness message; duplicates and unknown pids are no-ops.
    async fn on_ready(&self, pid: u32) {
        if self.table.mark_ready(pid).await {
            info!("[primary] worker {pid} is ready");
            self.bus
                .publish(Event::new(EventKind::WorkerReady).with_pid(pid));
        } else {
            debug!("[primary] ignoring duplicate or unknown readiness from pid {pid}");
        }
    }

    /// Handles a worker exit: drop the record and, while running, schedule
    /// exactly one replacement after the fixed backoff.
    async fn on_exit(
        &self,
        pid: u32,
        code: Option<i32>,
        signal: Option<i32>,
        tx: &mpsc::UnboundedSender<Control>,
        state: &ShutdownState,
    ) {
        self.table.remove(pid).await;

        let mut ev = Event::new(EventKind::WorkerExited).with_pid(pid);
        if let Some(code) = code {
            ev = ev.with_exit_code(code);
        }
        if let Some(sig) = signal {
            ev = ev.with_reason(format!("signal {sig}"));
        }
        self.bus.publish(ev);
        info!("[primary] worker {pid} exited (code={code:?}, signal={signal:?})");

        if state.is_running() {
            let delay = self.cfg.restart_backoff;
            info!("[primary] restarting worker in {delay:?}");
            self.bus.publish(
                Event::new(EventKind::RestartScheduled)
                    .with_pid(pid)
                    .with_delay(delay),
            );

            let tx = tx.clone();
            tokio::spawn(async move {
                time::sleep(delay).await;
                let _ = tx.send(Control::Respawn);
            });
        }
    }

    /// Spawns one worker process and its monitor task.
    ///
    /// The monitor owns the child: it decodes control lines from the stdout
    /// pipe until EOF, then reaps the exit status. The exit notification
    /// therefore always follows the last control message of that child.
    async fn spawn_worker(&self, tx: &mpsc::UnboundedSender<Control>) -> Result<(), RuntimeError> {
        let exe = std::env::current_exe().map_err(|source| RuntimeError::Spawn { source })?;
        let mut child = Command::new(exe)
            .env(config::ENV_WORKER_ROLE, "1")
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|source| RuntimeError::Spawn { source })?;
        let pid = child.id().ok_or_else(|| RuntimeError::Spawn {
            source: std::io::Error::other("worker exited before its pid could be observed"),
        })?;

        self.table.insert_starting(pid).await;
        self.bus
            .publish(Event::new(EventKind::WorkerSpawned).with_pid(pid));
        info!("[primary] worker {pid} started");

        let stdout = child.stdout.take();
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Some(out) = stdout {
                let mut lines = BufReader::new(out).lines();
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => match ControlMessage::decode(&line) {
                            Ok(ControlMessage::Ready { pid }) => {
                                let _ = tx.send(Control::Ready { pid });
                            }
                            Err(err) => {
                                debug!(
                                    "[primary] unrecognized control line from worker {pid}: {err}"
                                );
                            }
                        },
                        Ok(None) => break,
                        Err(err) => {
                            warn!("[primary] control channel read error for worker {pid}: {err}");
                            break;
                        }
                    }
                }
            }

            let (code, signal) = match child.wait().await {
                Ok(status) => (status.code(), exit_signal(&status)),
                Err(err) => {
                    warn!("[primary] failed to reap worker {pid}: {err}");
                    (None, None)
                }
            };
            let _ = tx.send(Control::Exited { pid, code, signal });
        });
        Ok(())
    }

    /// Asks every live worker to drain (SIGTERM).
    async fn signal_workers(&self) {
        for pid in self.table.pids().await {
            deliver_signal(pid, TermSignal::Term);
        }
    }

    /// Force-kills workers that outlived the shutdown window (SIGKILL).
    async fn force_kill_workers(&self, pids: &[u32]) {
        for &pid in pids {
            deliver_signal(pid, TermSignal::Kill);
        }
    }
}

/// Far enough that an unarmed deadline never fires on its own.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365);

/// Which signal to deliver to a worker.
#[derive(Clone, Copy, Debug)]
enum TermSignal {
    Term,
    Kill,
}

#[cfg(unix)]
fn deliver_signal(pid: u32, which: TermSignal) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let sig = match which {
        TermSignal::Term => Signal::SIGTERM,
        TermSignal::Kill => Signal::SIGKILL,
    };
    if let Err(err) = kill(Pid::from_raw(pid as i32), sig) {
        // The worker may have exited between the table read and this call.
        warn!("[primary] failed to deliver {sig} to worker {pid}: {err}");
    }
}

#[cfg(not(unix))]
fn deliver_signal(pid: u32, which: TermSignal) {
    warn!("[primary] cannot deliver {which:?} to worker {pid}: unsupported platform");
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_primary(cfg: Config) -> Primary {
        Primary::new(cfg, Bus::new(64))
    }

    #[tokio::test(start_paused = true)]
    async fn test_exit_while_running_schedules_one_respawn() {
        let cfg = Config {
            restart_backoff: Duration::from_secs(2),
            ..Config::default()
        };
        let primary = test_primary(cfg);
        let mut events = primary.bus.subscribe();
        let (tx, mut rx) = mpsc::unbounded_channel();

        primary.table.insert_starting(7).await;
        let state = ShutdownState::new();
        primary.on_exit(7, Some(1), None, &tx, &state).await;

        assert!(primary.table.is_empty().await, "record removed on exit");

        let exited = events.recv().await.unwrap();
        assert_eq!(exited.kind, EventKind::WorkerExited);
        assert_eq!(exited.exit_code, Some(1));

        let scheduled = events.recv().await.unwrap();
        assert_eq!(scheduled.kind, EventKind::RestartScheduled);
        assert_eq!(scheduled.delay_ms, Some(2000));

        // The respawn request arrives only after the backoff elapses.
        let msg = rx.recv().await.unwrap();
        assert!(matches!(msg, Control::Respawn));
        assert!(rx.try_recv().is_err(), "exactly one respawn per exit");
    }

    #[tokio::test(start_paused = true)]
    async fn test_exit_while_draining_schedules_nothing() {
        let primary = test_primary(Config::default());
        let (tx, mut rx) = mpsc::unbounded_channel();

        primary.table.insert_starting(7).await;
        let mut state = ShutdownState::new();
        state.advance(ShutdownPhase::Draining);
        primary.on_exit(7, Some(0), None, &tx, &state).await;

        drop(tx);
        assert!(rx.recv().await.is_none(), "no respawn while draining");
    }

    #[tokio::test]
    async fn test_duplicate_ready_does_not_change_counts() {
        let primary = test_primary(Config::default());
        primary.table.insert_starting(9).await;

        primary.on_ready(9).await;
        primary.on_ready(9).await;
        primary.on_ready(9).await;

        let status = primary.table.status().await;
        assert_eq!(status.ready_workers, 1);
        assert_eq!(status.total_workers, 1);
    }

    #[tokio::test]
    async fn test_ready_for_unknown_pid_is_ignored() {
        let primary = test_primary(Config::default());
        primary.on_ready(404).await;
        assert!(primary.table.is_empty().await);
    }
}
