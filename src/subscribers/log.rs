//! # Logging subscriber.
//!
//! [`LogWriter`] forwards runtime events to the [`log`] facade. Worker stdout
//! is the control channel, so make sure the installed logger writes to stderr
//! (the `env_logger` default).
//!
//! ## Output format
//! ```text
//! [spawned] pid=4243
//! [ready] pid=4243
//! [exited] pid=4243 code=Some(1) signal=None
//! [restart-scheduled] pid=4243 delay_ms=2000
//! [shutdown-requested]
//! [drain-forced] pid=4244
//! ```

use async_trait::async_trait;
use log::{debug, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Subscriber that mirrors runtime events into the `log` facade.
///
/// Pool and shutdown milestones log at `info`, contained connection failures
/// at `debug`, forced outcomes at `warn`.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Creates a new log subscriber.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    fn name(&self) -> &'static str {
        "log-writer"
    }

    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::WorkerSpawned => {
                info!("[spawned] pid={:?}", e.pid);
            }
            EventKind::WorkerReady => {
                info!("[ready] pid={:?}", e.pid);
            }
            EventKind::WorkerExited => {
                info!(
                    "[exited] pid={:?} code={:?} signal={:?}",
                    e.pid, e.exit_code, e.reason
                );
            }
            EventKind::RestartScheduled => {
                info!("[restart-scheduled] pid={:?} delay_ms={:?}", e.pid, e.delay_ms);
            }
            EventKind::ListenerBound => {
                info!("[listener-bound] pid={:?}", e.pid);
            }
            EventKind::ConnectionFailed => {
                debug!("[connection-failed] pid={:?} err={:?}", e.pid, e.reason);
            }
            EventKind::ShutdownRequested => {
                info!("[shutdown-requested]");
            }
            EventKind::DrainStarted => {
                info!("[drain-started] pid={:?}", e.pid);
            }
            EventKind::DrainCompleted => {
                info!("[drain-completed] pid={:?}", e.pid);
            }
            EventKind::DrainForced => {
                warn!("[drain-forced] pid={:?}", e.pid);
            }
            EventKind::AllExitedWithinGrace => {
                info!("[all-exited-within-grace]");
            }
            EventKind::GraceExceeded => {
                warn!("[grace-exceeded] remaining={:?}", e.reason);
            }
        }
    }
}
