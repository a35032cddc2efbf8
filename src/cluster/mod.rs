//! Runtime core: role decision, supervision, and lifecycle.
//!
//! This module contains the process-cluster implementation. The public API
//! from this module is [`Cluster`], which decides the process role and runs
//! it, plus the read-only observation types ([`ClusterStatus`],
//! [`WorkerState`], [`DrainOutcome`]).
//!
//! Internal modules:
//! - [`primary`]: spawns/monitors the worker pool, restart backoff, shutdown window;
//! - [`worker`]: accept loop, connection tracking, polled drain;
//! - [`records`]: worker records and the derived cluster status;
//! - [`control`]: line-delimited JSON control channel over worker stdout;
//! - [`connections`]: guard-based open-connection set;
//! - [`listener`]: `SO_REUSEPORT` shared application listener;
//! - [`shutdown`]: signal handling and the monotonic shutdown state.

mod connections;
mod control;
mod listener;
mod primary;
mod records;
mod shutdown;
mod worker;

use std::sync::Arc;

use crate::config::Config;
use crate::error::RuntimeError;
use crate::events::Bus;
use crate::handlers::HandlerRef;
use crate::subscribers::Subscribe;

pub use records::{ClusterStatus, WorkerState};
pub use worker::DrainOutcome;

pub(crate) use records::WorkerTable;

use primary::Primary;
use worker::Worker;

/// Entry point for both cluster roles.
///
/// A process calls [`Cluster::run`] from `main`; the role marker env var
/// (set by a primary on the workers it spawns) decides which role this
/// process plays. Exactly one primary exists per cluster — the process the
/// operator started.
///
/// ## Example
/// ```no_run
/// use std::net::SocketAddr;
/// use std::sync::Arc;
/// use procvisor::{Cluster, Config, HandlerError, HandlerFn, HandlerRef, LogWriter};
/// use tokio::net::TcpStream;
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let handler: HandlerRef = HandlerFn::arc(
///         "app",
///         |stream: TcpStream, _peer: SocketAddr, _ctx: CancellationToken| async move {
///             drop(stream); // real handlers serve the connection here
///             Ok::<_, HandlerError>(())
///         },
///     );
///
///     let cluster = Cluster::new(Config::from_env(), vec![Arc::new(LogWriter::new())]);
///     cluster.run(handler).await?;
///     Ok(())
/// }
/// ```
pub struct Cluster {
    /// Global runtime configuration.
    pub cfg: Config,
    /// Event bus shared with the role runtime.
    pub bus: Bus,
    /// Subscribers receiving every bus event.
    subs: Vec<Arc<dyn Subscribe>>,
}

impl Cluster {
    /// Creates a cluster runtime with the given config and subscribers.
    pub fn new(cfg: Config, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        Self {
            cfg,
            bus,
            subs: subscribers,
        }
    }

    /// Runs this process in its role until shutdown completes.
    ///
    /// - Worker processes (role marker set) serve connections with `handler`.
    /// - The primary ignores `handler` and supervises the pool.
    ///
    /// Both roles return `Ok(())` for requested shutdowns, including forced
    /// ones; errors are setup/supervision failures.
    pub async fn run(&self, handler: HandlerRef) -> Result<(), RuntimeError> {
        self.subscriber_listener();

        if Config::is_worker_process() {
            Worker::new(self.cfg.clone(), self.bus.clone(), handler)
                .run()
                .await
        } else {
            Primary::new(self.cfg.clone(), self.bus.clone()).run().await
        }
    }

    /// Subscribes to the bus and forwards events to all subscribers in order.
    fn subscriber_listener(&self) {
        if self.subs.is_empty() {
            return;
        }
        let mut rx = self.bus.subscribe();
        let subs = self.subs.clone();

        tokio::spawn(async move {
            while let Ok(ev) = rx.recv().await {
                for sub in &subs {
                    sub.on_event(&ev).await;
                }
            }
        });
    }
}
