//! # procvisor
//!
//! **Procvisor** is a process-per-worker supervision runtime for Rust servers.
//!
//! It turns a single request-handling process into a resilient, horizontally
//! scaled cluster: a primary process spawns one worker per CPU, tracks their
//! readiness, restarts failures with a fixed backoff, serves a liveness
//! endpoint, and coordinates graceful shutdown across every process.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                         ┌─────────────────────────────────────────┐
//!                         │ Primary (the process you start)         │
//!                         │  - WorkerTable (pid → Starting/Ready/…) │
//!   GET /health ────────► │  - Health reporter (dedicated port)     │
//!                         │  - restart with fixed backoff           │
//!                         │  - shutdown window (drain + grace)      │
//!                         └────┬───────────┬───────────┬────────────┘
//!                              │ spawn     │ spawn     │ spawn
//!                              ▼           ▼           ▼
//!                         ┌─────────┐ ┌─────────┐ ┌─────────┐
//!                         │ worker 1│ │ worker 2│ │ worker N│   (re-exec'd
//!                         │ (accept │ │ (accept │ │ (accept │    with role
//!                         │  loop)  │ │  loop)  │ │  loop)  │    marker)
//!                         └────┬────┘ └────┬────┘ └────┬────┘
//!                              │           │           │
//!              {"type":"ready"}│  stdout control pipes │
//!                              ▼           ▼           ▼
//!                            Primary records readiness; exits
//!                            trigger restart or finish the drain
//!
//!   clients ──► shared TCP port (SO_REUSEPORT) ──► kernel picks a worker
//! ```
//!
//! ### Lifecycle
//! ```text
//! main() ──► Cluster::run(handler)
//!               │
//!               ├─ role marker set?  ──► Worker: bind → ready → accept loop
//!               │                          │
//!               │                          └─ signal/fatal ──► drain:
//!               │                               poll connections every 500ms,
//!               │                               force-close at drain_timeout,
//!               │                               exit 0 either way
//!               │
//!               └─ otherwise ──► Primary: spawn N workers + health endpoint
//!                                  │
//!                                  ├─ worker exits ──► backoff ──► respawn
//!                                  └─ signal ──► SIGTERM workers, wait up to
//!                                       drain_timeout + grace, SIGKILL rest
//! ```
//!
//! ## Features
//! | Area             | Description                                                  | Key types / traits                    |
//! |------------------|--------------------------------------------------------------|---------------------------------------|
//! | **Cluster**      | Role decision and per-role runtime.                          | [`Cluster`]                           |
//! | **Handler API**  | Plug in per-connection request logic.                        | [`ConnectionHandler`], [`HandlerFn`]  |
//! | **Health**       | Liveness projection served on a dedicated port.              | [`ClusterStatus`], [`WorkerState`]    |
//! | **Subscribers**  | Hook into runtime events (logging, metrics, custom).         | [`Subscribe`], [`LogWriter`]          |
//! | **Errors**       | Typed errors for the runtime and for connections.            | [`RuntimeError`], [`HandlerError`]    |
//! | **Configuration**| Centralized, environment-overridable settings.               | [`Config`]                            |
//!
//! ## Example
//! ```no_run
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//! use procvisor::{Cluster, Config, HandlerError, HandlerFn, HandlerRef, LogWriter};
//! use tokio::io::{AsyncReadExt, AsyncWriteExt};
//! use tokio::net::TcpStream;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     env_logger::init(); // logs go to stderr; worker stdout is the control channel
//!
//!     let handler: HandlerRef = HandlerFn::arc(
//!         "echo",
//!         |mut stream: TcpStream, _peer: SocketAddr, ctx: CancellationToken| async move {
//!             let mut buf = [0u8; 4096];
//!             loop {
//!                 tokio::select! {
//!                     _ = ctx.cancelled() => break,
//!                     n = stream.read(&mut buf) => {
//!                         let n = n?;
//!                         if n == 0 { break; }
//!                         stream.write_all(&buf[..n]).await?;
//!                     }
//!                 }
//!             }
//!             Ok::<_, HandlerError>(())
//!         },
//!     );
//!
//!     let cluster = Cluster::new(Config::from_env(), vec![Arc::new(LogWriter::new())]);
//!     cluster.run(handler).await?;
//!     Ok(())
//! }
//! ```

mod cluster;
mod config;
mod error;
mod events;
mod handlers;
mod health;
mod subscribers;

// ---- Public re-exports ----

pub use cluster::{Cluster, ClusterStatus, DrainOutcome, WorkerState};
pub use config::Config;
pub use error::{HandlerError, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use handlers::{ConnectionHandler, HandlerFn, HandlerRef};
pub use subscribers::{LogWriter, Subscribe};
