//! # Connection handler abstraction.
//!
//! Defines the [`ConnectionHandler`] trait, the collaborator boundary between
//! the supervision core and the application's request logic. The common handle
//! type is [`HandlerRef`], an `Arc<dyn ConnectionHandler>` suitable for
//! sharing across connection tasks.
//!
//! A handler receives a [`CancellationToken`] per connection and should check
//! it at its own suspension points so the worker's forced drain can close
//! stuck connections.

use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;

/// Shared handle to a connection handler (`Arc<dyn ConnectionHandler>`).
pub type HandlerRef = std::sync::Arc<dyn ConnectionHandler>;

/// # Per-connection request handler.
///
/// One instance is shared by all connection tasks of a worker. The core never
/// inspects request bytes: everything between accept and close belongs to the
/// handler.
///
/// ## Readiness precondition
/// [`ready`](ConnectionHandler::ready) is polled before each accepted
/// connection is dispatched. When it returns `false` (persistence layer down,
/// upstream degraded), the connection is handed to
/// [`reject`](ConnectionHandler::reject) instead of
/// [`handle`](ConnectionHandler::handle), so clients fail fast rather than
/// hang. The default `reject` closes the socket immediately; protocol-aware
/// handlers can write a 503-style response first.
///
/// # Example
/// ```
/// use std::net::SocketAddr;
/// use async_trait::async_trait;
/// use tokio::net::TcpStream;
/// use tokio_util::sync::CancellationToken;
/// use procvisor::{ConnectionHandler, HandlerError};
///
/// struct Echo;
///
/// #[async_trait]
/// impl ConnectionHandler for Echo {
///     fn name(&self) -> &str { "echo" }
///
///     async fn handle(
///         &self,
///         mut stream: TcpStream,
///         _peer: SocketAddr,
///         ctx: CancellationToken,
///     ) -> Result<(), HandlerError> {
///         use tokio::io::{AsyncReadExt, AsyncWriteExt};
///         let mut buf = [0u8; 4096];
///         loop {
///             tokio::select! {
///                 _ = ctx.cancelled() => break,
///                 n = stream.read(&mut buf) => {
///                     let n = n?;
///                     if n == 0 { break; }
///                     stream.write_all(&buf[..n]).await?;
///                 }
///             }
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Returns a stable, human-readable handler name.
    fn name(&self) -> &str {
        "handler"
    }

    /// Readiness precondition (e.g. a persistence connectivity check).
    ///
    /// Polled per accepted connection; must be cheap and must not block.
    async fn ready(&self) -> bool {
        true
    }

    /// Serves one accepted connection until completion or cancellation.
    ///
    /// Implementations should select on `ctx.cancelled()` at their suspension
    /// points and return promptly once cancelled.
    async fn handle(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        ctx: CancellationToken,
    ) -> Result<(), HandlerError>;

    /// Disposes a connection accepted while [`ready`](ConnectionHandler::ready)
    /// is `false`.
    ///
    /// Default: drop the socket (immediate close).
    async fn reject(&self, stream: TcpStream) {
        drop(stream);
    }
}
