//! # Function-backed connection handler (`HandlerFn`)
//!
//! [`HandlerFn`] wraps a closure `F: Fn(TcpStream, SocketAddr, CancellationToken) -> Fut`,
//! producing a fresh future per connection. This avoids shared mutable state;
//! if the handler needs shared state (a pool, a counter), capture an
//! `Arc<...>` explicitly inside the closure.
//!
//! ## Example
//! ```rust
//! use std::net::SocketAddr;
//! use tokio::net::TcpStream;
//! use tokio_util::sync::CancellationToken;
//! use procvisor::{ConnectionHandler, HandlerFn, HandlerRef, HandlerError};
//!
//! let h: HandlerRef = HandlerFn::arc(
//!     "noop",
//!     |stream: TcpStream, _peer: SocketAddr, _ctx: CancellationToken| async move {
//!         drop(stream);
//!         Ok::<_, HandlerError>(())
//!     },
//! );
//!
//! assert_eq!(h.name(), "noop");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;
use crate::handlers::handler::ConnectionHandler;

/// Function-backed connection handler.
///
/// Wraps a closure that *creates* a new future per connection.
#[derive(Debug)]
pub struct HandlerFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> HandlerFn<F> {
    /// Creates a new function-backed handler.
    ///
    /// Prefer [`HandlerFn::arc`] when you immediately need a
    /// [`HandlerRef`](crate::HandlerRef).
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the handler and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> ConnectionHandler for HandlerFn<F>
where
    F: Fn(TcpStream, SocketAddr, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        ctx: CancellationToken,
    ) -> Result<(), HandlerError> {
        (self.f)(stream, peer, ctx).await
    }
}
