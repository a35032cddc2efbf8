//! # Core subscriber trait
//!
//! `Subscribe` is the extension point for plugging custom event handlers into
//! the runtime (logging, metrics, alerting). Subscribers are driven by the
//! listener spawned in [`Cluster::run`](crate::Cluster::run), which forwards
//! every bus event to every subscriber in order.
//!
//! ## Contract
//! - Implementations should be quick; they run on the shared listener task
//!   and a slow subscriber delays delivery to the ones after it.
//! - Events arrive in bus order; a lagging listener may skip old events
//!   (broadcast ring buffer semantics).

use async_trait::async_trait;

use crate::events::Event;

/// Contract for event subscribers.
///
/// Called from the cluster's listener task. Implementations should avoid
/// blocking the async runtime (prefer async I/O and cooperative waits).
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles a single event.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs/metrics).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
