//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by the primary supervision
//! loop, the per-child monitors, and the worker accept/drain machinery.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] — event classification and payload metadata
//! - [`Bus`] — thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Primary` (pool + shutdown events), `Worker`
//!   (serving + drain events).
//! - **Consumers**: `Cluster::subscriber_listener()` fans events out to the
//!   attached [`Subscribe`](crate::Subscribe) implementations.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
