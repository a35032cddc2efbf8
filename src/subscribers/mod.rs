//! # Event subscribers for the procvisor runtime.
//!
//! This module provides the [`Subscribe`] trait and the built-in [`LogWriter`]
//! for handling runtime events broadcast through the
//! [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Event flow (within one process):
//!   Primary/Worker ── publish(Event) ──► Bus ──► Cluster listener
//!                                                     │
//!                                            ┌────────┼─────────┐
//!                                            ▼        ▼         ▼
//!                                        LogWriter  Metrics   Custom
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use procvisor::{Subscribe, Event, EventKind};
//! use async_trait::async_trait;
//!
//! struct MetricsSubscriber;
//!
//! #[async_trait]
//! impl Subscribe for MetricsSubscriber {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::WorkerExited {
//!             // increment restart counter
//!         }
//!     }
//! }
//! ```

mod log;
mod subscribe;

pub use log::LogWriter;
pub use subscribe::Subscribe;
