//! # Handler abstractions: the collaborator boundary.
//!
//! This module provides the types the application plugs its request logic in
//! with:
//! - [`ConnectionHandler`] — trait for serving one accepted connection
//! - [`HandlerFn`] — closure-based handler implementation
//! - [`HandlerRef`] — shared reference to a handler (`Arc<dyn ConnectionHandler>`)

mod handler;
mod handler_fn;

pub use handler::{ConnectionHandler, HandlerRef};
pub use handler_fn::HandlerFn;
