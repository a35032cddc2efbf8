//! Error types used by the procvisor runtime and connection handlers.
//!
//! This module defines two main error enums:
//!
//! - [`RuntimeError`] — errors raised by the supervision runtime itself.
//! - [`HandlerError`] — errors raised by per-connection handler invocations.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.
//! [`HandlerError::is_fatal`] decides whether a failed connection takes the whole
//! worker into drain or is contained to that one connection.

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the procvisor runtime.
///
/// These represent failures in the supervision machinery itself: binding
/// listeners, spawning worker processes, registering signal handlers, or a
/// drain window running out with workers still alive.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Binding a TCP listener failed. Fatal to the process that tried to bind.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address the bind was attempted on.
        addr: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Spawning a worker process failed.
    #[error("failed to spawn worker process: {source}")]
    Spawn {
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Registering OS signal handlers failed.
    #[error("failed to register signal handlers: {source}")]
    Signal {
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The health reporter failed while serving.
    #[error("health endpoint error: {source}")]
    Health {
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Drain window was exceeded; some workers had to be force-terminated.
    ///
    /// Note: a forced drain is still a *requested* shutdown. The primary
    /// reports it via events/logs rather than returning this from `run()`.
    #[error("drain window {window:?} exceeded; remaining workers: {remaining:?}")]
    GraceExceeded {
        /// The configured drain window (timeout + grace).
        window: Duration,
        /// Pids of workers that did not exit in time.
        remaining: Vec<u32>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use procvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { window: Duration::from_secs(35), remaining: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Bind { .. } => "runtime_bind",
            RuntimeError::Spawn { .. } => "runtime_spawn",
            RuntimeError::Signal { .. } => "runtime_signal",
            RuntimeError::Health { .. } => "runtime_health",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        self.to_string()
    }
}

/// # Errors produced by connection handling.
///
/// Returned by [`ConnectionHandler::handle`](crate::ConnectionHandler::handle).
/// Non-fatal errors are contained to the failing connection; a fatal error
/// takes the worker into drain (and then exit), mirroring the isolation
/// guarantee: one broken connection never corrupts the others, but an
/// unrecoverable handler fault must not keep a wedged worker serving.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum HandlerError {
    /// I/O error on the client connection (reset, broken pipe, ...).
    #[error("connection i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The handler's collaborator (persistence, upstream) is unavailable.
    #[error("handler collaborator unavailable")]
    Unavailable,

    /// Connection-scoped failure; other connections are unaffected.
    #[error("connection failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Unrecoverable handler fault; the worker drains and exits.
    #[error("fatal handler error: {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },
}

impl HandlerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::Io(_) => "handler_io",
            HandlerError::Unavailable => "handler_unavailable",
            HandlerError::Fail { .. } => "handler_failed",
            HandlerError::Fatal { .. } => "handler_fatal",
        }
    }

    /// Indicates whether this error must take the worker into drain.
    ///
    /// # Example
    /// ```
    /// use procvisor::HandlerError;
    ///
    /// let contained = HandlerError::Fail { error: "boom".into() };
    /// assert!(!contained.is_fatal());
    ///
    /// let fatal = HandlerError::Fatal { error: "nope".into() };
    /// assert!(fatal.is_fatal());
    /// ```
    pub fn is_fatal(&self) -> bool {
        matches!(self, HandlerError::Fatal { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_labels_are_stable() {
        let err = RuntimeError::Spawn {
            source: std::io::Error::other("no fork"),
        };
        assert_eq!(err.as_label(), "runtime_spawn");
        assert!(err.as_message().contains("no fork"));
    }

    #[test]
    fn test_io_errors_are_not_fatal() {
        let err = HandlerError::from(std::io::Error::other("reset"));
        assert_eq!(err.as_label(), "handler_io");
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_only_fatal_is_fatal() {
        assert!(!HandlerError::Unavailable.is_fatal());
        assert!(!HandlerError::Fail { error: "x".into() }.is_fatal());
        assert!(HandlerError::Fatal { error: "x".into() }.is_fatal());
    }
}
