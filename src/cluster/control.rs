//! # Control channel between primary and workers.
//!
//! The channel is the worker's stdout pipe, established at spawn time and
//! carrying line-delimited JSON. Today the vocabulary is a single message:
//!
//! ```text
//! {"type":"ready","pid":4243}\n
//! ```
//!
//! sent exactly once by a worker after it bound its listener. No
//! acknowledgement is expected. The primary's per-child monitor decodes each
//! line; undecodable lines are logged and skipped — a lost or mangled
//! readiness message merely leaves the record in `Starting`, which the health
//! endpoint surfaces for operator diagnosis.
//!
//! Because stdout is the channel, worker logging must go to stderr (the
//! `env_logger` default).

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

/// Message sent from a worker to the primary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    /// Worker bound its listener and is accepting connections.
    Ready {
        /// Sender's OS process id.
        pid: u32,
    },
}

impl ControlMessage {
    /// Encodes the message as one JSON line (trailing newline included).
    pub fn encode(&self) -> String {
        // Serialization of this enum cannot fail; keep the API infallible.
        let mut line = serde_json::to_string(self).unwrap_or_default();
        line.push('\n');
        line
    }

    /// Decodes one line of the control channel.
    pub fn decode(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim())
    }
}

/// Sends the one-shot readiness message over the worker's stdout pipe.
///
/// A send failure is not fatal to the worker: it keeps serving, and the
/// primary simply never sees it leave `Starting`.
pub async fn send_ready(pid: u32) -> std::io::Result<()> {
    let line = ControlMessage::Ready { pid }.encode();
    let mut out = tokio::io::stdout();
    out.write_all(line.as_bytes()).await?;
    out.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_wire_format() {
        let line = ControlMessage::Ready { pid: 4243 }.encode();
        assert_eq!(line, "{\"type\":\"ready\",\"pid\":4243}\n");
    }

    #[test]
    fn test_decode_tolerates_surrounding_whitespace() {
        let msg = ControlMessage::decode("  {\"type\":\"ready\",\"pid\":7}\n").unwrap();
        assert_eq!(msg, ControlMessage::Ready { pid: 7 });
    }

    #[test]
    fn test_decode_rejects_unknown_lines() {
        assert!(ControlMessage::decode("starting server on :4000").is_err());
        assert!(ControlMessage::decode("{\"type\":\"reboot\"}").is_err());
    }
}
