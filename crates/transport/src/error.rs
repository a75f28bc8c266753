//! Transport error types.

use std::path::PathBuf;

/// Errors from the relay HTTP calls.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP error {status}: {body}")]
    Http { status: u16, body: String },

    #[error("unexpected response: {0}")]
    Protocol(#[from] filerelay_protocol::ProtocolError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a regular file: {}", .0.display())]
    NotAFile(PathBuf),
}

impl TransportError {
    /// Returns `true` when the request never got an HTTP response.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}
