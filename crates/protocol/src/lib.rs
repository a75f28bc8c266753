//! Wire types shared by the filerelay client crates.
//!
//! Covers the create-session request body, server-assigned session ids,
//! the transfer events pushed over the status channel, and the URLs of
//! the relay endpoints.

pub mod constants;
pub mod endpoints;
pub mod error;
pub mod events;
pub mod types;

// Re-export primary types for convenience.
pub use endpoints::Endpoints;
pub use error::ProtocolError;
pub use events::TransferEvent;
pub use types::{CreateSessionRequest, FileInfo, SessionId};
