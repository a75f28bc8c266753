//! Transport client for the relay's HTTP endpoints.
//!
//! Two calls, no state: create a session for a file, and post the raw
//! file bytes to that session. Transfer progress is never observed here;
//! it arrives over the status channel.

pub mod client;
pub mod error;
pub mod file;

pub use client::TransportClient;
pub use error::TransportError;
pub use file::{UploadFile, UploadSource, detect_mime_type, resolve_name};
