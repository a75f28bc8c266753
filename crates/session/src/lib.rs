//! Upload session controller.
//!
//! Drives one transfer from session creation to a terminal state and
//! exposes its progress as a [`TransferSnapshot`] stream. The transport
//! and the status subscription sit behind the [`Relay`] trait so the
//! controller can be exercised without a relay.
//!
//! # Lifecycle
//!
//! 1. **Create**: ask the relay for a session id
//! 2. **Subscribe**: open the status channel for that id
//! 3. **Upload**: post the file bytes, concurrently with step 4
//! 4. **Track**: fold status events into [`TransferState`] until
//!    `done` or `error`
//!
//! Cancelling (or dropping the [`UploadHandle`]) abandons the transfer
//! without marking it failed.

pub mod controller;
pub mod error;
pub mod registry;
pub mod relay;
pub mod state;

// Re-export primary types for convenience.
pub use controller::{TransferSnapshot, UploadController, UploadHandle};
pub use error::TransferError;
pub use registry::{InProgressCounter, Registration};
pub use relay::{HttpRelay, Relay, RelayFuture};
pub use state::{Effect, Input, TransferState, TransferStatus, reduce};
