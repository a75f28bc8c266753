//! Transfer failure taxonomy.
//!
//! The display text of each variant is the message shown to the user.

/// Why a transfer ended in the error state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    /// The create-session call failed.
    #[error("Failed to create upload session.")]
    SessionCreation,

    /// The upload-bytes call failed.
    #[error("Failed to upload file.")]
    UploadDispatch,

    /// The relay reported an `error` event.
    #[error("File transfer failed.")]
    RemoteTransfer,

    /// The relay reported a `timeout` event.
    #[error("The receiver did not connect in time.")]
    RemoteTimeout,

    /// The status channel went away before a terminal event.
    #[error("Lost connection to the transfer server.")]
    ChannelFault,
}
