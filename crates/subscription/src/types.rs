//! Items delivered by a subscription.

use filerelay_protocol::TransferEvent;

/// One item pulled from a [`Subscription`](crate::Subscription).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionItem {
    /// A decoded transfer event.
    Event(TransferEvent),
    /// The channel is gone. Always the last item.
    Closed(CloseReason),
}

/// Why a subscription closed without being asked to.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CloseReason {
    #[error("connection failed: {0}")]
    ConnectFailed(String),

    #[error("closed by relay")]
    Remote,

    #[error("stream ended")]
    Ended,

    #[error("read error: {0}")]
    ReadError(String),

    #[error("malformed event: {0}")]
    Malformed(String),
}
