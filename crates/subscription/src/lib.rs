//! Realtime subscription to the transfer events of one session.
//!
//! [`Subscription::open`] returns immediately; the WebSocket connection
//! is made in the background and events are pulled with
//! [`Subscription::next`] in arrival order. A channel failure is reported
//! once as [`SubscriptionItem::Closed`] and never turned into a transfer
//! event.

mod pumps;
pub mod subscription;
pub mod types;

pub use subscription::Subscription;
pub use types::{CloseReason, SubscriptionItem};
