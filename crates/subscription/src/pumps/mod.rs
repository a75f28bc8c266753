//! Background tasks driving one status WebSocket.

pub(crate) mod read;
pub(crate) mod write;
