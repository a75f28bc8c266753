//! The relay as seen by the controller.
//!
//! [`Relay`] bundles the two transport calls and the status subscription.
//! [`HttpRelay`] implements it over HTTP and WebSocket; tests substitute
//! their own.

use std::future::Future;
use std::pin::Pin;

use filerelay_protocol::{FileInfo, SessionId};
use filerelay_subscription::Subscription;
use filerelay_transport::{TransportClient, TransportError, UploadFile};

/// Boxed future returned by [`Relay`] calls.
pub type RelayFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, TransportError>> + Send + 'a>>;

/// Abstract connection to a relay.
pub trait Relay: Send + Sync {
    /// Asks for a new session for a file with the given metadata.
    fn create_session<'a>(&'a self, info: &'a FileInfo) -> RelayFuture<'a, SessionId>;

    /// Sends the file bytes to the session. Resolves when the relay answers
    /// the upload request, which may be after the transfer has ended.
    fn upload_bytes<'a>(&'a self, id: SessionId, file: &'a UploadFile) -> RelayFuture<'a, ()>;

    /// Opens the status channel of the session. Must not block.
    fn subscribe(&self, id: SessionId) -> Subscription;
}

/// [`Relay`] backed by the relay's HTTP API and status WebSocket.
#[derive(Clone)]
pub struct HttpRelay {
    transport: TransportClient,
}

impl HttpRelay {
    pub fn new(transport: TransportClient) -> Self {
        Self { transport }
    }
}

impl Relay for HttpRelay {
    fn create_session<'a>(&'a self, info: &'a FileInfo) -> RelayFuture<'a, SessionId> {
        Box::pin(self.transport.create_session(info))
    }

    fn upload_bytes<'a>(&'a self, id: SessionId, file: &'a UploadFile) -> RelayFuture<'a, ()> {
        Box::pin(self.transport.upload_bytes(id, file))
    }

    fn subscribe(&self, id: SessionId) -> Subscription {
        Subscription::open(self.transport.endpoints().status_url(id), id)
    }
}
