//! Subscription handle for one session's status channel.

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use filerelay_protocol::SessionId;
use filerelay_protocol::constants::WS_MAX_MESSAGE_SIZE;

use crate::types::{CloseReason, SubscriptionItem};

/// Capacity of the queue between the read pump and the consumer.
const EVENT_BUFFER: usize = 256;

/// Live subscription to the transfer events of one session.
///
/// Owning the handle is owning the channel: [`close`](Self::close) or drop
/// it to stop listening. After `close` returns, [`next`](Self::next)
/// yields nothing, even if events were already queued.
pub struct Subscription {
    session_id: SessionId,
    events_rx: mpsc::Receiver<SubscriptionItem>,
    cancel: CancellationToken,
    closed: bool,
    _task: Option<tokio::task::JoinHandle<()>>,
}

impl Subscription {
    /// Starts listening on `url` (the session's status endpoint).
    ///
    /// Does not wait for the connection. A failed connect shows up as
    /// [`CloseReason::ConnectFailed`] on the first call to `next`.
    pub fn open(url: impl Into<String>, session_id: SessionId) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_channel(
            url.into(),
            session_id,
            events_tx,
            cancel.clone(),
        ));

        Self {
            session_id,
            events_rx,
            cancel,
            closed: false,
            _task: Some(task),
        }
    }

    /// Wraps an already running event source.
    ///
    /// The source closes the subscription by sending
    /// [`SubscriptionItem::Closed`] or by dropping its sender.
    pub fn from_receiver(session_id: SessionId, events_rx: mpsc::Receiver<SubscriptionItem>) -> Self {
        Self {
            session_id,
            events_rx,
            cancel: CancellationToken::new(),
            closed: false,
            _task: None,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Returns `true` once the subscription was closed, locally or by the
    /// channel.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Waits for the next item.
    ///
    /// A `Closed` item is delivered at most once and is always the last
    /// one; afterwards, and after [`close`](Self::close), this returns
    /// `None`. Cancel-safe.
    pub async fn next(&mut self) -> Option<SubscriptionItem> {
        if self.closed {
            return None;
        }
        let item = self
            .events_rx
            .recv()
            .await
            .unwrap_or(SubscriptionItem::Closed(CloseReason::Ended));
        if matches!(item, SubscriptionItem::Closed(_)) {
            self.shutdown();
        }
        Some(item)
    }

    /// Stops listening. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        debug!(session = %self.session_id, "closing subscription");
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.closed = true;
        self.cancel.cancel();
        self.events_rx.close();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // The background task sends the close frame on its own.
        self.cancel.cancel();
    }
}

/// Connects, then pumps the socket until it fails or is cancelled.
async fn run_channel(
    url: String,
    session_id: SessionId,
    events_tx: mpsc::Sender<SubscriptionItem>,
    cancel: CancellationToken,
) {
    let mut ws_config = tungstenite::protocol::WebSocketConfig::default();
    ws_config.max_message_size = Some(WS_MAX_MESSAGE_SIZE);
    ws_config.max_frame_size = Some(WS_MAX_MESSAGE_SIZE);

    let connect = tokio_tungstenite::connect_async_with_config(url.as_str(), Some(ws_config), false);
    let ws_stream = tokio::select! {
        _ = cancel.cancelled() => return,
        result = connect => match result {
            Ok((ws_stream, _)) => ws_stream,
            Err(e) => {
                warn!(session = %session_id, %url, "status channel connect failed: {e}");
                let _ = events_tx
                    .send(SubscriptionItem::Closed(CloseReason::ConnectFailed(e.to_string())))
                    .await;
                return;
            }
        },
    };
    debug!(session = %session_id, %url, "status channel connected");

    let (write, read) = ws_stream.split();
    let (pings_tx, pings_rx) = mpsc::channel(4);
    let control_handle = tokio::spawn(crate::pumps::write::control_pump(
        write,
        pings_rx,
        cancel.clone(),
    ));

    let reason =
        crate::pumps::read::read_pump(read, session_id, &events_tx, &pings_tx, &cancel).await;
    if let Some(reason) = reason {
        let _ = events_tx.send(SubscriptionItem::Closed(reason)).await;
    }

    cancel.cancel();
    let _ = control_handle.await;
    debug!(session = %session_id, "status channel finished");
}
