//! Control pump, the only writer of the status socket.
//!
//! The client never sends data on the status channel. It answers pings
//! and, once tracking stops, sends a normal close frame.

use futures_util::SinkExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Bytes, Message, Utf8Bytes};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

const CLOSE_REASON: &str = "transfer tracking finished";

/// Answers pings with pongs until cancelled, then closes the socket.
///
/// When several pings are queued only the newest one is answered.
pub(crate) async fn control_pump<S>(
    mut write: S,
    mut pings_rx: mpsc::Receiver<Bytes>,
    cancel: CancellationToken,
) where
    S: SinkExt<Message, Error = tungstenite::Error> + Unpin,
{
    loop {
        let payload = tokio::select! {
            _ = cancel.cancelled() => break,
            ping = pings_rx.recv() => match ping {
                Some(payload) => latest(payload, &mut pings_rx),
                None => break,
            },
        };

        trace!("answering ping");
        if let Err(e) = write.send(Message::Pong(payload)).await {
            debug!("status channel write error: {e}");
            return;
        }
    }

    let frame = CloseFrame {
        code: CloseCode::Normal,
        reason: Utf8Bytes::from_static(CLOSE_REASON),
    };
    let _ = write.send(Message::Close(Some(frame))).await;
}

/// Skips to the most recent queued ping payload.
fn latest(mut payload: Bytes, pings_rx: &mut mpsc::Receiver<Bytes>) -> Bytes {
    while let Ok(newer) = pings_rx.try_recv() {
        payload = newer;
    }
    payload
}
