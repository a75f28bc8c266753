//! WebSocket read pump: decodes status messages into transfer events.

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Bytes};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use filerelay_protocol::{SessionId, TransferEvent};

use crate::types::{CloseReason, SubscriptionItem};

/// Reads the status socket until it fails, closes, or is cancelled.
///
/// Returns the reason the channel went away, or `None` when the pump was
/// stopped locally (cancellation, or the consumer dropped its receiver).
pub(crate) async fn read_pump<S>(
    mut read: S,
    session_id: SessionId,
    events_tx: &mpsc::Sender<SubscriptionItem>,
    pings_tx: &mpsc::Sender<Bytes>,
    cancel: &CancellationToken,
) -> Option<CloseReason>
where
    S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    loop {
        let msg = tokio::select! {
            _ = cancel.cancelled() => return None,
            msg = read.next() => msg,
        };

        match msg {
            Some(Ok(tungstenite::Message::Text(text))) => {
                let event = match TransferEvent::decode(&text) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(session = %session_id, error = %e, "undecodable status message");
                        return Some(CloseReason::Malformed(e.to_string()));
                    }
                };
                trace!(session = %session_id, kind = event.kind(), "status event");

                // Cancellation wins over a full queue.
                tokio::select! {
                    _ = cancel.cancelled() => return None,
                    sent = events_tx.send(SubscriptionItem::Event(event)) => {
                        if sent.is_err() {
                            return None;
                        }
                    }
                }
            }
            Some(Ok(tungstenite::Message::Ping(data))) => {
                trace!("received ping");
                // A full queue already holds a ping that will be answered.
                let _ = pings_tx.try_send(data);
            }
            Some(Ok(tungstenite::Message::Close(frame))) => {
                debug!(session = %session_id, ?frame, "relay closed status channel");
                return Some(CloseReason::Remote);
            }
            Some(Ok(_)) => {} // Binary and Pong carry nothing for us.
            Some(Err(e)) => {
                warn!(session = %session_id, "status channel read error: {e}");
                return Some(CloseReason::ReadError(e.to_string()));
            }
            None => {
                debug!(session = %session_id, "status stream ended");
                return Some(CloseReason::Ended);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    type WsItem = Result<tungstenite::Message, tungstenite::Error>;

    fn text(s: &str) -> WsItem {
        Ok(tungstenite::Message::Text(s.to_string().into()))
    }

    async fn run(
        items: Vec<WsItem>,
    ) -> (
        Option<CloseReason>,
        Vec<SubscriptionItem>,
        Vec<Bytes>,
    ) {
        let (events_tx, mut events_rx) = mpsc::channel(64);
        let (pings_tx, mut pings_rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();

        let reason = read_pump(
            stream::iter(items),
            SessionId::new(1),
            &events_tx,
            &pings_tx,
            &cancel,
        )
        .await;

        drop(events_tx);
        drop(pings_tx);
        let mut events = Vec::new();
        while let Some(item) = events_rx.recv().await {
            events.push(item);
        }
        let mut written = Vec::new();
        while let Some(msg) = pings_rx.recv().await {
            written.push(msg);
        }
        (reason, events, written)
    }

    #[tokio::test]
    async fn decodes_events_in_order() {
        let (reason, events, _) = run(vec![
            text(r#"{"type":"start"}"#),
            text(r#"{"type":"progress","done":10,"size":20}"#),
            text(r#"{"type":"done"}"#),
        ])
        .await;

        assert_eq!(reason, Some(CloseReason::Ended));
        assert_eq!(
            events,
            vec![
                SubscriptionItem::Event(TransferEvent::Start),
                SubscriptionItem::Event(TransferEvent::Progress { done: 10 }),
                SubscriptionItem::Event(TransferEvent::Done),
            ]
        );
    }

    #[tokio::test]
    async fn malformed_message_is_fatal() {
        let (reason, events, _) = run(vec![
            text(r#"{"type":"start"}"#),
            text("not json"),
            text(r#"{"type":"done"}"#),
        ])
        .await;

        assert!(matches!(reason, Some(CloseReason::Malformed(_))));
        // Nothing after the bad message is delivered.
        assert_eq!(events, vec![SubscriptionItem::Event(TransferEvent::Start)]);
    }

    #[tokio::test]
    async fn unknown_tags_pass_through() {
        let (_, events, _) = run(vec![text(r#"{"type":"resumed"}"#)]).await;
        assert_eq!(
            events,
            vec![SubscriptionItem::Event(TransferEvent::Unknown(
                "resumed".into()
            ))]
        );
    }

    #[tokio::test]
    async fn ping_is_handed_to_control_pump() {
        let (_, events, written) =
            run(vec![Ok(tungstenite::Message::Ping(vec![7u8].into()))]).await;
        assert!(events.is_empty());
        assert_eq!(written.len(), 1);
        assert_eq!(&written[0][..], [7u8]);
    }

    #[tokio::test]
    async fn close_frame_ends_with_remote_reason() {
        let (reason, events, _) = run(vec![
            Ok(tungstenite::Message::Close(None)),
            text(r#"{"type":"start"}"#),
        ])
        .await;
        assert_eq!(reason, Some(CloseReason::Remote));
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn read_error_is_reported() {
        let (reason, _, _) = run(vec![Err(tungstenite::Error::ConnectionClosed)]).await;
        assert!(matches!(reason, Some(CloseReason::ReadError(_))));
    }

    #[tokio::test]
    async fn cancel_stops_pump_silently() {
        let (events_tx, _events_rx) = mpsc::channel(4);
        let (pings_tx, _pings_rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let pending = stream::pending::<WsItem>();
        let reason = read_pump(pending, SessionId::new(1), &events_tx, &pings_tx, &cancel).await;
        assert_eq!(reason, None);
    }
}
