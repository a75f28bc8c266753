//! Transfer events pushed by the relay over the status channel.

use serde::Deserialize;

use crate::error::ProtocolError;

/// A server-pushed notification about one session.
///
/// Decoding is strict for the known tags. Tags this client does not know
/// are kept as [`TransferEvent::Unknown`] so newer relays do not break it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    /// Both ends are connected and the relay started copying bytes.
    Start,
    /// Number of bytes the relay has forwarded so far.
    Progress { done: u64 },
    /// The whole file reached the receiver.
    Done,
    /// The relay aborted the transfer.
    Error,
    /// The receiver did not connect within the relay's window.
    Timeout,
    /// A tag this client does not understand.
    Unknown(String),
}

/// Untyped wire shape: `{"type": "...", "done": N, ...}`.
///
/// `done` is only checked for `progress`; other tags ignore it.
#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    done: Option<serde_json::Value>,
}

impl TransferEvent {
    /// Decodes one text message from the status channel.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let raw: RawEvent = serde_json::from_str(text)?;
        let event = match raw.kind.as_str() {
            "start" => Self::Start,
            "progress" => {
                let done = match raw.done {
                    None | Some(serde_json::Value::Null) => {
                        return Err(ProtocolError::MissingField {
                            event: "progress",
                            field: "done",
                        });
                    }
                    Some(value) => value.as_u64().ok_or_else(|| ProtocolError::InvalidField {
                        event: "progress",
                        field: "done",
                        value: value.to_string(),
                    })?,
                };
                Self::Progress { done }
            }
            "done" => Self::Done,
            "error" => Self::Error,
            "timeout" => Self::Timeout,
            _ => Self::Unknown(raw.kind),
        };
        Ok(event)
    }

    /// Encodes the event the way the relay sends it.
    pub fn encode(&self) -> String {
        let value = match self {
            Self::Progress { done } => serde_json::json!({"type": "progress", "done": done}),
            other => serde_json::json!({"type": other.kind()}),
        };
        value.to_string()
    }

    /// Wire tag of the event.
    pub fn kind(&self) -> &str {
        match self {
            Self::Start => "start",
            Self::Progress { .. } => "progress",
            Self::Done => "done",
            Self::Error => "error",
            Self::Timeout => "timeout",
            Self::Unknown(kind) => kind,
        }
    }
}
