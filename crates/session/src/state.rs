//! Transfer state and the pure reducer that advances it.
//!
//! The controller owns one [`TransferState`] and feeds every input through
//! [`reduce`]. The reducer never touches the counter itself; it returns an
//! [`Effect`] the caller applies to its registration.

use std::fmt;

use filerelay_protocol::TransferEvent;

use crate::error::TransferError;

/// Where a transfer stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TransferState {
    /// Session requested or created; the receiver has not started yet.
    #[default]
    Waiting,
    /// Bytes are flowing. The count never goes down.
    Running { bytes_transferred: u64 },
    /// Finished; the count equals the declared size.
    Done { bytes_transferred: u64 },
    /// Failed with the first error that occurred.
    Error { cause: TransferError },
}

/// Coarse projection of [`TransferState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Waiting,
    Running,
    Done,
    Error,
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Waiting => "waiting",
            Self::Running => "running",
            Self::Done => "done",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

impl TransferState {
    pub fn status(&self) -> TransferStatus {
        match self {
            Self::Waiting => TransferStatus::Waiting,
            Self::Running { .. } => TransferStatus::Running,
            Self::Done { .. } => TransferStatus::Done,
            Self::Error { .. } => TransferStatus::Error,
        }
    }

    /// Bytes moved so far; `None` before the transfer started or after it
    /// failed.
    pub fn bytes_transferred(&self) -> Option<u64> {
        match self {
            Self::Running { bytes_transferred } | Self::Done { bytes_transferred } => {
                Some(*bytes_transferred)
            }
            Self::Waiting | Self::Error { .. } => None,
        }
    }

    pub fn error(&self) -> Option<TransferError> {
        match self {
            Self::Error { cause } => Some(*cause),
            _ => None,
        }
    }

    /// User-facing error text, present only in the error state.
    pub fn error_message(&self) -> Option<String> {
        self.error().map(|cause| cause.to_string())
    }

    /// `Done` and `Error` accept no further input.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}

/// Something that happened to the transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// An event pushed by the relay.
    Remote(TransferEvent),
    /// A local failure: create, upload, or the status channel.
    Failed(TransferError),
}

/// Side effect the caller applies after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    /// Count this transfer as in progress.
    Register,
    /// Stop counting this transfer as in progress.
    Release,
}

/// Computes the next state for `input`.
///
/// `declared_size` is what `Done` reports, whatever the last progress
/// event said. Terminal states absorb every input without effect.
pub fn reduce(state: &TransferState, input: &Input, declared_size: u64) -> (TransferState, Effect) {
    if state.is_terminal() {
        return (state.clone(), Effect::None);
    }

    match input {
        Input::Remote(TransferEvent::Start) => match state {
            // A repeated start does not rewind the count.
            TransferState::Running { .. } => (state.clone(), Effect::Register),
            _ => (
                TransferState::Running {
                    bytes_transferred: 0,
                },
                Effect::Register,
            ),
        },
        Input::Remote(TransferEvent::Progress { done }) => match state {
            TransferState::Running { bytes_transferred } => (
                TransferState::Running {
                    bytes_transferred: (*bytes_transferred).max(*done),
                },
                Effect::None,
            ),
            _ => (state.clone(), Effect::None),
        },
        Input::Remote(TransferEvent::Done) => (
            TransferState::Done {
                bytes_transferred: declared_size,
            },
            Effect::Release,
        ),
        Input::Remote(TransferEvent::Error) => fail(TransferError::RemoteTransfer),
        Input::Remote(TransferEvent::Timeout) => fail(TransferError::RemoteTimeout),
        Input::Remote(TransferEvent::Unknown(_)) => (state.clone(), Effect::None),
        Input::Failed(cause) => fail(*cause),
    }
}

fn fail(cause: TransferError) -> (TransferState, Effect) {
    (TransferState::Error { cause }, Effect::Release)
}
