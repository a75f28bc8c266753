use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Identifier of one transfer session, assigned by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// Parses the plain-text body returned by the create endpoint.
    ///
    /// Surrounding whitespace (a trailing newline, typically) is ignored.
    pub fn parse_response(body: &str) -> Result<Self, ProtocolError> {
        body.parse()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| ProtocolError::InvalidSessionId(s.to_string()))
    }
}

/// Metadata declared for the file when a session is created.
///
/// The client trusts local metadata: the relay uses `size` to know when
/// the transfer is complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
}

/// Body of `POST /api/create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub size: u64,
}

impl From<&FileInfo> for CreateSessionRequest {
    fn from(info: &FileInfo) -> Self {
        Self {
            name: info.name.clone(),
            mime_type: info.mime_type.clone(),
            size: info.size,
        }
    }
}
