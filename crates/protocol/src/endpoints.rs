//! URLs of the relay endpoints, derived from one base URL.

use url::Url;

use crate::constants::{CREATE_PATH, DOWNLOAD_PATH, STATUS_PATH, UPLOAD_PATH};
use crate::error::ProtocolError;
use crate::types::SessionId;

/// Relay endpoint set.
///
/// The status channel uses `wss` when the base is `https` and `ws`
/// otherwise, on the same host and port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// `http(s)://host[:port]/prefix/`, always ending in `/`.
    http_base: String,
    /// Same as `http_base` with the WebSocket scheme.
    ws_base: String,
}

impl Endpoints {
    /// Builds the endpoint set from a relay base URL such as
    /// `https://relay.example.org` or `http://10.0.0.2:8080/transfer`.
    pub fn new(base: &str) -> Result<Self, ProtocolError> {
        let mut url = Url::parse(base)?;
        let ws_scheme = match url.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => return Err(ProtocolError::UnsupportedScheme(other.to_string())),
        };

        url.set_query(None);
        url.set_fragment(None);
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        let http_base = url.to_string();

        url.set_scheme(ws_scheme)
            .map_err(|()| ProtocolError::UnsupportedScheme(ws_scheme.to_string()))?;
        let ws_base = url.to_string();

        Ok(Self { http_base, ws_base })
    }

    /// Base URL the endpoints were built from, with a trailing slash.
    pub fn base(&self) -> &str {
        &self.http_base
    }

    /// `POST` target for session creation.
    pub fn create_url(&self) -> String {
        format!("{}{CREATE_PATH}", self.http_base)
    }

    /// Realtime status channel for one session.
    pub fn status_url(&self, id: SessionId) -> String {
        format!("{}{STATUS_PATH}?id={id}", self.ws_base)
    }

    /// `POST` target for the raw file bytes.
    pub fn upload_url(&self, id: SessionId) -> String {
        format!("{}{UPLOAD_PATH}/{id}", self.http_base)
    }

    /// Shareable link the receiver opens to download the file.
    pub fn download_url(&self, id: SessionId) -> String {
        format!("{}{DOWNLOAD_PATH}/{id}", self.http_base)
    }
}
