//! Relay HTTP client.
//!
//! Async client using `reqwest`. Every call is a single attempt; the
//! caller decides what a failure means.

use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use tokio_util::io::ReaderStream;
use tracing::debug;

use filerelay_protocol::constants::OCTET_STREAM;
use filerelay_protocol::{CreateSessionRequest, Endpoints, FileInfo, SessionId};

use crate::error::TransportError;
use crate::file::{UploadFile, UploadSource};

/// Client for the create and upload endpoints of one relay.
#[derive(Clone)]
pub struct TransportClient {
    http: reqwest::Client,
    endpoints: Endpoints,
}

impl TransportClient {
    /// Creates a client for the given relay.
    pub fn new(endpoints: Endpoints) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("filerelay/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, endpoints })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Asks the relay for a new session for a file with the given metadata.
    ///
    /// The relay answers with the session id as a plain-text integer.
    pub async fn create_session(&self, info: &FileInfo) -> Result<SessionId, TransportError> {
        let url = self.endpoints.create_url();
        let body = CreateSessionRequest::from(info);
        debug!(%url, name = %info.name, size = info.size, "creating session");

        let resp = self.http.post(&url).json(&body).send().await?;
        let text = check_status(resp).await?.text().await?;
        let id = SessionId::parse_response(&text)?;

        debug!(session = %id, "session created");
        Ok(id)
    }

    /// Posts the raw file bytes to the session's upload endpoint.
    ///
    /// The relay holds this request open until the transfer ends, so the
    /// returned future resolves late; its result says nothing about
    /// progress.
    pub async fn upload_bytes(
        &self,
        id: SessionId,
        file: &UploadFile,
    ) -> Result<(), TransportError> {
        let url = self.endpoints.upload_url(id);
        let request = self.http.post(&url).header(CONTENT_TYPE, OCTET_STREAM);
        let request = match file.source() {
            UploadSource::Path(path) => {
                let handle = tokio::fs::File::open(path).await?;
                // Streamed bodies have no known length; declare it so the
                // relay does not need chunked decoding.
                request
                    .header(CONTENT_LENGTH, file.size())
                    .body(reqwest::Body::wrap_stream(ReaderStream::new(handle)))
            }
            UploadSource::Memory(data) => request.body(data.clone()),
        };
        debug!(session = %id, %url, size = file.size(), "uploading file");

        let resp = request.send().await?;
        check_status(resp).await?;

        debug!(session = %id, "upload request finished");
        Ok(())
    }
}

/// Accepts 2xx and 3xx responses; anything else becomes [`TransportError::Http`].
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = resp.status();
    if status.is_success() || status.is_redirection() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(TransportError::Http {
        status: status.as_u16(),
        body,
    })
}
