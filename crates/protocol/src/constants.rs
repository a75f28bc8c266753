/// Path of the create-session endpoint, relative to the relay base URL.
pub const CREATE_PATH: &str = "api/create";

/// Path of the realtime status channel, relative to the relay base URL.
pub const STATUS_PATH: &str = "api/status";

/// Path prefix of the upload endpoint (`u/<id>`).
pub const UPLOAD_PATH: &str = "u";

/// Path prefix of the shareable download link (`d/<id>`).
pub const DOWNLOAD_PATH: &str = "d";

/// MIME type used when the file type cannot be detected, and the
/// content type of the raw upload body.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Relay base URL used when nothing else is configured.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";

/// Maximum size of a single status message in bytes.
///
/// Status events are tiny JSON objects; anything larger is rejected by
/// the WebSocket layer before decoding.
pub const WS_MAX_MESSAGE_SIZE: usize = 64 * 1024;
