/// Errors produced while decoding relay messages or building endpoints.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{event} event is missing field `{field}`")]
    MissingField {
        event: &'static str,
        field: &'static str,
    },

    #[error("{event} event has invalid `{field}`: {value}")]
    InvalidField {
        event: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("invalid session id: {0:?}")]
    InvalidSessionId(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),
}
