//! Error types for the API client

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("failed to build HTTP client: {0}")]
    Config(String),

    #[error("transport failure for {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("JSON decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("token response has no access_token field")]
    MissingAccessToken,

    #[error("document has no included section")]
    MissingIncluded,

    #[error("cannot resolve relationship data shaped as {shape}")]
    UnsupportedRelationshipShape { shape: String },

    #[error("chunk size must be at least 1")]
    InvalidChunkSize,

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// Status code if this error came from a non-2xx response
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether this is a 401 response error
    pub fn is_unauthorized(&self) -> bool {
        self.status_code() == Some(401)
    }
}
