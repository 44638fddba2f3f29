use thiserror::Error;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Malformed record in '{key}': {source}")]
    MalformedRecord {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl GateError {
    pub fn malformed(key: impl Into<String>, source: serde_json::Error) -> Self {
        Self::MalformedRecord {
            key: key.into(),
            source,
        }
    }

    /// Returns `true` when a sync step failed for reasons on the network or
    /// server side and the same step can be run again later.
    pub fn is_transient(&self) -> bool {
        match self {
            // transport failures: DNS, refused, reset, timeouts
            Self::Http(_) => true,
            Self::Remote { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, GateError>;
