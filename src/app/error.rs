use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifierError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{url} responded with status {status}: {body}")]
    Status { status: u16, url: String, body: String },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("{operation} gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        last: Box<NotifierError>,
    },

    #[error("{0}")]
    Other(String),
}

impl NotifierError {
    /// Whether this failure carries the platform's "service unavailable"
    /// signature and may be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status == 503,
            Self::Auth(message) | Self::Other(message) => {
                message.contains("503") || message.contains("Service Unavailable")
            }
            _ => false,
        }
    }

    /// Whether retries for a transient failure ran out.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::RetriesExhausted { .. })
    }
}

pub type Result<T> = std::result::Result<T, NotifierError>;
