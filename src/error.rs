/// Result type for session client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Error types for session client operations
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    /// Input rejected before any network call was made
    #[error("Validation error: {0}")]
    Validation(String),

    /// The request never reached the backend or never came back
    #[error("Network error: {0}")]
    Network(String),

    /// The backend answered with a non-2xx status
    #[error("Backend error {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Backend {
        status: u16,
        message: Option<String>,
    },

    /// The backend answered 2xx but the body did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// An ingest is already in flight for this dialog
    #[error("An ingest is already in progress")]
    IngestInFlight,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// True for failures the backend is responsible for (bad status or bad body)
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, ClientError::Backend { .. } | ClientError::InvalidResponse(_))
    }

    /// Message supplied by the backend, if any
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            ClientError::Backend { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::InvalidResponse(err.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::InvalidResponse(err.to_string())
    }
}
