//! Huginn error types

/// Huginn error types
#[derive(Debug, thiserror::Error)]
pub enum HuginnError {
    // Fetcher/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image payload could not be decoded or re-encoded.
    #[error("image decode error: {0}")]
    Decode(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The service was built without a metadata or byte fetcher.
    #[error("no fetcher configured")]
    NoFetcher,
}

impl From<reqwest::Error> for HuginnError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => HuginnError::Api {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => HuginnError::Http(err.to_string()),
        }
    }
}

impl From<image::ImageError> for HuginnError {
    fn from(err: image::ImageError) -> Self {
        HuginnError::Decode(err.to_string())
    }
}

/// Result type alias for Huginn operations
pub type Result<T> = std::result::Result<T, HuginnError>;
