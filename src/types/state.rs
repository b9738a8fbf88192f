//! Resolution progress and failure kinds.

use super::resource::Resource;

/// Why a resolution attempt failed.
///
/// Only the kind and a detail string are carried; rendering is left to the
/// caller (see [`user_message()`](Self::user_message) for a default).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("metadata fetch failed: {0}")]
    MetadataFetchFailed(String),

    #[error("invalid URL: {0:?}")]
    InvalidUrl(String),

    #[error("download failed")]
    DownloadFailed,

    #[error("network error: {0}")]
    Network(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl LoadError {
    /// Short message suitable for showing to an end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            LoadError::MetadataFetchFailed(_) => "Could not fetch image information",
            LoadError::InvalidUrl(_) => "Invalid image URL",
            LoadError::DownloadFailed => "Could not download image",
            LoadError::Network(_) => "A network error occurred",
            LoadError::Unknown(_) => "Could not load image",
        }
    }
}

/// State of a single resolution.
///
/// Transitions are monotonic: `Idle → Loading → Success | Failure`.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum LoadingState {
    #[default]
    Idle,
    /// In progress; `progress` is in `0.0..=1.0` when known.
    Loading { progress: Option<f64> },
    Success(Resource),
    Failure(LoadError),
}

impl LoadingState {
    /// Whether this is a terminal state.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Success(_) | Self::Failure(_))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    pub fn resource(&self) -> Option<&Resource> {
        match self {
            Self::Success(resource) => Some(resource),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&LoadError> {
        match self {
            Self::Failure(error) => Some(error),
            _ => None,
        }
    }
}
