//! Error types for the playback engine

use foley_audio::AudioError;
use foley_core::{ElementId, FoleyError};
use std::time::Duration;
use thiserror::Error;

/// Playback errors
///
/// Runtime failures never cross a container boundary as `Err`; they are
/// reported through `Error` events and followed by `Stopped`. Only
/// construction-time problems are returned to the caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlaybackError {
    /// Source could not be opened or decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Source did not become ready in time
    #[error("Load timed out after {0:?}")]
    LoadTimeout(Duration),

    /// Failure while starting or rendering a voice
    #[error("Playback error: {0}")]
    Playback(String),

    /// Sequence element did not load in time and was left out
    #[error("Sequence element {element} not loaded after {timeout:?}")]
    ScheduleTimeout {
        /// Dropped element
        element: ElementId,
        /// Bound that elapsed
        timeout: Duration,
    },

    /// Request rejected by the factory
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] FoleyError),

    /// Engine created outside of a Tokio runtime
    #[error("No Tokio runtime available")]
    RuntimeUnavailable,
}

impl PlaybackError {
    /// Create a playback error
    pub fn playback(msg: impl Into<String>) -> Self {
        Self::Playback(msg.into())
    }
}

impl From<AudioError> for PlaybackError {
    fn from(err: AudioError) -> Self {
        match &err {
            AudioError::FileNotFound(_)
            | AudioError::UnsupportedFormat(_)
            | AudioError::Decode(_)
            | AudioError::Symphonia(_)
            | AudioError::Resample(_)
            | AudioError::Io(_) => Self::Decode(err.to_string()),
            _ => Self::Playback(err.to_string()),
        }
    }
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
