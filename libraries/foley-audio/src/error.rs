/// Audio-specific errors
use thiserror::Error;

/// Result type alias using `AudioError`
pub type Result<T> = std::result::Result<T, AudioError>;

/// Audio error types
#[derive(Error, Debug)]
pub enum AudioError {
    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Container or codec not supported
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Decoding error
    #[error("Decode error: {0}")]
    Decode(String),

    /// Resampler setup or processing failed
    #[error("Resampling error: {0}")]
    Resample(String),

    /// Impulse response could not be used
    #[error("Impulse response error: {0}")]
    ImpulseResponse(String),

    /// Reverb bus index outside the pool
    #[error("No reverb bus {index} (pool has {count})")]
    UnknownReverb {
        /// Requested bus
        index: usize,
        /// Pool size
        count: usize,
    },

    /// The graph was closed and accepts no new voices
    #[error("Audio graph is closed")]
    GraphClosed,

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Symphonia error
    #[error("Symphonia error: {0}")]
    Symphonia(String),
}

impl AudioError {
    /// Create a decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }
}

impl From<symphonia::core::errors::Error> for AudioError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        match err {
            symphonia::core::errors::Error::Unsupported(what) => {
                Self::UnsupportedFormat(what.to_string())
            }
            symphonia::core::errors::Error::IoError(e) => Self::Io(e),
            other => Self::Symphonia(other.to_string()),
        }
    }
}

impl From<hound::Error> for AudioError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(e) => Self::Io(e),
            other => Self::ImpulseResponse(other.to_string()),
        }
    }
}
