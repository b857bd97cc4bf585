/// Desktop output errors
use thiserror::Error;

/// Result type for output operations
pub type Result<T> = std::result::Result<T, OutputError>;

/// Errors raised while opening or driving the output device
#[derive(Debug, Error)]
pub enum OutputError {
    /// No default output device
    #[error("Audio device not found")]
    DeviceNotFound,

    /// Device configuration could not be queried
    #[error("Device error: {0}")]
    Device(String),

    /// Failed to build output stream
    #[error("Failed to build output stream: {0}")]
    StreamBuild(String),

    /// Failed to start or resume the stream
    #[error("Failed to play stream: {0}")]
    Play(String),

    /// Failed to pause the stream
    #[error("Failed to pause stream: {0}")]
    Pause(String),

    /// The thread owning the stream is gone
    #[error("Audio thread is not running")]
    ThreadGone,
}

impl From<cpal::BuildStreamError> for OutputError {
    fn from(err: cpal::BuildStreamError) -> Self {
        OutputError::StreamBuild(err.to_string())
    }
}

impl From<cpal::PlayStreamError> for OutputError {
    fn from(err: cpal::PlayStreamError) -> Self {
        OutputError::Play(err.to_string())
    }
}

impl From<cpal::PauseStreamError> for OutputError {
    fn from(err: cpal::PauseStreamError) -> Self {
        OutputError::Pause(err.to_string())
    }
}

impl From<cpal::DefaultStreamConfigError> for OutputError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        OutputError::Device(err.to_string())
    }
}
