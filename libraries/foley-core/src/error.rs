/// Core error types for Foley
use crate::types::{GroupId, Variant};
use thiserror::Error;

/// Result type alias using `FoleyError`
pub type Result<T> = std::result::Result<T, FoleyError>;

/// Core error type for Foley
///
/// These are contract violations detected before anything reaches the audio
/// engine: malformed requests, out-of-range descriptor values and bad config.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FoleyError {
    /// A non-sequence request arrived without any effects
    #[error("{0} playback requires at least one effect")]
    EmptyEffects(Variant),

    /// Sequence request without a sequence plan
    #[error("Sequence playback requires a sequence plan")]
    MissingSequence,

    /// Effect volume outside of 0..=500 percent
    #[error("Invalid effect volume: {0}% (must be between 0 and 500)")]
    InvalidVolume(u32),

    /// Source reference could not be parsed
    #[error("Invalid source reference: {0}")]
    InvalidSource(String),

    /// Group not known to the catalog
    #[error("Group not found: {0}")]
    GroupNotFound(GroupId),

    /// Configuration loading or validation failure
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl FoleyError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid source error
    pub fn invalid_source(msg: impl Into<String>) -> Self {
        Self::InvalidSource(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

impl From<config::ConfigError> for FoleyError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
