//! Effect descriptors handed to the engine by the catalog

use super::{EffectId, SourceRef};
use crate::error::{FoleyError, Result};
use serde::{Deserialize, Serialize};

/// Upper bound of an effect's volume percentage
pub const MAX_EFFECT_VOLUME: u16 = 500;

/// Effect volume as a percentage of the source level (100 = unmodified)
///
/// Values above [`MAX_EFFECT_VOLUME`] cannot be constructed, including through
/// deserialization, so an out-of-range volume never reaches a gain stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u16")]
pub struct EffectVolume(u16);

impl EffectVolume {
    /// Unity level
    pub const UNITY: Self = Self(100);

    /// Create a volume, rejecting percentages above 500
    pub fn new(percent: u32) -> Result<Self> {
        if percent > u32::from(MAX_EFFECT_VOLUME) {
            return Err(FoleyError::InvalidVolume(percent));
        }
        Ok(Self(percent as u16))
    }

    /// Percentage value
    pub fn percent(self) -> u16 {
        self.0
    }

    /// Linear gain multiplier (0.0 ..= 5.0)
    pub fn gain(self) -> f32 {
        f32::from(self.0) / 100.0
    }
}

impl Default for EffectVolume {
    fn default() -> Self {
        Self::UNITY
    }
}

impl TryFrom<u32> for EffectVolume {
    type Error = FoleyError;

    fn try_from(value: u32) -> Result<Self> {
        Self::new(value)
    }
}

impl From<EffectVolume> for u16 {
    fn from(volume: EffectVolume) -> Self {
        volume.0
    }
}

/// A resolved, playable effect
///
/// Immutable once handed to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectDescriptor {
    /// Effect identifier (reported back through `loaded_effect_id`)
    pub id: EffectId,

    /// Encoded audio location
    pub source: SourceRef,

    /// Container/extension hint for the decoder probe (e.g. "ogg")
    #[serde(default)]
    pub format: Option<String>,

    /// Volume percentage (0..=500)
    #[serde(default)]
    pub volume: EffectVolume,

    /// Prefer the streamed backend (large files)
    #[serde(default)]
    pub streaming: bool,
}

impl EffectDescriptor {
    /// Create a descriptor at unity volume using the buffered backend
    pub fn new(id: impl Into<EffectId>, source: SourceRef) -> Self {
        Self {
            id: id.into(),
            source,
            format: None,
            volume: EffectVolume::UNITY,
            streaming: false,
        }
    }

    /// Set the format hint
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into().to_ascii_lowercase());
        self
    }

    /// Set the volume percentage
    pub fn with_volume(mut self, percent: u32) -> Result<Self> {
        self.volume = EffectVolume::new(percent)?;
        Ok(self)
    }

    /// Select the streamed backend
    #[must_use]
    pub fn streamed(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Decoder hint: explicit format first, then whatever the source implies
    pub fn format_hint(&self) -> Option<String> {
        self.format.clone().or_else(|| self.source.extension_hint())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_above_limit_is_rejected() {
        assert_eq!(EffectVolume::new(600), Err(FoleyError::InvalidVolume(600)));
        assert!(EffectVolume::new(500).is_ok());
    }

    #[test]
    fn volume_gain_scales_percent() {
        assert_eq!(EffectVolume::new(0).unwrap().gain(), 0.0);
        assert_eq!(EffectVolume::UNITY.gain(), 1.0);
        assert_eq!(EffectVolume::new(500).unwrap().gain(), 5.0);
    }

    #[test]
    fn deserializing_out_of_range_volume_fails() {
        let json = r#"{"id":"boom","source":"/sfx/boom.wav","volume":600}"#;
        let parsed: std::result::Result<EffectDescriptor, _> = serde_json::from_str(json);
        assert!(parsed.is_err());
    }

    #[test]
    fn descriptor_defaults_when_fields_missing() {
        let json = r#"{"id":"boom","source":"/sfx/boom.wav"}"#;
        let descriptor: EffectDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(descriptor.volume, EffectVolume::UNITY);
        assert!(!descriptor.streaming);
        assert_eq!(descriptor.format_hint().as_deref(), Some("wav"));
    }

    #[test]
    fn explicit_format_wins_over_extension() {
        let descriptor =
            EffectDescriptor::new("x", SourceRef::path("/sfx/x.bin")).with_format("MP3");
        assert_eq!(descriptor.format_hint().as_deref(), Some("mp3"));
    }
}
