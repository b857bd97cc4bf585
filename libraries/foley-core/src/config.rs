//! Engine configuration
//!
//! Loaded from an optional TOML file, then overridden by `FOLEY_`-prefixed
//! environment variables (e.g. `FOLEY_LOAD_TIMEOUT_MS=8000`).

use crate::error::{FoleyError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Shortest accepted soundtrack crossfade
pub const MIN_CROSSFADE_MS: u64 = 2_500;

/// Longest accepted soundtrack crossfade
pub const MAX_CROSSFADE_MS: u64 = 12_500;

/// Timings, routing pool and output format of the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Graph sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Bound on waiting for a node to become ready before playing
    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,

    /// Bound on waiting for a duration before falling back to zero
    #[serde(default = "default_duration_timeout_ms")]
    pub duration_timeout_ms: u64,

    /// Bound on waiting for a sequence element to load
    #[serde(default = "default_sequence_load_timeout_ms")]
    pub sequence_load_timeout_ms: u64,

    /// Looping fade-in and fade-out length
    #[serde(default = "default_looping_fade_ms")]
    pub looping_fade_ms: u64,

    /// Default soundtrack crossfade when a request has none
    #[serde(default = "default_soundtrack_crossfade_ms")]
    pub soundtrack_crossfade_ms: u64,

    /// Soundtrack fade-out on stop
    #[serde(default = "default_soundtrack_stop_fade_ms")]
    pub soundtrack_stop_fade_ms: u64,

    /// Rapid playback-rate jitter (0.2 = ±20%)
    #[serde(default = "default_rapid_rate_variance")]
    pub rapid_rate_variance: f32,

    /// Rapid stereo pan jitter
    #[serde(default = "default_rapid_pan_variance")]
    pub rapid_pan_variance: f32,

    /// Number of synthesized reverb buses when no impulse responses are given
    #[serde(default = "default_reverb_count")]
    pub reverb_count: usize,

    /// Length of synthesized impulse responses
    #[serde(default = "default_reverb_seconds")]
    pub reverb_seconds: f32,

    /// WAV impulse responses, one reverb bus each
    #[serde(default)]
    pub impulse_responses: Vec<PathBuf>,
}

fn default_sample_rate() -> u32 {
    48_000
}

fn default_load_timeout_ms() -> u64 {
    5_000
}

fn default_duration_timeout_ms() -> u64 {
    1_000
}

fn default_sequence_load_timeout_ms() -> u64 {
    15_000
}

fn default_looping_fade_ms() -> u64 {
    200
}

fn default_soundtrack_crossfade_ms() -> u64 {
    MIN_CROSSFADE_MS
}

fn default_soundtrack_stop_fade_ms() -> u64 {
    2_500
}

fn default_rapid_rate_variance() -> f32 {
    0.2
}

fn default_rapid_pan_variance() -> f32 {
    0.2
}

fn default_reverb_count() -> usize {
    3
}

fn default_reverb_seconds() -> f32 {
    2.0
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            load_timeout_ms: default_load_timeout_ms(),
            duration_timeout_ms: default_duration_timeout_ms(),
            sequence_load_timeout_ms: default_sequence_load_timeout_ms(),
            looping_fade_ms: default_looping_fade_ms(),
            soundtrack_crossfade_ms: default_soundtrack_crossfade_ms(),
            soundtrack_stop_fade_ms: default_soundtrack_stop_fade_ms(),
            rapid_rate_variance: default_rapid_rate_variance(),
            rapid_pan_variance: default_rapid_pan_variance(),
            reverb_count: default_reverb_count(),
            reverb_seconds: default_reverb_seconds(),
            impulse_responses: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = ::config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(FoleyError::config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            settings = settings.add_source(::config::File::from(path));
        }

        // Field names contain underscores, so nesting uses a double underscore
        settings = settings.add_source(
            ::config::Environment::with_prefix("FOLEY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = settings.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(8_000..=192_000).contains(&self.sample_rate) {
            return Err(FoleyError::config(format!(
                "sample_rate {} out of range (8000..=192000)",
                self.sample_rate
            )));
        }

        for (name, value) in [
            ("load_timeout_ms", self.load_timeout_ms),
            ("duration_timeout_ms", self.duration_timeout_ms),
            ("sequence_load_timeout_ms", self.sequence_load_timeout_ms),
        ] {
            if value == 0 {
                return Err(FoleyError::config(format!("{} must be positive", name)));
            }
        }

        if !(MIN_CROSSFADE_MS..=MAX_CROSSFADE_MS).contains(&self.soundtrack_crossfade_ms) {
            return Err(FoleyError::config(format!(
                "soundtrack_crossfade_ms {} out of range ({}..={})",
                self.soundtrack_crossfade_ms, MIN_CROSSFADE_MS, MAX_CROSSFADE_MS
            )));
        }

        if !(0.0..1.0).contains(&self.rapid_rate_variance) {
            return Err(FoleyError::config(
                "rapid_rate_variance must be in [0, 1)",
            ));
        }

        if !(0.0..=1.0).contains(&self.rapid_pan_variance) {
            return Err(FoleyError::config("rapid_pan_variance must be in [0, 1]"));
        }

        if self.impulse_responses.is_empty() {
            if self.reverb_count == 0 {
                return Err(FoleyError::config(
                    "reverb_count must be at least 1 without impulse_responses",
                ));
            }
            if !(self.reverb_seconds > 0.0 && self.reverb_seconds <= 10.0) {
                return Err(FoleyError::config("reverb_seconds must be in (0, 10]"));
            }
        }

        Ok(())
    }

    /// Ready wait before play
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    /// Duration wait before falling back to zero
    pub fn duration_timeout(&self) -> Duration {
        Duration::from_millis(self.duration_timeout_ms)
    }

    /// Sequence element load wait
    pub fn sequence_load_timeout(&self) -> Duration {
        Duration::from_millis(self.sequence_load_timeout_ms)
    }

    /// Looping fade length
    pub fn looping_fade(&self) -> Duration {
        Duration::from_millis(self.looping_fade_ms)
    }

    /// Soundtrack stop fade length
    pub fn soundtrack_stop_fade(&self) -> Duration {
        Duration::from_millis(self.soundtrack_stop_fade_ms)
    }

    /// Crossfade for a request, falling back to the configured default
    pub fn crossfade(&self, requested_ms: Option<u64>) -> Duration {
        let ms = requested_ms
            .unwrap_or(self.soundtrack_crossfade_ms)
            .clamp(MIN_CROSSFADE_MS, MAX_CROSSFADE_MS);
        Duration::from_millis(ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.load_timeout(), Duration::from_secs(5));
        assert_eq!(config.duration_timeout(), Duration::from_secs(1));
        assert_eq!(config.sequence_load_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn requested_crossfade_is_clamped() {
        let config = EngineConfig::default();
        assert_eq!(config.crossfade(None), Duration::from_millis(2_500));
        assert_eq!(config.crossfade(Some(100)), Duration::from_millis(2_500));
        assert_eq!(config.crossfade(Some(8_000)), Duration::from_millis(8_000));
        assert_eq!(config.crossfade(Some(60_000)), Duration::from_millis(12_500));
    }

    #[test]
    fn out_of_range_values_fail_validation() {
        let config = EngineConfig {
            rapid_rate_variance: 1.5,
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(FoleyError::Config(_))));

        let config = EngineConfig {
            reverb_count: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());

        let config = EngineConfig {
            reverb_count: 0,
            impulse_responses: vec![PathBuf::from("hall.wav")],
            ..EngineConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: EngineConfig = toml::from_str("looping_fade_ms = 350").unwrap();
        assert_eq!(config.looping_fade(), Duration::from_millis(350));
        assert_eq!(config.sample_rate, 48_000);
    }
}
