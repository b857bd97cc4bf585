use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Playback behavior of a soundboard group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// One randomly chosen effect, played once
    #[default]
    Default,
    /// One randomly chosen effect, looped with fades
    Looping,
    /// Overlapping one-shots with pitch and pan jitter
    Rapid,
    /// Shuffled playlist with crossfades
    Soundtrack,
    /// Timed multi-group script
    Sequence,
}

impl Variant {
    /// All variants, in declaration order
    pub const ALL: [Variant; 5] = [
        Variant::Default,
        Variant::Looping,
        Variant::Rapid,
        Variant::Soundtrack,
        Variant::Sequence,
    ];

    /// Lowercase name used in configs and logs
    pub fn as_str(self) -> &'static str {
        match self {
            Variant::Default => "default",
            Variant::Looping => "looping",
            Variant::Rapid => "rapid",
            Variant::Soundtrack => "soundtrack",
            Variant::Sequence => "sequence",
        }
    }

    /// Whether several instances of the same group may sound at once
    pub fn allows_overlap(self) -> bool {
        matches!(self, Variant::Rapid)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = crate::FoleyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Variant::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| crate::FoleyError::invalid_input(format!("unknown variant: {}", s)))
    }
}
