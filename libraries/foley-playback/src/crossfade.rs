//! Soundtrack crossfade timing
//!
//! Offsets are relative to the moment the current track started playing.

use std::time::Duration;

/// When to hand over from a track of known length to the next one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossfadePlan {
    /// Overlap between outgoing and incoming track
    pub fade_window: Duration,
    /// Offset at which the outgoing fade and the incoming fade-in start
    pub fade_start: Duration,
    /// Offset at which the outgoing track is hard-stopped
    pub stop_at: Duration,
}

impl CrossfadePlan {
    /// Plan for a track of `duration` with a requested `crossfade`
    ///
    /// The window never exceeds a tenth of the track, so short tracks still
    /// play mostly unfaded.
    pub fn new(duration: Duration, crossfade: Duration) -> Self {
        let fade_window = (duration / 10).min(crossfade);
        Self {
            fade_window,
            fade_start: duration - fade_window,
            stop_at: duration,
        }
    }
}
