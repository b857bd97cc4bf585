//! Sequence timeline
//!
//! Walks the step list with a running clock: delays push the clock forward,
//! group steps start at the clock and push it forward by their measured
//! length. Steps without a measured length are left out.

use foley_core::{ElementId, SequenceElement};
use std::collections::HashMap;
use std::time::Duration;

/// One scheduled group step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEntry {
    /// Step id
    pub element: ElementId,
    /// Start offset from the beginning of playback
    pub offset: Duration,
}

/// Start offsets of every playable step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceTimeline {
    entries: Vec<TimelineEntry>,
    end: Duration,
}

impl SequenceTimeline {
    /// Lay out `elements` using the measured `durations` of group steps
    pub fn build(elements: &[SequenceElement], durations: &HashMap<ElementId, Duration>) -> Self {
        let mut clock = Duration::ZERO;
        let mut entries = Vec::new();

        for element in elements {
            match element {
                SequenceElement::Delay { duration_ms, .. } => {
                    clock += Duration::from_millis(*duration_ms);
                }
                SequenceElement::Group { id, .. } => {
                    let Some(duration) = durations.get(id) else {
                        continue;
                    };
                    entries.push(TimelineEntry {
                        element: id.clone(),
                        offset: clock,
                    });
                    clock += *duration;
                }
            }
        }

        Self {
            entries,
            end: clock,
        }
    }

    /// Scheduled steps in start order
    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    /// Offset at which the last step (or trailing delay) ends
    pub fn end(&self) -> Duration {
        self.end
    }

    /// Whether no step is scheduled
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Offset of one step
    pub fn offset_of(&self, element: &ElementId) -> Option<Duration> {
        self.entries
            .iter()
            .find(|e| &e.element == element)
            .map(|e| e.offset)
    }
}
