use super::{ElementId, GroupId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One step of a sequence script
///
/// Steps are laid out back to back: a delay pushes the clock forward by its
/// duration, a group starts at the current clock and pushes it forward by the
/// length of the effect it picked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SequenceElement {
    /// Silence for a fixed time
    Delay {
        /// Step identifier
        id: ElementId,
        /// Silence length in milliseconds
        duration_ms: u64,
    },
    /// Play one effect of another group
    Group {
        /// Step identifier
        id: ElementId,
        /// Group whose effects are played
        target: GroupId,
    },
}

impl SequenceElement {
    /// Create a delay step
    pub fn delay(id: impl Into<ElementId>, duration: Duration) -> Self {
        Self::Delay {
            id: id.into(),
            duration_ms: duration.as_millis() as u64,
        }
    }

    /// Create a group step
    pub fn group(id: impl Into<ElementId>, target: impl Into<GroupId>) -> Self {
        Self::Group {
            id: id.into(),
            target: target.into(),
        }
    }

    /// Step identifier
    pub fn id(&self) -> &ElementId {
        match self {
            Self::Delay { id, .. } | Self::Group { id, .. } => id,
        }
    }
}
