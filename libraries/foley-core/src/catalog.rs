//! Effect catalog interface
//!
//! The catalog owns board configuration and file storage. The engine only ever
//! sees what it resolves: a group's variant and its playable descriptors.

use crate::error::Result;
use crate::types::{EffectDescriptor, GroupId, SequenceElement, Variant};
use serde::{Deserialize, Serialize};

/// A group resolved into playable data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedGroup {
    /// Group identifier
    pub id: GroupId,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Playback behavior
    pub variant: Variant,

    /// Playable effects (empty for sequences)
    #[serde(default)]
    pub effects: Vec<EffectDescriptor>,

    /// Steps, for sequence groups
    #[serde(default)]
    pub sequence: Option<Vec<SequenceElement>>,

    /// Soundtrack crossfade length override
    #[serde(default)]
    pub crossfade_ms: Option<u64>,

    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Source of resolved groups
///
/// Implementations must return [`crate::FoleyError::GroupNotFound`] for unknown ids.
pub trait EffectCatalog: Send + Sync {
    /// Resolve one group
    fn resolve(&self, group: &GroupId) -> Result<ResolvedGroup>;

    /// All known group ids, in display order
    fn groups(&self) -> Vec<GroupId>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FoleyError, PlaybackRequest, SourceRef};
    use std::collections::HashMap;

    struct MapCatalog(HashMap<GroupId, ResolvedGroup>);

    impl EffectCatalog for MapCatalog {
        fn resolve(&self, group: &GroupId) -> Result<ResolvedGroup> {
            self.0
                .get(group)
                .cloned()
                .ok_or_else(|| FoleyError::GroupNotFound(group.clone()))
        }

        fn groups(&self) -> Vec<GroupId> {
            let mut ids: Vec<_> = self.0.keys().cloned().collect();
            ids.sort();
            ids
        }
    }

    fn group(id: &str, variant: Variant, effects: Vec<EffectDescriptor>) -> ResolvedGroup {
        ResolvedGroup {
            id: GroupId::new(id),
            name: id.to_string(),
            variant,
            effects,
            sequence: None,
            crossfade_ms: None,
            tags: vec![],
        }
    }

    fn catalog() -> MapCatalog {
        let door = EffectDescriptor::new("door", SourceRef::path("/sfx/door.wav"));
        let mut intro = group("intro", Variant::Sequence, vec![]);
        intro.sequence = Some(vec![
            SequenceElement::group("s1", "doors"),
            SequenceElement::group("s2", "ghosts"),
        ]);
        let mut music = group("music", Variant::Soundtrack, vec![door.clone()]);
        music.crossfade_ms = Some(6000);

        MapCatalog(
            [
                (GroupId::new("doors"), group("doors", Variant::Default, vec![door])),
                (GroupId::new("intro"), intro),
                (GroupId::new("music"), music),
            ]
            .into_iter()
            .collect(),
        )
    }

    #[test]
    fn request_from_catalog_carries_variant_and_crossfade() {
        let request = PlaybackRequest::from_catalog(&catalog(), &GroupId::new("music")).unwrap();
        assert_eq!(request.variant, Variant::Soundtrack);
        assert_eq!(request.crossfade_ms, Some(6000));
        assert_eq!(request.effects.len(), 1);
    }

    #[test]
    fn sequence_request_resolves_known_targets_only() {
        let request = PlaybackRequest::from_catalog(&catalog(), &GroupId::new("intro")).unwrap();
        let plan = request.sequence.unwrap();
        assert_eq!(plan.elements.len(), 2);
        assert!(plan.groups.contains_key(&GroupId::new("doors")));
        assert!(!plan.groups.contains_key(&GroupId::new("ghosts")));
    }

    #[test]
    fn unknown_group_is_reported() {
        let err = PlaybackRequest::from_catalog(&catalog(), &GroupId::new("nope")).unwrap_err();
        assert_eq!(err, FoleyError::GroupNotFound(GroupId::new("nope")));
    }
}
