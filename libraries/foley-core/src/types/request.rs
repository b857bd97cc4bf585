use super::{EffectDescriptor, GroupId, SequenceElement, Variant};
use crate::catalog::EffectCatalog;
use crate::error::{FoleyError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A sequence script together with the descriptors of every group it references
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SequencePlan {
    /// Ordered steps
    pub elements: Vec<SequenceElement>,

    /// Resolved descriptors per referenced group
    #[serde(default)]
    pub groups: BTreeMap<GroupId, Vec<EffectDescriptor>>,
}

impl SequencePlan {
    /// Create a plan with no resolved groups
    pub fn new(elements: Vec<SequenceElement>) -> Self {
        Self {
            elements,
            groups: BTreeMap::new(),
        }
    }

    /// Attach the descriptors of one referenced group
    #[must_use]
    pub fn with_group(mut self, group: impl Into<GroupId>, effects: Vec<EffectDescriptor>) -> Self {
        self.groups.insert(group.into(), effects);
        self
    }

    /// Group ids referenced by the steps, in first-use order
    pub fn referenced_groups(&self) -> Vec<&GroupId> {
        let mut seen = Vec::new();
        for element in &self.elements {
            if let SequenceElement::Group { target, .. } = element {
                if !seen.contains(&target) {
                    seen.push(target);
                }
            }
        }
        seen
    }

    /// Descriptors for a group, empty when unresolved
    pub fn effects_for(&self, group: &GroupId) -> &[EffectDescriptor] {
        self.groups.get(group).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Everything the engine factory needs to build one container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackRequest {
    /// Container behavior
    pub variant: Variant,

    /// Resolved effects of the group (ignored by sequences)
    #[serde(default)]
    pub effects: Vec<EffectDescriptor>,

    /// Sequence script, required for [`Variant::Sequence`]
    #[serde(default)]
    pub sequence: Option<SequencePlan>,

    /// Soundtrack crossfade length, clamped to 2.5..=12.5 s by the engine
    #[serde(default)]
    pub crossfade_ms: Option<u64>,
}

impl PlaybackRequest {
    /// Create a request for a non-sequence variant
    pub fn new(variant: Variant, effects: Vec<EffectDescriptor>) -> Self {
        Self {
            variant,
            effects,
            sequence: None,
            crossfade_ms: None,
        }
    }

    /// Create a sequence request
    pub fn sequence(plan: SequencePlan) -> Self {
        Self {
            variant: Variant::Sequence,
            effects: Vec::new(),
            sequence: Some(plan),
            crossfade_ms: None,
        }
    }

    /// Set the soundtrack crossfade length
    #[must_use]
    pub fn with_crossfade_ms(mut self, crossfade_ms: u64) -> Self {
        self.crossfade_ms = Some(crossfade_ms);
        self
    }

    /// Check the request contract before any audio work happens
    pub fn validate(&self) -> Result<()> {
        match self.variant {
            Variant::Sequence => {
                if self.sequence.is_none() {
                    return Err(FoleyError::MissingSequence);
                }
            }
            variant => {
                if self.effects.is_empty() {
                    return Err(FoleyError::EmptyEffects(variant));
                }
            }
        }
        Ok(())
    }

    /// Resolve a group through the catalog, including sequence targets
    pub fn from_catalog<C>(catalog: &C, group: &GroupId) -> Result<Self>
    where
        C: EffectCatalog + ?Sized,
    {
        let resolved = catalog.resolve(group)?;

        if resolved.variant != Variant::Sequence {
            let request = Self::new(resolved.variant, resolved.effects);
            return Ok(Self {
                crossfade_ms: resolved.crossfade_ms,
                ..request
            });
        }

        let elements = resolved.sequence.unwrap_or_default();
        let mut plan = SequencePlan::new(elements);
        let targets: Vec<GroupId> = plan.referenced_groups().into_iter().cloned().collect();
        for target in targets {
            // Unknown targets stay unresolved and are dropped from the schedule later
            match catalog.resolve(&target) {
                Ok(group) => {
                    plan.groups.insert(target, group.effects);
                }
                Err(FoleyError::GroupNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        Ok(Self::sequence(plan))
    }
}
