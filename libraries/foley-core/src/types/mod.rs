/// Domain types for Foley
mod descriptor;
mod ids;
mod request;
mod sequence;
mod source;
mod variant;

pub use descriptor::{EffectDescriptor, EffectVolume, MAX_EFFECT_VOLUME};
pub use ids::{EffectId, ElementId, GroupId, InstanceId};
pub use request::{PlaybackRequest, SequencePlan};
pub use sequence::SequenceElement;
pub use source::SourceRef;
pub use variant::Variant;
