//! Foley Core
//!
//! Platform-agnostic domain types, collaborator traits, configuration and error
//! handling for the Foley soundboard engine.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `EffectDescriptor`, `Variant`, `SequenceElement`, `PlaybackRequest`
//! - **Collaborator Traits**: `EffectCatalog` (resolves a group into playable descriptors)
//! - **Configuration**: `EngineConfig` (timings, routing pool, sample rate)
//! - **Error Handling**: `FoleyError` and `Result`
//!
//! # Example
//!
//! ```rust
//! use foley_core::{EffectDescriptor, PlaybackRequest, SourceRef, Variant};
//!
//! let thunder = EffectDescriptor::new("thunder-1", SourceRef::path("/sfx/thunder.ogg"))
//!     .with_format("ogg")
//!     .with_volume(120)
//!     .unwrap();
//!
//! let request = PlaybackRequest::new(Variant::Default, vec![thunder]);
//! assert!(request.validate().is_ok());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod catalog;
pub mod config;
pub mod error;
pub mod types;

pub use self::config::EngineConfig;
pub use catalog::{EffectCatalog, ResolvedGroup};
pub use error::{FoleyError, Result};
pub use types::{
    EffectDescriptor, EffectId, EffectVolume, ElementId, GroupId, InstanceId, PlaybackRequest,
    SequenceElement, SequencePlan, SourceRef, Variant, MAX_EFFECT_VOLUME,
};
