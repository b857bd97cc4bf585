//! Foley Playback
//!
//! Variant-aware playback on top of the `foley-audio` graph.
//!
//! This crate provides:
//! - `PlayableNode`, a single play attempt of one decoded or streamed source
//! - `VoicePlayer`, a node with volume target and gain automation
//! - Five variant containers behind the `EffectContainer` trait:
//!   Default, Looping, Rapid, Soundtrack and Sequence
//! - Plain vs reverb routing of new voices (`RoutingSelector`)
//! - `Engine`, the factory turning a `PlaybackRequest` into a `Container`
//!
//! # Architecture
//!
//! Everything runs on the Tokio runtime the engine was created on. Decoding
//! happens on the blocking pool, scheduling (fades, crossfades, sequence
//! steps) on Tokio timers, and mixing on whatever thread pulls
//! `AudioGraph::render`. Runtime failures never surface as `Err` from the
//! containers; they arrive as `Error` events followed by `Stopped`.
//!
//! # Example
//!
//! ```rust,no_run
//! use foley_core::{EffectDescriptor, EngineConfig, PlaybackRequest, SourceRef, Variant};
//! use foley_playback::{build_graph, CreateOptions, EffectContainer, Engine, LifecycleCallbacks};
//!
//! # async fn run() -> foley_playback::Result<()> {
//! let config = EngineConfig::default();
//! let engine = Engine::new(config.clone(), build_graph(&config)?)?;
//!
//! let door = EffectDescriptor::new("door-1", SourceRef::path("/sfx/door.ogg"));
//! let callbacks = LifecycleCallbacks::new("doors")
//!     .on_stopped(|id, _| println!("{id} finished"));
//!
//! let container = engine.create(
//!     PlaybackRequest::new(Variant::Default, vec![door]),
//!     callbacks,
//!     CreateOptions::default(),
//! )?;
//! container.play().await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod containers;
pub mod crossfade;
pub mod engine;
pub mod error;
pub mod events;
pub mod loader;
pub mod node;
pub mod routing;
pub mod shuffle;
pub mod timeline;
pub mod timers;
pub mod voice;

pub use containers::{
    Container, CreateOptions, DefaultContainer, EffectContainer, LoopingContainer,
    RapidContainer, SequenceContainer, SoundtrackContainer,
};
pub use crossfade::CrossfadePlan;
pub use engine::{build_graph, Engine};
pub use error::{PlaybackError, Result};
pub use events::{
    ContainerEvent, ContainerEventKind, EventChannel, LifecycleCallbacks, NodeEvent,
    Subscription,
};
pub use loader::{DurationHint, LoadedSource, SourceLoader, SymphoniaLoader};
pub use node::{NodeState, PlayableNode};
pub use routing::RoutingSelector;
pub use shuffle::{pick_uniform, NoRepeatSelector, ShuffleDeck, NO_REPEAT_MIN_OPTIONS};
pub use timeline::{SequenceTimeline, TimelineEntry};
pub use timers::TimerSet;
pub use voice::VoicePlayer;
