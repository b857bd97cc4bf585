//! Engine factory
//!
//! Holds everything the containers share (graph, loader, config, routing
//! flag and runtime handle) and builds one container per request.

use crate::containers::{
    Container, CreateOptions, DefaultContainer, LoopingContainer, RapidContainer,
    SequenceContainer, SoundtrackContainer,
};
use crate::error::{PlaybackError, Result};
use crate::events::LifecycleCallbacks;
use crate::loader::{SourceLoader, SymphoniaLoader};
use crate::node::PlayableNode;
use crate::routing::RoutingSelector;
use foley_audio::{AudioGraph, ReverbPool};
use foley_core::{EffectDescriptor, EngineConfig, FoleyError, PlaybackRequest, Variant};
use std::fmt;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info};

/// Shared state behind every node and container of one engine
pub struct EngineContext {
    pub(crate) graph: AudioGraph,
    pub(crate) loader: Arc<dyn SourceLoader>,
    pub(crate) config: EngineConfig,
    pub(crate) runtime: Handle,
    pub(crate) routing: RoutingSelector,
}

impl fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineContext")
            .field("graph", &self.graph)
            .field("config", &self.config)
            .field("cave", &self.routing.is_cave())
            .finish_non_exhaustive()
    }
}

/// Builds containers for playback requests
///
/// Cheap to clone; clones share the graph, loader cache and routing flag.
#[derive(Debug, Clone)]
pub struct Engine {
    ctx: Arc<EngineContext>,
}

impl Engine {
    /// Engine decoding through Symphonia
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: EngineConfig, graph: AudioGraph) -> Result<Self> {
        Self::with_loader(config, graph, Arc::new(SymphoniaLoader::new()))
    }

    /// Engine with a custom source loader
    pub fn with_loader(
        config: EngineConfig,
        graph: AudioGraph,
        loader: Arc<dyn SourceLoader>,
    ) -> Result<Self> {
        config.validate()?;
        if graph.sample_rate() != config.sample_rate {
            return Err(FoleyError::config(format!(
                "graph runs at {} Hz but config asks for {} Hz",
                graph.sample_rate(),
                config.sample_rate
            ))
            .into());
        }
        let runtime = Handle::try_current().map_err(|_| PlaybackError::RuntimeUnavailable)?;

        info!(
            sample_rate = config.sample_rate,
            reverb_buses = graph.reverb_count(),
            "Playback engine ready"
        );

        Ok(Self {
            ctx: Arc::new(EngineContext {
                graph,
                loader,
                config,
                runtime,
                routing: RoutingSelector::new(),
            }),
        })
    }

    /// Mixing graph the voices are connected to
    pub fn graph(&self) -> &AudioGraph {
        &self.ctx.graph
    }

    /// Active configuration
    pub fn config(&self) -> &EngineConfig {
        &self.ctx.config
    }

    /// Plain/reverb flag consulted by every new voice
    pub fn routing(&self) -> &RoutingSelector {
        &self.ctx.routing
    }

    /// Standalone node for one effect, loading immediately
    pub fn node(&self, descriptor: EffectDescriptor) -> PlayableNode {
        let route = self.ctx.routing.select(&self.ctx.graph);
        let node = PlayableNode::new(Arc::clone(&self.ctx), descriptor, route);
        node.load();
        node
    }

    /// Build the container for `request`
    ///
    /// Contract violations (no effects, sequence without a plan) are rejected
    /// here; everything after construction is reported through events.
    pub fn create(
        &self,
        request: PlaybackRequest,
        callbacks: LifecycleCallbacks,
        options: CreateOptions,
    ) -> Result<Container> {
        request.validate()?;
        let ctx = Arc::clone(&self.ctx);

        let container = match request.variant {
            Variant::Default => {
                Container::Default(DefaultContainer::new(ctx, request.effects, callbacks))
            }
            Variant::Looping => {
                Container::Looping(LoopingContainer::new(ctx, request.effects, callbacks))
            }
            Variant::Rapid => Container::Rapid(RapidContainer::new(
                ctx,
                request.effects,
                callbacks,
                options,
            )),
            Variant::Soundtrack => {
                let crossfade = self.ctx.config.crossfade(request.crossfade_ms);
                Container::Soundtrack(SoundtrackContainer::new(
                    ctx,
                    request.effects,
                    callbacks,
                    crossfade,
                ))
            }
            Variant::Sequence => {
                let plan = request.sequence.ok_or(FoleyError::MissingSequence)?;
                Container::Sequence(SequenceContainer::new(ctx, plan, callbacks))
            }
        };

        debug!(container = %container.id(), variant = %request.variant, "Container created");
        Ok(container)
    }

    /// Refuse new voices and silence everything connected
    pub fn close(&self) {
        info!("Closing playback engine");
        self.ctx.graph.close();
    }
}

/// Build the mixing graph described by `config`
///
/// WAV impulse responses take precedence; otherwise `reverb_count`
/// responses are synthesized.
pub fn build_graph(config: &EngineConfig) -> Result<AudioGraph> {
    let pool = if config.impulse_responses.is_empty() {
        ReverbPool::synthesized(config.reverb_count, config.reverb_seconds, config.sample_rate)
    } else {
        ReverbPool::from_wav_files(&config.impulse_responses, config.sample_rate)?
    };
    Ok(AudioGraph::new(config.sample_rate, pool))
}
