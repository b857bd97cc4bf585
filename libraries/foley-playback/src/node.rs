//! Playable node: one source, one play attempt
//!
//! A node owns a single render source from load until it leaves the graph.
//! Lifecycle: `Loading -> Ready -> Playing -> Stopped`, with `Error` reachable
//! from any state. `Stopped` is emitted exactly once, after which the node
//! drops its listeners and cannot be played again.

use crate::engine::EngineContext;
use crate::error::{PlaybackError, Result};
use crate::events::{EventChannel, NodeEvent, Subscription};
use crate::loader::DurationHint;
use foley_audio::{RenderSource, Route, VoiceEnd, VoiceId, VoiceParams};
use foley_core::{EffectDescriptor, EffectId};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::time::timeout;
use tracing::{debug, error, warn};

/// Playback state of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    /// Source is being decoded or opened
    Loading,
    /// Source is ready to connect
    Ready,
    /// Voice is in the graph
    Playing,
    /// Voice left the graph or was never started
    Stopped,
    /// Load or render failure
    Error,
}

#[derive(Default)]
struct Slot {
    source: Option<Box<dyn RenderSource>>,
    voice: Option<VoiceId>,
}

struct NodeInner {
    ctx: Arc<EngineContext>,
    descriptor: EffectDescriptor,
    route: Route,
    params: Arc<VoiceParams>,
    events: EventChannel<NodeEvent>,
    state: watch::Sender<NodeState>,
    duration: watch::Sender<Option<Duration>>,
    slot: Mutex<Slot>,
    load_started: AtomicBool,
    stopped: AtomicBool,
}

impl NodeInner {
    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Uniform wrapper around one buffered or streamed source
#[derive(Clone)]
pub struct PlayableNode {
    inner: Arc<NodeInner>,
}

impl fmt::Debug for PlayableNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayableNode")
            .field("effect", &self.inner.descriptor.id)
            .field("state", &self.state())
            .field("route", &self.inner.route)
            .finish()
    }
}

impl PlayableNode {
    pub(crate) fn new(ctx: Arc<EngineContext>, descriptor: EffectDescriptor, route: Route) -> Self {
        let (state, _) = watch::channel(NodeState::Loading);
        let (duration, _) = watch::channel(None);
        Self {
            inner: Arc::new(NodeInner {
                ctx,
                descriptor,
                route,
                params: Arc::new(VoiceParams::new()),
                events: EventChannel::new(),
                state,
                duration,
                slot: Mutex::new(Slot::default()),
                load_started: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
            }),
        }
    }

    /// Effect this node plays
    pub fn effect_id(&self) -> &EffectId {
        &self.inner.descriptor.id
    }

    /// Descriptor this node plays
    pub fn descriptor(&self) -> &EffectDescriptor {
        &self.inner.descriptor
    }

    /// Output bus
    pub fn route(&self) -> Route {
        self.inner.route
    }

    /// Current state
    pub fn state(&self) -> NodeState {
        *self.inner.state.borrow()
    }

    /// Live voice controls
    pub fn params(&self) -> &Arc<VoiceParams> {
        &self.inner.params
    }

    /// Observe lifecycle events
    pub fn subscribe(&self, f: impl Fn(&NodeEvent) + Send + Sync + 'static) -> Subscription {
        self.inner.events.subscribe(f)
    }

    /// Start loading in the background; later calls are no-ops
    pub fn load(&self) {
        if self.inner.load_started.swap(true, Ordering::AcqRel) {
            return;
        }

        let node = self.clone();
        self.inner.ctx.runtime.spawn(async move {
            let ctx = Arc::clone(&node.inner.ctx);
            let result = ctx
                .loader
                .load(&node.inner.descriptor, ctx.graph.sample_rate())
                .await;

            match result {
                Ok(loaded) => node.on_loaded(loaded.source, loaded.duration),
                Err(err) => node.fail(err),
            }
        });
    }

    fn on_loaded(&self, source: Box<dyn RenderSource>, hint: DurationHint) {
        if self.inner.stopped.load(Ordering::Acquire) {
            debug!(effect = %self.effect_id(), "Loaded after stop, discarding");
            return;
        }

        let known = match hint {
            DurationHint::Known(duration) => Some(duration),
            DurationHint::Pending(rx) => {
                self.watch_duration(rx);
                None
            }
            DurationHint::Unknown => None,
        };
        if known.is_some() {
            self.inner.duration.send_replace(known);
        }

        self.inner.slot().source = Some(source);
        let ready = self.inner.state.send_if_modified(|state| {
            if *state == NodeState::Loading {
                *state = NodeState::Ready;
                true
            } else {
                false
            }
        });

        if ready {
            debug!(effect = %self.effect_id(), duration = ?known, "Node ready");
            self.inner
                .events
                .emit(&NodeEvent::Loaded { duration: known });
        }
    }

    fn watch_duration(&self, rx: oneshot::Receiver<Duration>) {
        let node = self.clone();
        self.inner.ctx.runtime.spawn(async move {
            if let Ok(duration) = rx.await {
                node.inner.duration.send_replace(Some(duration));
                debug!(effect = %node.effect_id(), ?duration, "Duration resolved");
                node.inner.events.emit(&NodeEvent::DurationChanged(duration));
            }
        });
    }

    fn fail(&self, err: PlaybackError) {
        if self.inner.stopped.load(Ordering::Acquire) {
            return;
        }
        error!(effect = %self.effect_id(), error = %err, "Node failed");

        self.inner.state.send_replace(NodeState::Error);
        // A failed node has no length; release duration waiters
        self.inner.duration.send_if_modified(|d| {
            if d.is_none() {
                *d = Some(Duration::ZERO);
                true
            } else {
                false
            }
        });
        self.inner.events.emit(&NodeEvent::Error(err));
        self.stop();
    }

    /// Connect the voice, waiting for the source at most `load_timeout`
    ///
    /// A timeout puts the node in `Error` (and `Stopped`); the error is also
    /// returned so the caller can decide what to do next.
    pub async fn play(&self) -> Result<()> {
        self.load();

        let bound = self.inner.ctx.config.load_timeout();
        let mut rx = self.inner.state.subscribe();
        let state = match timeout(bound, rx.wait_for(|s| *s != NodeState::Loading)).await {
            Ok(Ok(state)) => *state,
            Ok(Err(_)) => return Err(PlaybackError::playback("node dropped while loading")),
            Err(_) => {
                let err = PlaybackError::LoadTimeout(bound);
                self.fail(err.clone());
                return Err(err);
            }
        };

        match state {
            NodeState::Ready => self.connect(),
            NodeState::Playing => Ok(()),
            NodeState::Loading | NodeState::Stopped => {
                Err(PlaybackError::playback("node already stopped"))
            }
            NodeState::Error => Err(PlaybackError::playback("node failed to load")),
        }
    }

    fn connect(&self) -> Result<()> {
        let Some(source) = self.inner.slot().source.take() else {
            return Err(PlaybackError::playback("source already consumed"));
        };
        if self.inner.stopped.load(Ordering::Acquire) {
            return Err(PlaybackError::playback("node already stopped"));
        }

        let ctx = &self.inner.ctx;
        let (voice, ended) =
            match ctx
                .graph
                .connect(source, Arc::clone(&self.inner.params), self.inner.route)
            {
                Ok(connected) => connected,
                Err(err) => {
                    let err = PlaybackError::from(err);
                    self.fail(err.clone());
                    return Err(err);
                }
            };

        self.inner.slot().voice = Some(voice);
        if self.inner.stopped.load(Ordering::Acquire) {
            // Lost a race with stop()
            ctx.graph.disconnect(voice);
            return Err(PlaybackError::playback("node already stopped"));
        }
        self.inner.state.send_replace(NodeState::Playing);
        debug!(effect = %self.effect_id(), %voice, route = ?self.inner.route, "Node playing");
        self.inner.events.emit(&NodeEvent::Playing);

        let node = self.clone();
        ctx.runtime.spawn(async move {
            match ended.await {
                Ok(VoiceEnd::Finished) => {
                    node.inner.slot().voice = None;
                    node.stop();
                }
                Ok(VoiceEnd::Failed(msg)) => {
                    node.inner.slot().voice = None;
                    node.fail(PlaybackError::Playback(msg));
                }
                // Disconnected by stop()
                Err(_) => {}
            }
        });
        Ok(())
    }

    /// Leave the graph immediately; fires `Stopped` once
    pub fn stop(&self) {
        if self.inner.stopped.swap(true, Ordering::AcqRel) {
            return;
        }

        let voice = {
            let mut slot = self.inner.slot();
            slot.source = None;
            slot.voice.take()
        };
        if let Some(voice) = voice {
            self.inner.ctx.graph.disconnect(voice);
        }

        self.inner.state.send_if_modified(|state| {
            if *state == NodeState::Error {
                false
            } else {
                *state = NodeState::Stopped;
                true
            }
        });
        debug!(effect = %self.effect_id(), "Node stopped");
        self.inner.events.emit(&NodeEvent::Stopped);
        self.inner.events.clear();
    }

    /// Whether `stop` already ran
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    /// Voice volume in `0..=1`
    pub fn set_volume(&self, volume: f32) {
        self.inner.params.set_volume(volume);
    }

    /// Playback-rate multiplier
    pub fn set_rate(&self, rate: f32) {
        self.inner.params.set_rate(rate);
    }

    /// Stereo position in `-1..=1`
    pub fn set_pan(&self, pan: f32) {
        self.inner.params.set_pan(pan);
    }

    /// Wrap at the end of the source instead of stopping
    pub fn set_looping(&self, looping: bool) {
        self.inner.params.set_looping(looping);
    }

    /// Length of the source, or zero if it is not known within the configured bound
    pub async fn duration(&self) -> Duration {
        let bound = self.inner.ctx.config.duration_timeout();
        let mut rx = self.inner.duration.subscribe();
        let duration = match timeout(bound, rx.wait_for(Option::is_some)).await {
            Ok(Ok(duration)) => (*duration).unwrap_or_default(),
            Ok(Err(_)) => Duration::ZERO,
            Err(_) => {
                warn!(effect = %self.effect_id(), ?bound, "Duration unknown, using zero");
                Duration::ZERO
            }
        };
        duration
    }

    /// Length if already known
    pub fn known_duration(&self) -> Option<Duration> {
        *self.inner.duration.borrow()
    }
}
