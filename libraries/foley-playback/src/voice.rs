//! Single-voice player: a node plus its gain stage
//!
//! The gain lives in the voice's `AudioParam`, so fades are sample-accurate
//! automation on the audio thread rather than timer-driven volume steps.
//! The container level is a separate multiplier on the node's volume, so a
//! level change takes effect at once even while a fade is running.

use crate::engine::EngineContext;
use crate::events::{NodeEvent, Subscription};
use crate::node::{NodeState, PlayableNode};
use foley_audio::{Route, MAX_GAIN};
use foley_core::{EffectDescriptor, EffectId};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// One node with a target volume and fade scheduling
#[derive(Debug, Clone)]
pub struct VoicePlayer {
    node: PlayableNode,
    ctx: Arc<EngineContext>,
    target: Arc<AtomicU32>,
}

impl VoicePlayer {
    /// Build a silent player; `level` is the container volume in `0..=1`
    pub(crate) fn new(
        ctx: Arc<EngineContext>,
        descriptor: EffectDescriptor,
        route: Route,
        level: f32,
    ) -> Self {
        let target = descriptor.volume.gain().min(MAX_GAIN);
        let node = PlayableNode::new(Arc::clone(&ctx), descriptor, route);
        node.params().with_gain(|gain| gain.set_value(0.0));
        node.set_volume(level);
        Self {
            node,
            ctx,
            target: Arc::new(AtomicU32::new(target.to_bits())),
        }
    }

    /// Underlying node
    pub fn node(&self) -> &PlayableNode {
        &self.node
    }

    /// Effect being played
    pub fn effect_id(&self) -> &EffectId {
        self.node.effect_id()
    }

    /// Start loading without playing
    pub fn preload(&self) {
        self.node.load();
    }

    /// Observe the node's lifecycle
    pub fn subscribe(&self, f: impl Fn(&NodeEvent) + Send + Sync + 'static) -> Subscription {
        self.node.subscribe(f)
    }

    /// Descriptor gain the automation fades towards
    pub fn target(&self) -> f32 {
        f32::from_bits(self.target.load(Ordering::Acquire))
    }

    /// Start playing, ramping from the current gain to the target over `fade_in`
    ///
    /// Returns whether the voice actually started; failures are reported
    /// through the node's events.
    pub async fn play(&self, fade_in: Duration) -> bool {
        if self.node.play().await.is_err() {
            return false;
        }

        let target = self.target();
        let now = self.ctx.graph.current_time();
        self.node.params().with_gain(|gain| {
            if fade_in.is_zero() {
                gain.set_value_at_time(target, now);
            } else {
                let from = gain.value_at(now);
                gain.set_value_curve_at_time(&[from, target], now, fade_in.as_secs_f64());
            }
        });
        debug!(effect = %self.effect_id(), target, ?fade_in, "Voice started");
        true
    }

    /// Ramp from the current gain to `target * ratio` over `over`
    pub fn fade(&self, ratio: f32, over: Duration) {
        let to = (self.target() * ratio.max(0.0)).min(MAX_GAIN);
        let now = self.ctx.graph.current_time();
        self.node.params().with_gain(|gain| {
            gain.cancel_and_hold(now);
            if over.is_zero() {
                gain.set_value_at_time(to, now);
            } else {
                let from = gain.value_at(now);
                gain.set_value_curve_at_time(&[from, to], now, over.as_secs_f64());
            }
        });
    }

    /// Container level in `0..=1`, independent of running fades
    pub fn set_level(&self, level: f32) {
        self.node.set_volume(level);
    }

    /// Container level currently applied
    pub fn level(&self) -> f32 {
        self.node.params().volume()
    }

    /// Effective gain (automation times level) at the current graph time
    pub fn current_gain(&self) -> f32 {
        let now = self.ctx.graph.current_time();
        let automated = self.node.params().with_gain(|gain| gain.value_at(now));
        automated * self.level()
    }

    /// Hard stop
    pub fn stop(&self) {
        self.node.stop();
    }

    /// Node state
    pub fn state(&self) -> NodeState {
        self.node.state()
    }

    /// Source length, zero when unknown
    pub async fn duration(&self) -> Duration {
        self.node.duration().await
    }

    /// Playback-rate multiplier
    pub fn set_rate(&self, rate: f32) {
        self.node.set_rate(rate);
    }

    /// Stereo position
    pub fn set_pan(&self, pan: f32) {
        self.node.set_pan(pan);
    }

    /// Loop the source
    pub fn set_looping(&self, looping: bool) {
        self.node.set_looping(looping);
    }
}
