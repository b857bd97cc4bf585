//! Looping variant: ambience that loops seamlessly with short fades

use super::single::{SinglePolicy, SingleVoice};
use super::{Container, ContainerCore, EffectContainer};
use crate::engine::EngineContext;
use crate::events::LifecycleCallbacks;
use crate::node::NodeState;
use async_trait::async_trait;
use foley_core::{EffectDescriptor, EffectId, InstanceId, Variant};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Uniformly random effect looped by the source itself
///
/// Fades in on play; `stop` fades out over the same length and then
/// hard-stops, so `Stopped` fires after the fade.
#[derive(Clone)]
pub struct LoopingContainer {
    inner: Arc<SingleVoice>,
}

impl LoopingContainer {
    pub(crate) fn new(
        ctx: Arc<EngineContext>,
        effects: Vec<EffectDescriptor>,
        callbacks: LifecycleCallbacks,
    ) -> Self {
        let fade = ctx.config.looping_fade();
        let policy = SinglePolicy {
            looping: true,
            fade_in: fade,
            fade_out: fade,
        };
        let inner = SingleVoice::create(ctx, Variant::Looping, effects, callbacks, policy, |inner| {
            Container::Looping(LoopingContainer { inner })
        });
        Self { inner }
    }

    pub(crate) fn core(&self) -> &ContainerCore {
        &self.inner.core
    }

    /// Gain of the looping voice at graph time
    pub fn current_gain(&self) -> Option<f32> {
        self.inner.current_gain()
    }

    /// State of the looping voice
    pub fn voice_state(&self) -> Option<NodeState> {
        self.inner.current_state()
    }
}

impl fmt::Debug for LoopingContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopingContainer")
            .field("id", &self.inner.core.id)
            .field("voice", &self.voice_state())
            .finish()
    }
}

#[async_trait]
impl EffectContainer for LoopingContainer {
    fn id(&self) -> &InstanceId {
        &self.inner.core.id
    }

    fn variant(&self) -> Variant {
        Variant::Looping
    }

    async fn play(&self) {
        self.inner.play().await;
    }

    fn stop(&self) {
        self.inner.stop();
    }

    fn change_volume(&self, level: f32) {
        self.inner.change_volume(level);
    }

    fn fade(&self, ratio: f32, over: Duration) {
        self.inner.fade(ratio, over);
    }

    async fn duration(&self) -> Duration {
        self.inner.duration().await
    }

    fn loaded_effect_id(&self) -> Option<EffectId> {
        self.inner.core.loaded_effect()
    }
}
