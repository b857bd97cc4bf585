//! Default variant: one random effect, played once

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

/// Uniformly random effect, no fades, immediate stop
///
/// The first voice is preloaded at construction; every replay gets a fresh
/// voice with a new random pick.
#[derive(Clone)]
pub struct DefaultContainer {
    inner: Arc<SingleVoice>,
}

impl DefaultContainer {
    pub(crate) fn new(
        ctx: Arc<EngineContext>,
        effects: Vec<EffectDescriptor>,
        callbacks: LifecycleCallbacks,
    ) -> Self {
        let policy = SinglePolicy {
            looping: false,
            fade_in: Duration::ZERO,
            fade_out: Duration::ZERO,
        };
        let inner = SingleVoice::create(ctx, Variant::Default, effects, callbacks, policy, |inner| {
            Container::Default(DefaultContainer { inner })
        });
        Self { inner }
    }

    pub(crate) fn core(&self) -> &ContainerCore {
        &self.inner.core
    }

    /// Gain of the current voice at graph time
    pub fn current_gain(&self) -> Option<f32> {
        self.inner.current_gain()
    }

    /// State of the current voice
    pub fn voice_state(&self) -> Option<NodeState> {
        self.inner.current_state()
    }

    /// Stop immediately and ignore any later `play`
    pub(crate) fn retire(&self) {
        self.inner.retire();
    }
}

impl fmt::Debug for DefaultContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultContainer")
            .field("id", &self.inner.core.id)
            .field("voice", &self.voice_state())
            .finish()
    }
}

#[async_trait]
impl EffectContainer for DefaultContainer {
    fn id(&self) -> &InstanceId {
        &self.inner.core.id
    }

    fn variant(&self) -> Variant {
        Variant::Default
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::CreateOptions;
    use crate::engine::Engine;
    use foley_audio::AudioGraph;
    use foley_core::{EngineConfig, PlaybackRequest, SourceRef};
    use std::io::Cursor;

    fn chime() -> EffectDescriptor {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut bytes = Cursor::new(Vec::new());
        let mut writer = hound::WavWriter::new(&mut bytes, spec).unwrap();
        for _ in 0..8_000 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
        EffectDescriptor::new("chime", SourceRef::inline(bytes.into_inner())).with_format("wav")
    }

    #[tokio::test]
    async fn retired_container_ignores_play() {
        let config = EngineConfig {
            sample_rate: 8_000,
            ..EngineConfig::default()
        };
        let graph = AudioGraph::dry(config.sample_rate);
        let engine = Engine::new(config, graph.clone()).unwrap();
        let container = engine
            .create(
                PlaybackRequest::new(Variant::Default, vec![chime()]),
                LifecycleCallbacks::new("x"),
                CreateOptions::default(),
            )
            .unwrap();
        let Container::Default(default) = container else {
            panic!("expected a Default container");
        };

        default.play().await;
        assert_eq!(graph.active_voices(), 1);

        default.retire();
        assert_eq!(graph.active_voices(), 0);
        default.play().await;
        assert_eq!(graph.active_voices(), 0);
        assert_ne!(default.voice_state(), Some(NodeState::Playing));
    }
}
