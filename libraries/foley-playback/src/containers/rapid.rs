//! Rapid variant: overlapping stingers with jittered rate and pan

use super::{lock, Container, ContainerCore, CreateOptions, EffectContainer, LoadStatus};
use crate::engine::EngineContext;
use crate::events::{LifecycleCallbacks, NodeEvent, Subscription};
use crate::node::NodeState;
use crate::shuffle::NoRepeatSelector;
use crate::voice::VoicePlayer;
use async_trait::async_trait;
use foley_core::{EffectDescriptor, EffectId, InstanceId, Variant};
use rand::Rng;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tracing::debug;

struct Voice {
    player: VoicePlayer,
    _events: Subscription,
}

struct RapidInner {
    core: ContainerCore,
    effects: Vec<EffectDescriptor>,
    selector: Mutex<NoRepeatSelector>,
    prepared: Mutex<Option<(u64, Voice)>>,
    voices: Mutex<HashMap<u64, Voice>>,
    next_key: AtomicU64,
    plays: AtomicU64,
    rate_variance: f32,
    pan_variance: f32,
}

/// Every `play` layers another independent voice
///
/// Picks never repeat the previous one when the group has at least three
/// effects. `Stopped` fires when the last sounding voice ends. One voice is
/// preloaded at creation; a spare for the next trigger is kept only once the
/// group has been triggered more than once.
#[derive(Clone)]
pub struct RapidContainer {
    inner: Arc<RapidInner>,
}

impl RapidContainer {
    pub(crate) fn new(
        ctx: Arc<EngineContext>,
        effects: Vec<EffectDescriptor>,
        callbacks: LifecycleCallbacks,
        options: CreateOptions,
    ) -> Self {
        let rate_variance = ctx.config.rapid_rate_variance.abs();
        let pan_variance = ctx.config.rapid_pan_variance.abs().min(1.0);
        let inner = Arc::new(RapidInner {
            core: ContainerCore::new(ctx, Variant::Rapid, callbacks),
            effects,
            selector: Mutex::new(NoRepeatSelector::new(options.previous_effect)),
            prepared: Mutex::new(None),
            voices: Mutex::new(HashMap::new()),
            next_key: AtomicU64::new(0),
            plays: AtomicU64::new(0),
            rate_variance,
            pan_variance,
        });

        let this = Self { inner };
        let prepared = this.spawn_voice();
        *lock(&this.inner.prepared) = prepared;
        this
    }

    pub(crate) fn core(&self) -> &ContainerCore {
        &self.inner.core
    }

    fn handle(&self) -> Container {
        Container::Rapid(self.clone())
    }

    /// Voices currently sounding
    pub fn active_voices(&self) -> usize {
        lock(&self.inner.voices).len()
    }

    /// Build and preload a voice for the next trigger
    fn spawn_voice(&self) -> Option<(u64, Voice)> {
        let inner = &self.inner;
        let descriptor = lock(&inner.selector).pick(&inner.effects)?.clone();
        let ctx = &inner.core.ctx;
        let route = ctx.routing.select(&ctx.graph);
        let player = VoicePlayer::new(Arc::clone(ctx), descriptor, route, inner.core.level());

        let mut rng = rand::thread_rng();
        let rate = 1.0 + rng.gen_range(-inner.rate_variance..=inner.rate_variance);
        let pan = rng.gen_range(-inner.pan_variance..=inner.pan_variance);
        player.set_rate(rate.max(0.05));
        player.set_pan(pan);

        let key = inner.next_key.fetch_add(1, Ordering::Relaxed);
        let weak = Arc::downgrade(inner);
        let observed = player.clone();
        let events = player.subscribe(move |event| {
            if let Some(inner) = Weak::upgrade(&weak) {
                RapidContainer { inner }.on_node_event(key, &observed, event);
            }
        });

        debug!(container = %inner.core.id, effect = %player.effect_id(), rate, pan, "Rapid voice prepared");
        player.preload();
        Some((
            key,
            Voice {
                player,
                _events: events,
            },
        ))
    }

    fn on_node_event(&self, key: u64, player: &VoicePlayer, event: &NodeEvent) {
        let core = &self.inner.core;
        let container = self.handle();
        match event {
            NodeEvent::Loaded { .. } => {
                if core.load_status() == LoadStatus::Pending {
                    core.loaded(&container, Some(player.effect_id().clone()));
                }
            }
            NodeEvent::Playing => {
                core.set_loaded_effect(player.effect_id().clone());
                core.playing(&container);
            }
            NodeEvent::Error(err) => {
                if core.load_status() == LoadStatus::Pending && self.active_voices() == 0 {
                    core.load_failed(&container, err.clone());
                } else {
                    core.error(&container, err.clone());
                }
            }
            NodeEvent::Stopped => {
                let (was_active, remaining) = {
                    let mut voices = lock(&self.inner.voices);
                    let removed = voices.remove(&key);
                    (removed.is_some(), voices.len())
                };
                if was_active && remaining == 0 {
                    core.stopped(&container, player.state() == NodeState::Error);
                }
            }
            NodeEvent::DurationChanged(_) => {}
        }
    }

    fn all_players(&self) -> Vec<VoicePlayer> {
        let mut players: Vec<VoicePlayer> = lock(&self.inner.voices)
            .values()
            .map(|v| v.player.clone())
            .collect();
        if let Some((_, voice)) = lock(&self.inner.prepared).as_ref() {
            players.push(voice.player.clone());
        }
        players
    }
}

impl fmt::Debug for RapidContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RapidContainer")
            .field("id", &self.inner.core.id)
            .field("active_voices", &self.active_voices())
            .finish()
    }
}

#[async_trait]
impl EffectContainer for RapidContainer {
    fn id(&self) -> &InstanceId {
        &self.inner.core.id
    }

    fn variant(&self) -> Variant {
        Variant::Rapid
    }

    async fn play(&self) {
        // A spare that failed to load is already stopped
        let prepared = lock(&self.inner.prepared)
            .take()
            .filter(|(_, voice)| !voice.player.node().is_stopped());
        let Some((key, voice)) = prepared.or_else(|| self.spawn_voice()) else {
            return;
        };

        let player = voice.player.clone();
        lock(&self.inner.voices).insert(key, voice);
        self.inner.core.begin_play();

        // Repeated triggers should not wait for decoding
        if self.inner.plays.fetch_add(1, Ordering::AcqRel) > 0 {
            let next = self.spawn_voice();
            let stale = std::mem::replace(&mut *lock(&self.inner.prepared), next);
            if let Some((_, voice)) = stale {
                voice.player.stop();
            }
        }

        if !player.play(Duration::ZERO).await {
            let (was_active, remaining) = {
                let mut voices = lock(&self.inner.voices);
                let removed = voices.remove(&key);
                (removed.is_some(), voices.len())
            };
            if was_active && remaining == 0 {
                self.inner.core.stopped(&self.handle(), true);
            }
        }
    }

    fn stop(&self) {
        let stopping: Vec<Voice> = lock(&self.inner.voices).drain().map(|(_, v)| v).collect();
        for voice in &stopping {
            voice.player.stop();
        }
        self.inner.core.stopped(&self.handle(), false);
    }

    fn change_volume(&self, level: f32) {
        let level = self.inner.core.set_level(level);
        for player in self.all_players() {
            player.set_level(level);
        }
    }

    fn fade(&self, ratio: f32, over: Duration) {
        let players: Vec<VoicePlayer> = lock(&self.inner.voices)
            .values()
            .map(|v| v.player.clone())
            .collect();
        for player in players {
            player.fade(ratio, over);
        }
    }

    async fn duration(&self) -> Duration {
        let prepared = lock(&self.inner.prepared)
            .as_ref()
            .map(|(_, v)| v.player.clone());
        let player = prepared.or_else(|| {
            lock(&self.inner.voices)
                .values()
                .next()
                .map(|v| v.player.clone())
        });
        match player {
            Some(player) => player.duration().await,
            None => Duration::ZERO,
        }
    }

    fn loaded_effect_id(&self) -> Option<EffectId> {
        self.inner.core.loaded_effect()
    }
}
