//! One voice at a time: shared by the Default and Looping variants

use super::{lock, Container, ContainerCore, LoadStatus};
use crate::engine::EngineContext;
use crate::events::{LifecycleCallbacks, NodeEvent, Subscription};
use crate::node::NodeState;
use crate::shuffle::pick_uniform;
use crate::timers::TimerSet;
use crate::voice::VoicePlayer;
use foley_core::{EffectDescriptor, Variant};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tracing::debug;

/// Fade and loop behavior of a single-voice container
#[derive(Debug, Clone, Copy)]
pub(crate) struct SinglePolicy {
    pub looping: bool,
    pub fade_in: Duration,
    pub fade_out: Duration,
}

struct Slot {
    player: VoicePlayer,
    _events: Subscription,
}

pub(crate) struct SingleVoice {
    pub(crate) core: ContainerCore,
    effects: Vec<EffectDescriptor>,
    policy: SinglePolicy,
    slot: Mutex<Option<Slot>>,
    generation: AtomicU64,
    stopping: AtomicBool,
    retired: AtomicBool,
    timers: TimerSet,
    wrap: fn(Arc<SingleVoice>) -> Container,
}

impl SingleVoice {
    pub(crate) fn create(
        ctx: Arc<EngineContext>,
        variant: Variant,
        effects: Vec<EffectDescriptor>,
        callbacks: LifecycleCallbacks,
        policy: SinglePolicy,
        wrap: fn(Arc<SingleVoice>) -> Container,
    ) -> Arc<Self> {
        let this = Arc::new(Self {
            core: ContainerCore::new(ctx, variant, callbacks),
            effects,
            policy,
            slot: Mutex::new(None),
            generation: AtomicU64::new(0),
            stopping: AtomicBool::new(false),
            retired: AtomicBool::new(false),
            timers: TimerSet::new(),
            wrap,
        });
        this.prepare();
        this
    }

    fn handle(self: &Arc<Self>) -> Container {
        (self.wrap)(Arc::clone(self))
    }

    fn ctx(&self) -> &Arc<EngineContext> {
        &self.core.ctx
    }

    fn current(&self) -> Option<VoicePlayer> {
        lock(&self.slot).as_ref().map(|s| s.player.clone())
    }

    /// Pick an effect and start loading it into a fresh voice
    fn prepare(self: &Arc<Self>) -> Option<VoicePlayer> {
        let descriptor = pick_uniform(&self.effects)?.clone();
        let ctx = self.ctx();
        let route = ctx.routing.select(&ctx.graph);
        let player = VoicePlayer::new(Arc::clone(ctx), descriptor, route, self.core.level());
        player.set_looping(self.policy.looping);

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let weak = Arc::downgrade(self);
        let observed = player.clone();
        let events = player.subscribe(move |event| {
            if let Some(this) = Weak::upgrade(&weak) {
                this.on_node_event(generation, &observed, event);
            }
        });

        debug!(container = %self.core.id, effect = %player.effect_id(), "Preparing voice");
        player.preload();
        *lock(&self.slot) = Some(Slot {
            player: player.clone(),
            _events: events,
        });
        Some(player)
    }

    fn on_node_event(self: &Arc<Self>, generation: u64, player: &VoicePlayer, event: &NodeEvent) {
        if generation != self.generation.load(Ordering::Acquire) {
            return;
        }
        let container = self.handle();
        match event {
            NodeEvent::Loaded { .. } => {
                self.core
                    .loaded(&container, Some(player.effect_id().clone()));
            }
            NodeEvent::Playing => self.core.playing(&container),
            NodeEvent::Error(err) => {
                if self.core.load_status() == LoadStatus::Pending {
                    self.core.load_failed(&container, err.clone());
                } else {
                    self.core.error(&container, err.clone());
                }
            }
            NodeEvent::Stopped => {
                self.timers.clear();
                let failed = player.state() == NodeState::Error;
                self.core.stopped(&container, failed);
            }
            NodeEvent::DurationChanged(_) => {}
        }
    }

    pub(crate) async fn play(self: &Arc<Self>) {
        if self.retired.load(Ordering::Acquire) {
            return;
        }
        let reusable = lock(&self.slot)
            .as_ref()
            .filter(|s| matches!(s.player.state(), NodeState::Loading | NodeState::Ready))
            .map(|s| s.player.clone());

        let player = match reusable {
            Some(player) => player,
            None => {
                // End the previous voice first so its session reports Stopped
                if let Some(previous) = self.current() {
                    previous.stop();
                }
                match self.prepare() {
                    Some(player) => player,
                    None => return,
                }
            }
        };
        // A concurrent retire() stops the slot's voice
        if self.retired.load(Ordering::Acquire) {
            player.stop();
            return;
        }

        self.timers.clear();
        self.stopping.store(false, Ordering::Release);
        self.core.begin_play();
        player.play(self.policy.fade_in).await;
    }

    pub(crate) fn stop(self: &Arc<Self>) {
        let Some(player) = self.current() else {
            self.core.stopped(&self.handle(), false);
            return;
        };

        if !self.policy.fade_out.is_zero() && player.state() == NodeState::Playing {
            if self.stopping.swap(true, Ordering::AcqRel) {
                return;
            }
            debug!(container = %self.core.id, fade = ?self.policy.fade_out, "Fading out");
            player.fade(0.0, self.policy.fade_out);
            let ending = player.clone();
            self.timers
                .schedule_after(&self.ctx().runtime, self.policy.fade_out, async move {
                    ending.stop();
                });
            return;
        }

        player.stop();
        self.core.stopped(&self.handle(), false);
    }

    /// Stop for good; later `play` calls do nothing
    pub(crate) fn retire(self: &Arc<Self>) {
        self.retired.store(true, Ordering::Release);
        self.timers.clear();
        if let Some(player) = self.current() {
            player.stop();
        }
        self.core.stopped(&self.handle(), false);
    }

    pub(crate) fn change_volume(&self, level: f32) {
        let level = self.core.set_level(level);
        if let Some(player) = self.current() {
            player.set_level(level);
        }
    }

    pub(crate) fn fade(&self, ratio: f32, over: Duration) {
        if let Some(player) = self.current() {
            player.fade(ratio, over);
        }
    }

    pub(crate) async fn duration(&self) -> Duration {
        match self.current() {
            Some(player) => player.duration().await,
            None => Duration::ZERO,
        }
    }

    pub(crate) fn current_gain(&self) -> Option<f32> {
        self.current().map(|p| p.current_gain())
    }

    pub(crate) fn current_state(&self) -> Option<NodeState> {
        lock(&self.slot).as_ref().map(|s| s.player.state())
    }
}
