//! Soundtrack variant: shuffled playlist with overlapping crossfades
//!
//! The current track is scheduled against its measured length: at
//! `length - window` it fades out while the (already preloaded) next track
//! fades in over the same window, and at `length` it is hard-stopped. The
//! incoming track then becomes current and the cycle repeats.

use super::{lock, Container, ContainerCore, EffectContainer, LoadStatus};
use crate::crossfade::CrossfadePlan;
use crate::engine::EngineContext;
use crate::error::PlaybackError;
use crate::events::{ContainerEventKind, LifecycleCallbacks, NodeEvent, Subscription};
use crate::shuffle::ShuffleDeck;
use crate::timers::TimerSet;
use crate::voice::VoicePlayer;
use async_trait::async_trait;
use foley_core::{EffectDescriptor, EffectId, InstanceId, Variant};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

struct Track {
    player: VoicePlayer,
    _events: Subscription,
}

struct SoundtrackInner {
    core: ContainerCore,
    deck: Mutex<ShuffleDeck<EffectDescriptor>>,
    crossfade: Duration,
    stop_fade: Duration,
    active: AtomicBool,
    announced: AtomicBool,
    session: AtomicU64,
    timers: TimerSet,
    teardown: TimerSet,
    current: Mutex<Option<Track>>,
    next: Mutex<Option<Track>>,
    outgoing: Mutex<Vec<Track>>,
}

/// Endless shuffled playlist with gapless crossfades
#[derive(Clone)]
pub struct SoundtrackContainer {
    inner: Arc<SoundtrackInner>,
}

impl SoundtrackContainer {
    pub(crate) fn new(
        ctx: Arc<EngineContext>,
        effects: Vec<EffectDescriptor>,
        callbacks: LifecycleCallbacks,
        crossfade: Duration,
    ) -> Self {
        let stop_fade = ctx.config.soundtrack_stop_fade();
        let inner = Arc::new(SoundtrackInner {
            core: ContainerCore::new(ctx, Variant::Soundtrack, callbacks),
            deck: Mutex::new(ShuffleDeck::new(effects)),
            crossfade,
            stop_fade,
            active: AtomicBool::new(false),
            announced: AtomicBool::new(false),
            session: AtomicU64::new(0),
            timers: TimerSet::new(),
            teardown: TimerSet::new(),
            current: Mutex::new(None),
            next: Mutex::new(None),
            outgoing: Mutex::new(Vec::new()),
        });

        let this = Self { inner };
        this.preload_next();
        this
    }

    pub(crate) fn core(&self) -> &ContainerCore {
        &self.inner.core
    }

    fn handle(&self) -> Container {
        Container::Soundtrack(self.clone())
    }

    /// Crossfade length requested for this soundtrack
    pub fn crossfade(&self) -> Duration {
        self.inner.crossfade
    }

    /// Effect of the track currently leading the mix
    pub fn current_effect(&self) -> Option<EffectId> {
        lock(&self.inner.current)
            .as_ref()
            .map(|t| t.player.effect_id().clone())
    }

    fn is_current(&self, session: u64) -> bool {
        self.inner.active.load(Ordering::Acquire)
            && self.inner.session.load(Ordering::Acquire) == session
    }

    fn prepare_track(&self) -> Option<Track> {
        let descriptor = lock(&self.inner.deck).draw()?;
        let ctx = &self.inner.core.ctx;
        let route = ctx.routing.select(&ctx.graph);
        let player = VoicePlayer::new(Arc::clone(ctx), descriptor, route, self.inner.core.level());

        let weak = Arc::downgrade(&self.inner);
        let observed = player.clone();
        let events = player.subscribe(move |event| {
            if let Some(inner) = Weak::upgrade(&weak) {
                SoundtrackContainer { inner }.on_node_event(&observed, event);
            }
        });
        player.preload();
        Some(Track {
            player,
            _events: events,
        })
    }

    fn on_node_event(&self, player: &VoicePlayer, event: &NodeEvent) {
        let core = &self.inner.core;
        match event {
            NodeEvent::Loaded { .. } if core.load_status() == LoadStatus::Pending => {
                core.loaded(&self.handle(), Some(player.effect_id().clone()));
            }
            NodeEvent::Error(err) => {
                warn!(container = %core.id, effect = %player.effect_id(), error = %err, "Soundtrack track failed");
            }
            _ => {}
        }
    }

    fn preload_next(&self) {
        let mut next = lock(&self.inner.next);
        if next.is_none() {
            *next = self.prepare_track();
        }
    }

    fn take_next(&self) -> Option<Track> {
        let prepared = lock(&self.inner.next).take();
        prepared.or_else(|| self.prepare_track())
    }

    /// Play `track` as the new current track and schedule its hand-over
    fn advance(self, session: u64, track: Track, fade_in: Duration, failures: usize) -> BoxFuture {
        Box::pin(async move {
            let player = track.player.clone();
            if !self.is_current(session) {
                player.stop();
                return;
            }
            *lock(&self.inner.current) = Some(track);

            let started = player.play(fade_in).await;
            if !self.is_current(session) {
                return;
            }
            if !started {
                self.skip(session, failures + 1).await;
                return;
            }
            let started_at = Instant::now();

            if !self.inner.announced.swap(true, Ordering::AcqRel) {
                self.inner.core.playing(&self.handle());
            }
            self.preload_next();

            let duration = player.duration().await;
            if !self.is_current(session) {
                return;
            }
            if duration.is_zero() {
                warn!(container = %self.inner.core.id, effect = %player.effect_id(), "Track has no length, skipping");
                player.stop();
                self.skip(session, failures + 1).await;
                return;
            }

            let plan = CrossfadePlan::new(duration, self.inner.crossfade);
            debug!(
                container = %self.inner.core.id,
                effect = %player.effect_id(),
                ?duration,
                window = ?plan.fade_window,
                "Track scheduled"
            );

            let runtime = self.inner.core.ctx.runtime.clone();
            let this = self.clone();
            self.inner
                .timers
                .schedule_at(&runtime, started_at + plan.fade_start, async move {
                    this.hand_over(session, plan.fade_window);
                });

            let ending = player.clone();
            let this = self.clone();
            self.inner
                .timers
                .schedule_at(&runtime, started_at + plan.stop_at, async move {
                    ending.stop();
                    lock(&this.inner.outgoing).retain(|t| !t.player.node().is_stopped());
                });
        })
    }

    /// Give up on the current track and move on, unless a whole deck failed
    async fn skip(&self, session: u64, failures: usize) {
        let deck_size = lock(&self.inner.deck).len();
        if failures >= deck_size.max(1) {
            let container = self.handle();
            self.inner.core.error(
                &container,
                PlaybackError::playback("no playable track in soundtrack"),
            );
            self.halt(Duration::ZERO);
            return;
        }
        let Some(next) = self.take_next() else {
            return;
        };
        self.clone()
            .advance(session, next, Duration::ZERO, failures)
            .await;
    }

    fn hand_over(&self, session: u64, window: Duration) {
        if !self.is_current(session) {
            return;
        }
        let Some(outgoing) = lock(&self.inner.current).take() else {
            return;
        };
        let Some(incoming) = self.take_next() else {
            *lock(&self.inner.current) = Some(outgoing);
            return;
        };

        let from = outgoing.player.effect_id().clone();
        let to = incoming.player.effect_id().clone();
        info!(container = %self.inner.core.id, %from, %to, ?window, "Crossfade");
        self.inner.core.emit(
            &self.handle(),
            ContainerEventKind::Crossfade { from, to, window },
            None,
        );

        outgoing.player.fade(0.0, window);
        lock(&self.inner.outgoing).push(outgoing);

        let runtime = self.inner.core.ctx.runtime.clone();
        runtime.spawn(self.clone().advance(session, incoming, window, 0));
    }

    /// Fade every sounding track out over `fade`, then hard-stop them
    fn halt(&self, fade: Duration) {
        if !self.inner.active.swap(false, Ordering::AcqRel) {
            self.inner.core.stopped(&self.handle(), false);
            return;
        }
        self.inner.timers.clear();

        let mut sounding: Vec<Track> = lock(&self.inner.outgoing).drain(..).collect();
        if let Some(current) = lock(&self.inner.current).take() {
            sounding.push(current);
        }

        if fade.is_zero() {
            for track in &sounding {
                track.player.stop();
            }
        } else {
            for track in &sounding {
                track.player.fade(0.0, fade);
            }
            let runtime = self.inner.core.ctx.runtime.clone();
            self.inner.teardown.schedule_after(&runtime, fade, async move {
                for track in &sounding {
                    track.player.stop();
                }
            });
        }

        self.inner.core.stopped(&self.handle(), false);
    }
}

impl fmt::Debug for SoundtrackContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoundtrackContainer")
            .field("id", &self.inner.core.id)
            .field("active", &self.inner.active.load(Ordering::Acquire))
            .field("current", &self.current_effect())
            .field("crossfade", &self.inner.crossfade)
            .finish()
    }
}

#[async_trait]
impl EffectContainer for SoundtrackContainer {
    fn id(&self) -> &InstanceId {
        &self.inner.core.id
    }

    fn variant(&self) -> Variant {
        Variant::Soundtrack
    }

    async fn play(&self) {
        if self.inner.active.swap(true, Ordering::AcqRel) {
            return;
        }
        let session = self.inner.session.fetch_add(1, Ordering::AcqRel) + 1;
        self.inner.announced.store(false, Ordering::Release);
        self.inner.core.begin_play();

        let Some(first) = self.take_next() else {
            return;
        };
        self.clone()
            .advance(session, first, Duration::ZERO, 0)
            .await;
    }

    fn stop(&self) {
        self.halt(self.inner.stop_fade);
    }

    fn change_volume(&self, level: f32) {
        let level = self.inner.core.set_level(level);
        let mut players: Vec<VoicePlayer> = Vec::new();
        if let Some(track) = lock(&self.inner.current).as_ref() {
            players.push(track.player.clone());
        }
        if let Some(track) = lock(&self.inner.next).as_ref() {
            players.push(track.player.clone());
        }
        for player in players {
            player.set_level(level);
        }
    }

    fn fade(&self, ratio: f32, over: Duration) {
        let player = lock(&self.inner.current)
            .as_ref()
            .map(|t| t.player.clone());
        if let Some(player) = player {
            player.fade(ratio, over);
        }
    }

    async fn duration(&self) -> Duration {
        let current = lock(&self.inner.current)
            .as_ref()
            .map(|t| t.player.clone());
        let player =
            current.or_else(|| lock(&self.inner.next).as_ref().map(|t| t.player.clone()));
        match player {
            Some(player) => player.duration().await,
            None => Duration::ZERO,
        }
    }

    fn loaded_effect_id(&self) -> Option<EffectId> {
        self.current_effect()
            .or_else(|| self.inner.core.loaded_effect())
    }
}
