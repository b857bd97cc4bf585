//! Variant policy containers
//!
//! Every group variant maps to one strategy struct. They share the
//! [`EffectContainer`] interface and are handed out as the closed
//! [`Container`] sum type, which is what lifecycle events carry.

mod default;
mod looping;
mod rapid;
mod sequence;
mod single;
mod soundtrack;

pub use default::DefaultContainer;
pub use looping::LoopingContainer;
pub use rapid::RapidContainer;
pub use sequence::SequenceContainer;
pub use soundtrack::SoundtrackContainer;

use crate::engine::EngineContext;
use crate::error::PlaybackError;
use crate::events::{
    ContainerEvent, ContainerEventKind, EventChannel, LifecycleCallbacks, Subscription,
};
use async_trait::async_trait;
use foley_core::{EffectId, ElementId, InstanceId, Variant};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, warn};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Extra construction parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOptions {
    /// Effect the previous Rapid instance of the same group played last
    #[serde(default)]
    pub previous_effect: Option<EffectId>,
}

impl CreateOptions {
    /// Seed the Rapid no-repeat selector
    #[must_use]
    pub fn with_previous_effect(mut self, effect: Option<EffectId>) -> Self {
        self.previous_effect = effect;
        self
    }
}

/// Operations common to every variant
///
/// Runtime failures are reported through events; none of these return errors.
#[async_trait]
pub trait EffectContainer: Send + Sync {
    /// Instance id
    fn id(&self) -> &InstanceId;

    /// Variant this container implements
    fn variant(&self) -> Variant;

    /// Start (or restart) playback; resolves once the first voice started or failed
    async fn play(&self);

    /// Stop according to the variant's policy; repeated calls are no-ops
    fn stop(&self);

    /// Set the container level, a ratio clamped to `0..=1`
    fn change_volume(&self, level: f32);

    /// Ramp sounding voices to `ratio` of their target over `over`
    fn fade(&self, ratio: f32, over: Duration);

    /// Length of what plays, zero when unknown
    async fn duration(&self) -> Duration;

    /// Effect most recently loaded or played
    fn loaded_effect_id(&self) -> Option<EffectId>;
}

/// Any variant container
#[derive(Debug, Clone)]
pub enum Container {
    /// One random effect, played once
    Default(DefaultContainer),
    /// One random effect, looped with fades
    Looping(LoopingContainer),
    /// Overlapping voices with jittered rate and pan
    Rapid(RapidContainer),
    /// Shuffled playlist with crossfades
    Soundtrack(SoundtrackContainer),
    /// Scripted delays and group steps
    Sequence(SequenceContainer),
}

impl Container {
    fn core(&self) -> &ContainerCore {
        match self {
            Self::Default(c) => c.core(),
            Self::Looping(c) => c.core(),
            Self::Rapid(c) => c.core(),
            Self::Soundtrack(c) => c.core(),
            Self::Sequence(c) => c.core(),
        }
    }

    fn as_dyn(&self) -> &dyn EffectContainer {
        match self {
            Self::Default(c) => c,
            Self::Looping(c) => c,
            Self::Rapid(c) => c,
            Self::Soundtrack(c) => c,
            Self::Sequence(c) => c,
        }
    }

    /// Instance id
    pub fn id(&self) -> &InstanceId {
        &self.core().id
    }

    /// Observe every event of this container
    pub fn subscribe(&self, f: impl Fn(&ContainerEvent) + Send + Sync + 'static) -> Subscription {
        self.core().events.subscribe(f)
    }

    /// Wait until the first source is ready; false on failure or after `bound`
    pub async fn wait_loaded(&self, bound: Duration) -> bool {
        self.core().wait_loaded(bound).await
    }

    /// Whether a play attempt is in progress and no `Stopped` has fired since
    pub fn is_active(&self) -> bool {
        self.core().is_active()
    }

    /// Stop and release every observer
    pub fn dispose(&self) {
        self.stop();
        self.core().events.clear();
    }

    /// Whether two handles refer to the same instance
    pub fn same_instance(&self, other: &Container) -> bool {
        self.id() == other.id()
    }
}

#[async_trait]
impl EffectContainer for Container {
    fn id(&self) -> &InstanceId {
        &self.core().id
    }

    fn variant(&self) -> Variant {
        self.core().variant
    }

    async fn play(&self) {
        self.as_dyn().play().await;
    }

    fn stop(&self) {
        self.as_dyn().stop();
    }

    fn change_volume(&self, level: f32) {
        self.as_dyn().change_volume(level);
    }

    fn fade(&self, ratio: f32, over: Duration) {
        self.as_dyn().fade(ratio, over);
    }

    async fn duration(&self) -> Duration {
        self.as_dyn().duration().await
    }

    fn loaded_effect_id(&self) -> Option<EffectId> {
        self.as_dyn().loaded_effect_id()
    }
}

/// Load progress of a container's first source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoadStatus {
    Pending,
    Loaded,
    Failed,
}

/// Bookkeeping shared by every variant
///
/// Guards the event ordering rules: `Stopped` fires at most once per play
/// attempt and never without one, except after a load failure.
pub(crate) struct ContainerCore {
    pub(crate) id: InstanceId,
    pub(crate) variant: Variant,
    pub(crate) ctx: Arc<EngineContext>,
    callbacks: LifecycleCallbacks,
    events: EventChannel<ContainerEvent>,
    load: watch::Sender<LoadStatus>,
    played: AtomicBool,
    stop_fired: AtomicBool,
    level: AtomicU32,
    loaded_effect: Mutex<Option<EffectId>>,
}

impl ContainerCore {
    pub(crate) fn new(
        ctx: Arc<EngineContext>,
        variant: Variant,
        callbacks: LifecycleCallbacks,
    ) -> Self {
        let (load, _) = watch::channel(LoadStatus::Pending);
        Self {
            id: InstanceId::generate(),
            variant,
            ctx,
            callbacks,
            events: EventChannel::new(),
            load,
            played: AtomicBool::new(false),
            stop_fired: AtomicBool::new(false),
            level: AtomicU32::new(1.0f32.to_bits()),
            loaded_effect: Mutex::new(None),
        }
    }

    pub(crate) fn correlation_id(&self) -> &str {
        self.callbacks.correlation_id()
    }

    pub(crate) fn emit(
        &self,
        container: &Container,
        kind: ContainerEventKind,
        element: Option<ElementId>,
    ) {
        self.callbacks.dispatch(&kind, element.as_ref(), container);
        self.events.emit(&ContainerEvent {
            kind,
            correlation_id: self.correlation_id().to_string(),
            element,
            container: container.clone(),
        });
    }

    pub(crate) fn loaded(&self, container: &Container, effect: Option<EffectId>) {
        if let Some(effect) = effect {
            self.set_loaded_effect(effect);
        }
        self.load.send_replace(LoadStatus::Loaded);
        debug!(container = %self.id, variant = %self.variant, "Container loaded");
        self.emit(container, ContainerEventKind::Loaded, None);
    }

    pub(crate) fn load_status(&self) -> LoadStatus {
        *self.load.borrow()
    }

    /// First source failed: report, then stop even though play never ran
    pub(crate) fn load_failed(&self, container: &Container, err: PlaybackError) {
        self.load.send_if_modified(|status| {
            if *status == LoadStatus::Pending {
                *status = LoadStatus::Failed;
                true
            } else {
                false
            }
        });
        self.error(container, err);
        self.stopped(container, true);
    }

    pub(crate) fn begin_play(&self) {
        self.played.store(true, Ordering::Release);
        self.stop_fired.store(false, Ordering::Release);
    }

    pub(crate) fn playing(&self, container: &Container) {
        debug!(container = %self.id, variant = %self.variant, "Container playing");
        self.emit(container, ContainerEventKind::Playing, None);
    }

    pub(crate) fn error(&self, container: &Container, err: PlaybackError) {
        warn!(container = %self.id, variant = %self.variant, error = %err, "Container error");
        self.emit(container, ContainerEventKind::Error(err), None);
    }

    /// Emit `Stopped` unless it already fired or no play was attempted
    pub(crate) fn stopped(&self, container: &Container, force: bool) {
        if !force && !self.played.load(Ordering::Acquire) {
            return;
        }
        if self.stop_fired.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!(container = %self.id, variant = %self.variant, "Container stopped");
        self.emit(container, ContainerEventKind::Stopped, None);
    }

    pub(crate) fn is_active(&self) -> bool {
        self.played.load(Ordering::Acquire) && !self.stop_fired.load(Ordering::Acquire)
    }

    pub(crate) fn set_level(&self, level: f32) -> f32 {
        let level = if level.is_nan() {
            0.0
        } else {
            level.clamp(0.0, 1.0)
        };
        self.level.store(level.to_bits(), Ordering::Release);
        level
    }

    pub(crate) fn level(&self) -> f32 {
        f32::from_bits(self.level.load(Ordering::Acquire))
    }

    pub(crate) fn set_loaded_effect(&self, effect: EffectId) {
        *lock(&self.loaded_effect) = Some(effect);
    }

    pub(crate) fn loaded_effect(&self) -> Option<EffectId> {
        lock(&self.loaded_effect).clone()
    }

    pub(crate) async fn wait_loaded(&self, bound: Duration) -> bool {
        let mut rx = self.load.subscribe();
        let loaded = match timeout(bound, rx.wait_for(|s| *s != LoadStatus::Pending)).await {
            Ok(Ok(status)) => *status == LoadStatus::Loaded,
            _ => false,
        };
        loaded
    }
}
