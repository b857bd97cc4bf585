//! Sequence variant: delays and group steps on a timeline
//!
//! Each group step is backed by an internal Default container. Preparation
//! loads every step (bounded), measures it and lays out the timeline; `play`
//! then fires every step at its offset. A finished or stopped sequence
//! prepares itself again so that a replay picks fresh effects; only the
//! latest preparation is published.

use super::{lock, Container, ContainerCore, DefaultContainer, EffectContainer};
use crate::engine::EngineContext;
use crate::error::PlaybackError;
use crate::events::{ContainerEvent, ContainerEventKind, LifecycleCallbacks, Subscription};
use crate::timeline::SequenceTimeline;
use crate::timers::TimerSet;
use async_trait::async_trait;
use foley_core::{ElementId, EffectId, InstanceId, SequenceElement, SequencePlan, Variant};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

struct Step {
    container: DefaultContainer,
    _events: Subscription,
}

struct Prepared {
    steps: HashMap<ElementId, Step>,
    timeline: SequenceTimeline,
}

#[derive(Default)]
struct Running {
    started: HashSet<ElementId>,
    end_reached: bool,
}

struct SequenceInner {
    core: ContainerCore,
    plan: SequencePlan,
    prepared: watch::Sender<Option<Arc<Prepared>>>,
    prepare_generation: AtomicU64,
    active: AtomicBool,
    session: AtomicU64,
    timers: TimerSet,
    running: Mutex<Running>,
}

/// Scripted timeline of delays and group steps
#[derive(Clone)]
pub struct SequenceContainer {
    inner: Arc<SequenceInner>,
}

impl SequenceContainer {
    pub(crate) fn new(
        ctx: Arc<EngineContext>,
        plan: SequencePlan,
        callbacks: LifecycleCallbacks,
    ) -> Self {
        let (prepared, _) = watch::channel(None);
        let this = Self {
            inner: Arc::new(SequenceInner {
                core: ContainerCore::new(ctx, Variant::Sequence, callbacks),
                plan,
                prepared,
                prepare_generation: AtomicU64::new(0),
                active: AtomicBool::new(false),
                session: AtomicU64::new(0),
                timers: TimerSet::new(),
                running: Mutex::new(Running::default()),
            }),
        };
        this.spawn_prepare();
        this
    }

    pub(crate) fn core(&self) -> &ContainerCore {
        &self.inner.core
    }

    fn handle(&self) -> Container {
        Container::Sequence(self.clone())
    }

    fn is_current(&self, session: u64) -> bool {
        self.inner.active.load(Ordering::Acquire)
            && self.inner.session.load(Ordering::Acquire) == session
    }

    /// Timeline of the prepared schedule, if preparation finished
    pub fn timeline(&self) -> Option<SequenceTimeline> {
        self.inner
            .prepared
            .borrow()
            .as_ref()
            .map(|p| p.timeline.clone())
    }

    fn spawn_prepare(&self) {
        let mut generation = 0;
        self.inner.prepared.send_modify(|prepared| {
            generation = self.inner.prepare_generation.fetch_add(1, Ordering::AcqRel) + 1;
            *prepared = None;
        });
        let weak = Arc::downgrade(&self.inner);
        self.inner.core.ctx.runtime.spawn(async move {
            if let Some(inner) = Weak::upgrade(&weak) {
                SequenceContainer { inner }.prepare(generation).await;
            }
        });
    }

    async fn prepare(&self, generation: u64) {
        let ctx = Arc::clone(&self.inner.core.ctx);
        let bound = ctx.config.sequence_load_timeout();

        let mut pending = Vec::new();
        for element in &self.inner.plan.elements {
            let SequenceElement::Group { id, target } = element else {
                continue;
            };
            let effects = self.inner.plan.effects_for(target).to_vec();
            if effects.is_empty() {
                warn!(element = %id, group = %target, "Sequence step has no effects, dropping");
                continue;
            }

            let callbacks = LifecycleCallbacks::new(self.inner.core.correlation_id());
            let step = DefaultContainer::new(Arc::clone(&ctx), effects, callbacks);
            step.change_volume(self.inner.core.level());
            let measuring = step.clone();
            let measured = ctx.runtime.spawn(async move {
                if measuring.core().wait_loaded(bound).await {
                    Some(measuring.duration().await)
                } else {
                    None
                }
            });
            pending.push((id.clone(), step, measured));
        }

        let mut durations = HashMap::new();
        let mut steps = HashMap::new();
        for (id, step, measured) in pending {
            match measured.await {
                Ok(Some(duration)) => {
                    let events = self.observe_step(&id, &step);
                    durations.insert(id.clone(), duration);
                    steps.insert(
                        id,
                        Step {
                            container: step,
                            _events: events,
                        },
                    );
                }
                Ok(None) => {
                    let err = PlaybackError::ScheduleTimeout {
                        element: id.clone(),
                        timeout: bound,
                    };
                    warn!(container = %self.inner.core.id, error = %err, "Dropping sequence step");
                    step.stop();
                }
                Err(err) => {
                    warn!(container = %self.inner.core.id, element = %id, error = %err, "Step measurement failed");
                    step.stop();
                }
            }
        }

        let timeline = SequenceTimeline::build(&self.inner.plan.elements, &durations);
        let fresh = Arc::new(Prepared { steps, timeline });
        let published = self.inner.prepared.send_if_modified(|prepared| {
            if self.inner.prepare_generation.load(Ordering::Acquire) != generation {
                return false;
            }
            *prepared = Some(Arc::clone(&fresh));
            true
        });
        if !published {
            debug!(container = %self.inner.core.id, generation, "Discarding superseded preparation");
            for step in fresh.steps.values() {
                step.container.retire();
            }
            return;
        }

        info!(
            container = %self.inner.core.id,
            steps = fresh.timeline.entries().len(),
            end = ?fresh.timeline.end(),
            "Sequence prepared"
        );
        self.inner.core.loaded(&self.handle(), None);
    }

    fn observe_step(&self, id: &ElementId, step: &DefaultContainer) -> Subscription {
        let weak = Arc::downgrade(&self.inner);
        let element = id.clone();
        Container::Default(step.clone()).subscribe(move |event| {
            if let Some(inner) = Weak::upgrade(&weak) {
                SequenceContainer { inner }.on_step_event(&element, event);
            }
        })
    }

    fn on_step_event(&self, element: &ElementId, event: &ContainerEvent) {
        let core = &self.inner.core;
        let container = self.handle();
        match &event.kind {
            ContainerEventKind::Playing => {
                if self.inner.active.load(Ordering::Acquire) {
                    core.emit(&container, ContainerEventKind::Playing, Some(element.clone()));
                }
            }
            ContainerEventKind::Stopped => {
                let was_started = lock(&self.inner.running).started.remove(element);
                if was_started {
                    core.emit(&container, ContainerEventKind::Stopped, Some(element.clone()));
                    self.check_finished();
                }
            }
            ContainerEventKind::Error(err) => {
                core.emit(
                    &container,
                    ContainerEventKind::Error(err.clone()),
                    Some(element.clone()),
                );
            }
            ContainerEventKind::Loaded | ContainerEventKind::Crossfade { .. } => {}
        }
    }

    fn check_finished(&self) {
        let finished = {
            let running = lock(&self.inner.running);
            running.end_reached && running.started.is_empty()
        };
        if finished && self.inner.active.swap(false, Ordering::AcqRel) {
            debug!(container = %self.inner.core.id, "Sequence finished");
            self.inner.timers.clear();
            self.inner.core.stopped(&self.handle(), false);
            self.spawn_prepare();
        }
    }

    async fn wait_prepared(&self) -> Option<Arc<Prepared>> {
        let mut rx = self.inner.prepared.subscribe();
        let prepared = rx.wait_for(Option::is_some).await.ok()?;
        prepared.as_ref().map(Arc::clone)
    }
}

impl fmt::Debug for SequenceContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceContainer")
            .field("id", &self.inner.core.id)
            .field("steps", &self.inner.plan.elements.len())
            .field("active", &self.inner.active.load(Ordering::Acquire))
            .finish()
    }
}

#[async_trait]
impl EffectContainer for SequenceContainer {
    fn id(&self) -> &InstanceId {
        &self.inner.core.id
    }

    fn variant(&self) -> Variant {
        Variant::Sequence
    }

    async fn play(&self) {
        if self.inner.active.swap(true, Ordering::AcqRel) {
            return;
        }
        let session = self.inner.session.fetch_add(1, Ordering::AcqRel) + 1;
        self.inner.core.begin_play();
        *lock(&self.inner.running) = Running::default();

        let Some(prepared) = self.wait_prepared().await else {
            return;
        };
        if !self.is_current(session) {
            return;
        }

        let container = self.handle();
        self.inner.core.playing(&container);

        let runtime = self.inner.core.ctx.runtime.clone();
        let start = Instant::now();
        for entry in prepared.timeline.entries() {
            let Some(step) = prepared.steps.get(&entry.element) else {
                continue;
            };
            let step = step.container.clone();
            let element = entry.element.clone();
            let this = self.clone();
            self.inner
                .timers
                .schedule_at(&runtime, start + entry.offset, async move {
                    {
                        // stop() flips `active` under the same lock
                        let mut running = lock(&this.inner.running);
                        if !this.is_current(session) {
                            return;
                        }
                        running.started.insert(element);
                    }
                    step.play().await;
                });
        }

        let this = self.clone();
        self.inner
            .timers
            .schedule_at(&runtime, start + prepared.timeline.end(), async move {
                if !this.is_current(session) {
                    return;
                }
                lock(&this.inner.running).end_reached = true;
                this.check_finished();
            });
    }

    fn stop(&self) {
        let was_active = {
            let _running = lock(&self.inner.running);
            self.inner.active.swap(false, Ordering::AcqRel)
        };
        if !was_active {
            self.inner.core.stopped(&self.handle(), false);
            return;
        }
        self.inner.timers.clear();

        // Steps whose timer already fired must not start after this point
        let prepared = self.inner.prepared.borrow().clone();
        if let Some(prepared) = prepared {
            for step in prepared.steps.values() {
                step.container.retire();
            }
        }
        lock(&self.inner.running).started.clear();

        self.inner.core.stopped(&self.handle(), false);
        self.spawn_prepare();
    }

    fn change_volume(&self, level: f32) {
        let level = self.inner.core.set_level(level);
        let prepared = self.inner.prepared.borrow().clone();
        if let Some(prepared) = prepared {
            for step in prepared.steps.values() {
                step.container.change_volume(level);
            }
        }
    }

    fn fade(&self, ratio: f32, over: Duration) {
        let prepared = self.inner.prepared.borrow().clone();
        if let Some(prepared) = prepared {
            for step in prepared.steps.values() {
                step.container.fade(ratio, over);
            }
        }
    }

    async fn duration(&self) -> Duration {
        let bound = self.inner.core.ctx.config.sequence_load_timeout();
        match timeout(bound, self.wait_prepared()).await {
            Ok(Some(prepared)) => prepared.timeline.end(),
            _ => Duration::ZERO,
        }
    }

    fn loaded_effect_id(&self) -> Option<EffectId> {
        None
    }
}
