//! Live instances per group
//!
//! Only Rapid groups may sound more than once at a time. Triggering a running
//! Looping, Soundtrack or Sequence group stops it; triggering a Default group
//! replaces the running instance.

use anyhow::Context;
use foley_core::{EffectCatalog, EffectId, GroupId, PlaybackRequest, Variant};
use foley_playback::{Container, CreateOptions, EffectContainer, Engine, LifecycleCallbacks};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, info, warn};

#[derive(Default)]
struct State {
    instances: HashMap<GroupId, Vec<Container>>,
    levels: HashMap<GroupId, f32>,
    previous: HashMap<GroupId, EffectId>,
}

impl State {
    fn remove(&mut self, group: &GroupId, container: &Container) {
        if let Some(list) = self.instances.get_mut(group) {
            list.retain(|c| !c.same_instance(container));
            if list.is_empty() {
                self.instances.remove(group);
            }
        }
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What a trigger did
#[derive(Debug)]
pub enum Triggered {
    /// A new instance was created and is starting
    Started(Container),
    /// The running instance was stopped instead
    Toggled,
}

/// Tracks which containers belong to which group
///
/// Container methods are never called while the state lock is held: a
/// synchronous `Stopped` callback takes the same lock.
#[derive(Clone, Default)]
pub struct Registry {
    state: Arc<Mutex<State>>,
}

impl Registry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger `group`, honoring its variant's instance policy
    pub fn trigger<C>(
        &self,
        engine: &Engine,
        catalog: &C,
        group: &GroupId,
    ) -> anyhow::Result<Triggered>
    where
        C: EffectCatalog + ?Sized,
    {
        let request = PlaybackRequest::from_catalog(catalog, group)
            .with_context(|| format!("resolving group '{group}'"))?;
        let variant = request.variant;

        let (running, level, previous) = {
            let state = lock(&self.state);
            (
                state.instances.get(group).cloned().unwrap_or_default(),
                state.levels.get(group).copied(),
                state.previous.get(group).cloned(),
            )
        };

        let mut options = CreateOptions::default();
        if variant.allows_overlap() {
            let last = running
                .last()
                .and_then(EffectContainer::loaded_effect_id)
                .or(previous);
            options = options.with_previous_effect(last);
        } else {
            let toggles = matches!(
                variant,
                Variant::Looping | Variant::Soundtrack | Variant::Sequence
            );
            if toggles && running.iter().any(Container::is_active) {
                info!(group = %group, variant = %variant, "Stopping running group");
                for container in &running {
                    container.stop();
                }
                return Ok(Triggered::Toggled);
            }
            for container in &running {
                container.stop();
            }
        }

        let container = engine
            .create(request, self.callbacks(group), options)
            .with_context(|| format!("creating player for group '{group}'"))?;
        if let Some(level) = level {
            container.change_volume(level);
        }

        lock(&self.state)
            .instances
            .entry(group.clone())
            .or_default()
            .push(container.clone());

        let state = Arc::downgrade(&self.state);
        let group_id = group.clone();
        let player = container.clone();
        tokio::spawn(async move {
            player.play().await;
            // A load failure can report Stopped before the instance was listed
            if !player.is_active() {
                if let Some(state) = state.upgrade() {
                    lock(&state).remove(&group_id, &player);
                }
            }
        });

        Ok(Triggered::Started(container))
    }

    fn callbacks(&self, group: &GroupId) -> LifecycleCallbacks {
        let state: Weak<Mutex<State>> = Arc::downgrade(&self.state);
        let group_id = group.clone();
        let playing_group = group.clone();
        LifecycleCallbacks::new(group.as_str())
            .on_playing(move |tag, container| {
                if tag == playing_group.as_str() {
                    info!(group = tag, container = %container.id(), variant = %container.variant(), "Playing");
                } else {
                    info!(group = %playing_group, element = tag, "Step playing");
                }
            })
            .on_error(|group, err, _| {
                warn!(group, error = %err, "Playback error");
            })
            .on_stopped(move |group, container| {
                // Sequence steps report under their element id
                if group != group_id.as_str() {
                    debug!(group = %group_id, element = group, "Step stopped");
                    return;
                }
                debug!(group, container = %container.id(), "Stopped");
                let Some(state) = state.upgrade() else {
                    return;
                };
                let mut state = lock(&state);
                if let Some(effect) = container.loaded_effect_id() {
                    state.previous.insert(group_id.clone(), effect);
                }
                state.remove(&group_id, container);
            })
    }

    /// Stop every instance of `group`
    pub fn stop(&self, group: &GroupId) {
        let running = lock(&self.state)
            .instances
            .get(group)
            .cloned()
            .unwrap_or_default();
        for container in &running {
            container.stop();
        }
    }

    /// Stop everything
    pub fn stop_all(&self) {
        let running: Vec<Container> = lock(&self.state)
            .instances
            .values()
            .flatten()
            .cloned()
            .collect();
        info!(count = running.len(), "Stopping all groups");
        for container in &running {
            container.stop();
        }
    }

    /// Set the level of `group`, now and for later instances
    pub fn set_volume(&self, group: &GroupId, level: f32) {
        let level = level.clamp(0.0, 1.0);
        let running = {
            let mut state = lock(&self.state);
            state.levels.insert(group.clone(), level);
            state.instances.get(group).cloned().unwrap_or_default()
        };
        for container in &running {
            container.change_volume(level);
        }
    }

    /// Level set for `group`, full when never changed
    pub fn volume(&self, group: &GroupId) -> f32 {
        lock(&self.state).levels.get(group).copied().unwrap_or(1.0)
    }

    /// Number of listed instances of `group`
    pub fn instances(&self, group: &GroupId) -> usize {
        lock(&self.state).instances.get(group).map_or(0, Vec::len)
    }

    /// Groups with listed instances, sorted by id
    pub fn active_groups(&self) -> Vec<(GroupId, usize)> {
        let mut groups: Vec<_> = lock(&self.state)
            .instances
            .iter()
            .map(|(id, list)| (id.clone(), list.len()))
            .collect();
        groups.sort();
        groups
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("active_groups", &self.active_groups())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Board;
    use async_trait::async_trait;
    use foley_audio::{AudioGraph, BufferSource, SampleBuffer};
    use foley_core::{EffectDescriptor, EngineConfig};
    use foley_playback::{DurationHint, LoadedSource, PlaybackError, SourceLoader};
    use std::path::Path;
    use std::time::Duration;
    use tokio::task::JoinHandle;
    use tokio::time::{interval, sleep};

    const RATE: u32 = 8_000;

    const BOARD: &str = r#"
        [[groups]]
        id = "rain"
        variant = "looping"
        effects = [{ id = "rain", source = "rain.wav" }]

        [[groups]]
        id = "door"
        variant = "default"
        effects = [{ id = "door", source = "door.wav" }]

        [[groups]]
        id = "steps"
        variant = "rapid"
        effects = [
            { id = "step-1", source = "step1.wav" },
            { id = "step-2", source = "step2.wav" },
        ]

        [[groups]]
        id = "broken"
        variant = "default"
        effects = [{ id = "broken", source = "broken.wav" }]

        [[groups]]
        id = "scene"
        variant = "sequence"
        sequence = [
            { kind = "group", id = "knock", target = "door" },
            { kind = "delay", id = "pause", duration_ms = 500 },
            { kind = "group", id = "creak", target = "door" },
        ]
    "#;

    /// One second of silence per effect; "broken" fails to decode
    struct SilentLoader;

    #[async_trait]
    impl SourceLoader for SilentLoader {
        async fn load(
            &self,
            descriptor: &EffectDescriptor,
            sample_rate: u32,
        ) -> foley_playback::Result<LoadedSource> {
            if descriptor.id.as_str() == "broken" {
                return Err(PlaybackError::Decode("bad header".into()));
            }
            let length = Duration::from_secs(1);
            let buffer = Arc::new(SampleBuffer::silence(length, sample_rate));
            Ok(LoadedSource {
                source: Box::new(BufferSource::new(buffer, sample_rate)),
                duration: DurationHint::Known(length),
            })
        }
    }

    struct Fixture {
        engine: Engine,
        board: Board,
        registry: Registry,
        clock: JoinHandle<()>,
    }

    impl Fixture {
        fn new() -> Self {
            let config = EngineConfig {
                sample_rate: RATE,
                reverb_count: 1,
                reverb_seconds: 0.05,
                ..EngineConfig::default()
            };
            let graph = AudioGraph::dry(RATE);
            let engine = Engine::with_loader(config, graph.clone(), Arc::new(SilentLoader)).unwrap();
            let clock = tokio::spawn(async move {
                let mut out = vec![0.0; (RATE / 100) as usize * 2];
                let mut ticks = interval(Duration::from_millis(10));
                loop {
                    ticks.tick().await;
                    graph.render(&mut out);
                }
            });
            Self {
                engine,
                board: Board::parse(BOARD, Path::new("/sfx")).unwrap(),
                registry: Registry::new(),
                clock,
            }
        }

        fn trigger(&self, group: &str) -> Triggered {
            self.registry
                .trigger(&self.engine, &self.board, &GroupId::new(group))
                .unwrap()
        }

        fn instances(&self, group: &str) -> usize {
            self.registry.instances(&GroupId::new(group))
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            self.clock.abort();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn looping_group_toggles() {
        let fx = Fixture::new();

        assert!(matches!(fx.trigger("rain"), Triggered::Started(_)));
        sleep(Duration::from_millis(100)).await;
        assert_eq!(fx.instances("rain"), 1);

        assert!(matches!(fx.trigger("rain"), Triggered::Toggled));
        sleep(Duration::from_secs(1)).await;
        assert_eq!(fx.instances("rain"), 0);

        assert!(matches!(fx.trigger("rain"), Triggered::Started(_)));
        sleep(Duration::from_millis(100)).await;
        assert_eq!(fx.instances("rain"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn default_group_restarts_instead_of_stacking() {
        let fx = Fixture::new();

        let Triggered::Started(first) = fx.trigger("door") else {
            panic!("expected a new instance");
        };
        sleep(Duration::from_millis(100)).await;
        let Triggered::Started(second) = fx.trigger("door") else {
            panic!("expected a new instance");
        };
        sleep(Duration::from_millis(100)).await;

        assert!(!first.is_active());
        assert!(second.is_active());
        assert_eq!(fx.instances("door"), 1);

        // Natural end clears the listing
        sleep(Duration::from_secs(2)).await;
        assert_eq!(fx.instances("door"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_group_overlaps() {
        let fx = Fixture::new();
        for _ in 0..3 {
            fx.trigger("steps");
            sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(fx.instances("steps"), 3);

        fx.registry.stop_all();
        sleep(Duration::from_millis(100)).await;
        assert!(fx.registry.active_groups().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sequence_stays_listed_while_steps_end() {
        let fx = Fixture::new();
        assert!(matches!(fx.trigger("scene"), Triggered::Started(_)));

        // First step ended, second not yet started
        sleep(Duration::from_millis(1_200)).await;
        assert_eq!(fx.instances("scene"), 1);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(fx.instances("scene"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_load_is_not_listed() {
        let fx = Fixture::new();
        fx.trigger("broken");
        sleep(Duration::from_secs(1)).await;
        assert_eq!(fx.instances("broken"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_group_is_an_error() {
        let fx = Fixture::new();
        let err = fx
            .registry
            .trigger(&fx.engine, &fx.board, &GroupId::new("thunder"))
            .unwrap_err();
        assert!(err.to_string().contains("thunder"));
    }

    #[tokio::test(start_paused = true)]
    async fn volume_is_remembered_per_group() {
        let fx = Fixture::new();
        let rain = GroupId::new("rain");
        assert!((fx.registry.volume(&rain) - 1.0).abs() < f32::EPSILON);

        fx.registry.set_volume(&rain, 0.4);
        fx.registry.set_volume(&GroupId::new("door"), 7.0);

        assert!((fx.registry.volume(&rain) - 0.4).abs() < f32::EPSILON);
        assert!((fx.registry.volume(&GroupId::new("door")) - 1.0).abs() < f32::EPSILON);
    }
}
