//! Shared fixtures: a fake loader producing silent sources and a render clock
//!
//! Tests run on paused Tokio time. The render clock pulls 10 ms of audio every
//! 10 ms so graph time (and therefore gain automation and natural voice ends)
//! advances together with the Tokio clock.

#![allow(dead_code)]

use async_trait::async_trait;
use foley_audio::{AudioGraph, BufferSource, SampleBuffer};
use foley_core::{EffectDescriptor, EffectId, EngineConfig, SourceRef};
use foley_playback::{
    Container, ContainerEvent, ContainerEventKind, DurationHint, Engine, LifecycleCallbacks,
    LoadedSource, PlaybackError, SourceLoader,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant};

pub const SAMPLE_RATE: u32 = 8_000;

/// Loader that never touches the filesystem
#[derive(Default)]
pub struct FakeLoader {
    lengths: HashMap<EffectId, Duration>,
    failing: HashSet<EffectId>,
    hanging: HashSet<EffectId>,
    failing_loads: HashSet<usize>,
    loads: AtomicUsize,
}

impl FakeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Length of the silent source produced for `id` (default one second)
    pub fn with_length(mut self, id: &str, length: Duration) -> Self {
        self.lengths.insert(EffectId::from(id), length);
        self
    }

    /// Loading `id` fails with a decode error
    pub fn failing(mut self, id: &str) -> Self {
        self.failing.insert(EffectId::from(id));
        self
    }

    /// Loading `id` never completes
    pub fn hanging(mut self, id: &str) -> Self {
        self.hanging.insert(EffectId::from(id));
        self
    }

    /// The `nth` load (counting from one) fails whatever the effect
    pub fn failing_load(mut self, nth: usize) -> Self {
        self.failing_loads.insert(nth);
        self
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceLoader for FakeLoader {
    async fn load(
        &self,
        descriptor: &EffectDescriptor,
        sample_rate: u32,
    ) -> foley_playback::Result<LoadedSource> {
        let nth = self.loads.fetch_add(1, Ordering::SeqCst) + 1;
        if self.hanging.contains(&descriptor.id) {
            std::future::pending::<()>().await;
        }
        if self.failing.contains(&descriptor.id) || self.failing_loads.contains(&nth) {
            return Err(PlaybackError::Decode(format!(
                "cannot decode {}",
                descriptor.id
            )));
        }

        let length = self
            .lengths
            .get(&descriptor.id)
            .copied()
            .unwrap_or(Duration::from_secs(1));
        let buffer = Arc::new(SampleBuffer::silence(length, sample_rate));
        Ok(LoadedSource {
            source: Box::new(BufferSource::new(buffer, sample_rate)),
            duration: DurationHint::Known(length),
        })
    }
}

pub fn effect(id: &str) -> EffectDescriptor {
    EffectDescriptor::new(id, SourceRef::path(format!("/sfx/{}.wav", id)))
}

pub fn test_config() -> EngineConfig {
    EngineConfig {
        sample_rate: SAMPLE_RATE,
        reverb_count: 2,
        reverb_seconds: 0.05,
        ..EngineConfig::default()
    }
}

/// Engine plus a running render clock; the clock stops on drop
pub struct Harness {
    pub engine: Engine,
    pub loader: Arc<FakeLoader>,
    clock: JoinHandle<()>,
}

impl Harness {
    pub fn new(loader: FakeLoader) -> Self {
        Self::with_config(loader, test_config())
    }

    pub fn with_config(loader: FakeLoader, config: EngineConfig) -> Self {
        let loader = Arc::new(loader);
        let graph = AudioGraph::dry(config.sample_rate);
        let engine = Engine::with_loader(config, graph.clone(), loader.clone()).unwrap();
        let clock = spawn_render_clock(graph);
        Self {
            engine,
            loader,
            clock,
        }
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.clock.abort();
    }
}

/// Pull 10 ms of audio from `graph` every 10 ms of Tokio time
pub fn spawn_render_clock(graph: AudioGraph) -> JoinHandle<()> {
    tokio::spawn(async move {
        let frames = (graph.sample_rate() / 100) as usize;
        let mut out = vec![0.0; frames * 2];
        let mut ticks = interval(Duration::from_millis(10));
        loop {
            ticks.tick().await;
            graph.render(&mut out);
        }
    })
}

/// Timestamped log of lifecycle callbacks and subscribed events
#[derive(Clone)]
pub struct Recorder {
    start: Instant,
    log: Arc<Mutex<Vec<(Duration, String)>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push(&self, entry: impl Into<String>) {
        let at = self.start.elapsed();
        self.log.lock().unwrap().push((at, entry.into()));
    }

    /// Callbacks logging `loaded`, `playing`, `stopped` and `error`
    ///
    /// Calls tagged with anything but `correlation_id` (sequence steps) are
    /// logged as `<label>@<tag>`.
    pub fn callbacks(&self, correlation_id: &str) -> LifecycleCallbacks {
        let label = {
            let own = correlation_id.to_string();
            move |kind: &str, tag: &str| {
                if tag == own {
                    kind.to_string()
                } else {
                    format!("{}@{}", kind, tag)
                }
            }
        };
        let (loaded, playing, stopped, failed) =
            (self.clone(), self.clone(), self.clone(), self.clone());
        let (l1, l2, l3, l4) = (label.clone(), label.clone(), label.clone(), label);
        LifecycleCallbacks::new(correlation_id)
            .on_loaded(move |tag, _| loaded.push(l1("loaded", tag)))
            .on_playing(move |tag, _| playing.push(l2("playing", tag)))
            .on_stopped(move |tag, _| stopped.push(l3("stopped", tag)))
            .on_error(move |tag, err, _| failed.push(format!("{}: {}", l4("error", tag), err)))
    }

    /// Log every event of `container`, element events as `<kind>:<element>`
    pub fn observe(&self, container: &Container) -> foley_playback::Subscription {
        let recorder = self.clone();
        container.subscribe(move |event: &ContainerEvent| {
            let kind = match &event.kind {
                ContainerEventKind::Loaded => "Loaded".to_string(),
                ContainerEventKind::Playing => "Playing".to_string(),
                ContainerEventKind::Stopped => "Stopped".to_string(),
                ContainerEventKind::Error(_) => "Error".to_string(),
                ContainerEventKind::Crossfade { from, to, .. } => {
                    format!("Crossfade {}->{}", from, to)
                }
            };
            match &event.element {
                Some(element) => recorder.push(format!("{}:{}", kind, element)),
                None => recorder.push(kind),
            }
        })
    }

    /// Time since the recorder was created
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn entries(&self) -> Vec<(Duration, String)> {
        self.log.lock().unwrap().clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.entries().into_iter().map(|(_, label)| label).collect()
    }

    pub fn count(&self, label: &str) -> usize {
        self.entries().iter().filter(|(_, l)| l == label).count()
    }

    /// Time of the first entry equal to `label`
    pub fn first(&self, label: &str) -> Option<Duration> {
        self.entries()
            .into_iter()
            .find(|(_, l)| l == label)
            .map(|(at, _)| at)
    }
}

/// Assert `actual` is within `tolerance` after `expected`
pub fn assert_near(actual: Duration, expected: Duration, tolerance: Duration) {
    assert!(
        actual >= expected && actual <= expected + tolerance,
        "expected {:?} (+{:?}), got {:?}",
        expected,
        tolerance,
        actual
    );
}
