//! Mixing graph shared by the control plane and the audio thread
//!
//! Voices are connected either straight to the master bus or into one of the
//! pre-built reverb buses, whose convolvers feed the master bus. The control
//! side only ever adds and removes voices and adjusts their shared
//! `VoiceParams`; the audio thread calls `render`. When a voice runs out of
//! frames the graph reports it through the voice's oneshot channel.

use crate::convolution::Convolver;
use crate::error::{AudioError, Result};
use crate::param::AudioParam;
use crate::reverb::ReverbPool;
use crate::source::RenderSource;
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Handle of one connected voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(u64);

impl std::fmt::Display for VoiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "voice-{}", self.0)
    }
}

/// Where a voice's output goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Straight to the master bus
    Dry,
    /// Through reverb bus `n`
    Reverb(usize),
}

/// Why a voice left the graph on its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceEnd {
    /// Source ran out of frames
    Finished,
    /// Source failed while rendering
    Failed(String),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Live controls of one voice, shared between control plane and audio thread
#[derive(Debug)]
pub struct VoiceParams {
    volume: AtomicU32,
    rate: AtomicU32,
    pan: AtomicU32,
    looping: AtomicBool,
    gain: Mutex<AudioParam>,
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self::new()
    }
}

impl VoiceParams {
    /// Unity volume and rate, centered, not looping, gain stage at 1.0
    pub fn new() -> Self {
        Self {
            volume: AtomicU32::new(1.0f32.to_bits()),
            rate: AtomicU32::new(1.0f32.to_bits()),
            pan: AtomicU32::new(0.0f32.to_bits()),
            looping: AtomicBool::new(false),
            gain: Mutex::new(AudioParam::gain(1.0)),
        }
    }

    /// Primitive volume (0..=1)
    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Relaxed))
    }

    /// Set primitive volume, clamped to 0..=1
    pub fn set_volume(&self, volume: f32) {
        let volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        self.volume.store(volume.to_bits(), Ordering::Relaxed);
    }

    /// Playback rate multiplier
    pub fn rate(&self) -> f32 {
        f32::from_bits(self.rate.load(Ordering::Relaxed))
    }

    /// Set playback rate; non-positive or non-finite rates are ignored
    pub fn set_rate(&self, rate: f32) {
        if rate.is_finite() && rate > 0.0 {
            self.rate.store(rate.to_bits(), Ordering::Relaxed);
        }
    }

    /// Stereo balance (-1 = left, 1 = right)
    pub fn pan(&self) -> f32 {
        f32::from_bits(self.pan.load(Ordering::Relaxed))
    }

    /// Set stereo balance, clamped to -1..=1
    pub fn set_pan(&self, pan: f32) {
        let pan = if pan.is_nan() { 0.0 } else { pan.clamp(-1.0, 1.0) };
        self.pan.store(pan.to_bits(), Ordering::Relaxed);
    }

    /// Whether the source wraps at its end
    pub fn looping(&self) -> bool {
        self.looping.load(Ordering::Relaxed)
    }

    /// Enable or disable looping
    pub fn set_looping(&self, looping: bool) {
        self.looping.store(looping, Ordering::Relaxed);
    }

    /// Run `f` with the gain stage's automation locked
    pub fn with_gain<R>(&self, f: impl FnOnce(&mut AudioParam) -> R) -> R {
        f(&mut lock(&self.gain))
    }
}

struct Voice {
    id: VoiceId,
    source: Box<dyn RenderSource>,
    params: Arc<VoiceParams>,
    route: Route,
    done: Option<oneshot::Sender<VoiceEnd>>,
}

impl Voice {
    fn finish(&mut self, end: VoiceEnd) {
        if let Some(done) = self.done.take() {
            // Receiver may already be gone after a stop
            let _ = done.send(end);
        }
    }
}

struct ReverbBus {
    convolver: Convolver,
    input: Vec<f32>,
    active: bool,
    tail_left: usize,
}

struct GraphState {
    voices: Vec<Voice>,
    buses: Vec<ReverbBus>,
    scratch: Vec<f32>,
    gains: Vec<f32>,
}

struct GraphInner {
    sample_rate: u32,
    reverb_count: usize,
    frames_rendered: AtomicU64,
    next_id: AtomicU64,
    closed: AtomicBool,
    state: Mutex<GraphState>,
}

/// Cloneable handle to the mixing graph
#[derive(Clone)]
pub struct AudioGraph {
    inner: Arc<GraphInner>,
}

impl std::fmt::Debug for AudioGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioGraph")
            .field("sample_rate", &self.inner.sample_rate)
            .field("reverb_count", &self.inner.reverb_count)
            .field("active_voices", &self.active_voices())
            .finish()
    }
}

impl AudioGraph {
    /// Build a graph with one reverb bus per pool entry
    pub fn new(sample_rate: u32, reverbs: ReverbPool) -> Self {
        let buses: Vec<ReverbBus> = reverbs
            .into_convolvers()
            .into_iter()
            .map(|convolver| ReverbBus {
                convolver,
                input: Vec::new(),
                active: false,
                tail_left: 0,
            })
            .collect();

        debug!(sample_rate, reverb_buses = buses.len(), "Audio graph created");

        Self {
            inner: Arc::new(GraphInner {
                sample_rate,
                reverb_count: buses.len(),
                frames_rendered: AtomicU64::new(0),
                next_id: AtomicU64::new(1),
                closed: AtomicBool::new(false),
                state: Mutex::new(GraphState {
                    voices: Vec::new(),
                    buses,
                    scratch: Vec::new(),
                    gains: Vec::new(),
                }),
            }),
        }
    }

    /// Graph without reverb buses
    pub fn dry(sample_rate: u32) -> Self {
        Self::new(sample_rate, ReverbPool::empty())
    }

    /// Output sample rate
    pub fn sample_rate(&self) -> u32 {
        self.inner.sample_rate
    }

    /// Seconds of audio rendered so far; the clock for all automation
    pub fn current_time(&self) -> f64 {
        self.inner.frames_rendered.load(Ordering::Acquire) as f64
            / f64::from(self.inner.sample_rate.max(1))
    }

    /// Number of reverb buses
    pub fn reverb_count(&self) -> usize {
        self.inner.reverb_count
    }

    /// Pick one reverb bus uniformly, or dry when the pool is empty
    pub fn random_reverb(&self) -> Route {
        match self.inner.reverb_count {
            0 => Route::Dry,
            n => Route::Reverb(rand::thread_rng().gen_range(0..n)),
        }
    }

    /// Connected voices
    pub fn active_voices(&self) -> usize {
        lock(&self.inner.state).voices.len()
    }

    /// Attach a source; the receiver resolves when the source ends on its own
    pub fn connect(
        &self,
        source: Box<dyn RenderSource>,
        params: Arc<VoiceParams>,
        route: Route,
    ) -> Result<(VoiceId, oneshot::Receiver<VoiceEnd>)> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(AudioError::GraphClosed);
        }
        if let Route::Reverb(index) = route {
            if index >= self.inner.reverb_count {
                return Err(AudioError::UnknownReverb {
                    index,
                    count: self.inner.reverb_count,
                });
            }
        }

        let id = VoiceId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = oneshot::channel();
        lock(&self.inner.state).voices.push(Voice {
            id,
            source,
            params,
            route,
            done: Some(tx),
        });

        debug!(voice = %id, ?route, "Voice connected");
        Ok((id, rx))
    }

    /// Detach a voice without signalling its end; returns whether it was connected
    pub fn disconnect(&self, id: VoiceId) -> bool {
        let mut state = lock(&self.inner.state);
        let before = state.voices.len();
        state.voices.retain(|v| v.id != id);
        before != state.voices.len()
    }

    /// Refuse new voices and drop the connected ones
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        lock(&self.inner.state).voices.clear();
    }

    /// Whether `close` was called
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Mix all voices into interleaved stereo `out`, overwriting it
    pub fn render(&self, out: &mut [f32]) {
        out.fill(0.0);
        let frames = out.len() / 2;
        if frames == 0 {
            return;
        }

        let frame_duration = 1.0 / f64::from(self.inner.sample_rate.max(1));
        let start = self.current_time();

        let mut guard = lock(&self.inner.state);
        let GraphState {
            voices,
            buses,
            scratch,
            gains,
        } = &mut *guard;

        scratch.resize(frames * 2, 0.0);
        gains.resize(frames, 0.0);
        for bus in buses.iter_mut() {
            bus.input.clear();
            bus.input.resize(frames * 2, 0.0);
            bus.active = false;
        }

        voices.retain_mut(|voice| {
            scratch.fill(0.0);
            let params = &voice.params;
            let written = match voice
                .source
                .render(scratch.as_mut_slice(), params.rate(), params.looping())
            {
                Ok(written) => written,
                Err(e) => {
                    warn!(voice = %voice.id, error = %e, "Voice failed while rendering");
                    voice.finish(VoiceEnd::Failed(e.to_string()));
                    return false;
                }
            };

            params.with_gain(|gain| {
                gain.prune(start);
                gain.fill(start, frame_duration, gains.as_mut_slice());
            });

            let volume = params.volume();
            let pan = params.pan();
            let (left_gain, right_gain) = balance(pan);

            let target: &mut [f32] = match voice.route {
                Route::Dry => &mut *out,
                Route::Reverb(index) => match buses.get_mut(index) {
                    Some(bus) => {
                        bus.active = true;
                        &mut bus.input[..]
                    }
                    None => &mut *out,
                },
            };

            for (i, frame) in scratch.chunks_exact(2).take(written).enumerate() {
                let g = gains[i] * volume;
                target[i * 2] += frame[0] * g * left_gain;
                target[i * 2 + 1] += frame[1] * g * right_gain;
            }

            if written < frames {
                voice.finish(VoiceEnd::Finished);
                return false;
            }
            true
        });

        for bus in buses.iter_mut() {
            if bus.active {
                bus.tail_left = bus.convolver.tail_frames();
            } else if bus.tail_left == 0 {
                continue;
            }
            bus.convolver.process_into(&bus.input, out);
            if !bus.active {
                bus.tail_left = bus.tail_left.saturating_sub(frames);
            }
        }

        self.inner
            .frames_rendered
            .fetch_add(frames as u64, Ordering::Release);
    }
}

/// Linear balance: the far channel is attenuated, the near one stays at unity
fn balance(pan: f32) -> (f32, f32) {
    if pan >= 0.0 {
        (1.0 - pan, 1.0)
    } else {
        (1.0, 1.0 + pan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::SampleBuffer;
    use crate::source::BufferSource;

    fn constant(frames: usize, value: f32) -> Box<dyn RenderSource> {
        let buffer = SampleBuffer::new(vec![value; frames * 2], 48_000);
        Box::new(BufferSource::new(Arc::new(buffer), 48_000))
    }

    #[test]
    fn balance_is_linear() {
        assert_eq!(balance(0.0), (1.0, 1.0));
        assert_eq!(balance(-1.0), (1.0, 0.0));
        assert_eq!(balance(0.5), (0.5, 1.0));
    }

    #[test]
    fn voice_finishes_and_reports() {
        let graph = AudioGraph::dry(48_000);
        let params = Arc::new(VoiceParams::new());
        let (_, mut done) = graph
            .connect(constant(100, 0.5), params, Route::Dry)
            .unwrap();

        let mut out = vec![0.0; 128 * 2];
        graph.render(&mut out);

        assert_eq!(out[0], 0.5);
        assert_eq!(out[99 * 2], 0.5);
        assert_eq!(out[100 * 2], 0.0);
        assert_eq!(graph.active_voices(), 0);
        assert_eq!(done.try_recv().unwrap(), VoiceEnd::Finished);
        assert!((graph.current_time() - 128.0 / 48_000.0).abs() < 1e-12);
    }

    #[test]
    fn disconnect_drops_without_signal() {
        let graph = AudioGraph::dry(48_000);
        let (id, mut done) = graph
            .connect(constant(10_000, 0.5), Arc::new(VoiceParams::new()), Route::Dry)
            .unwrap();
        assert!(graph.disconnect(id));
        assert!(!graph.disconnect(id));
        assert!(done.try_recv().is_err());
    }

    #[test]
    fn volume_gain_and_pan_multiply() {
        let graph = AudioGraph::dry(48_000);
        let params = Arc::new(VoiceParams::new());
        params.set_volume(0.5);
        params.set_pan(1.0);
        params.with_gain(|g| g.set_value(2.0));
        graph
            .connect(constant(1_000, 0.5), Arc::clone(&params), Route::Dry)
            .unwrap();

        let mut out = vec![0.0; 64 * 2];
        graph.render(&mut out);
        assert_eq!(out[0], 0.0);
        assert_eq!(out[1], 0.5);
    }

    #[test]
    fn reverb_routes_are_validated() {
        let graph = AudioGraph::new(48_000, ReverbPool::synthesized(2, 0.1, 48_000));
        assert_eq!(graph.reverb_count(), 2);
        for _ in 0..100 {
            match graph.random_reverb() {
                Route::Reverb(i) => assert!(i < 2),
                Route::Dry => panic!("expected a reverb route"),
            }
        }

        let result = graph.connect(constant(10, 0.1), Arc::new(VoiceParams::new()), Route::Reverb(5));
        assert!(matches!(result, Err(AudioError::UnknownReverb { index: 5, count: 2 })));
        assert!(graph
            .connect(constant(10, 0.1), Arc::new(VoiceParams::new()), Route::Reverb(1))
            .is_ok());
    }

    #[test]
    fn closed_graph_rejects_voices() {
        let graph = AudioGraph::dry(48_000);
        graph.close();
        assert!(graph.is_closed());
        let result = graph.connect(constant(10, 0.1), Arc::new(VoiceParams::new()), Route::Dry);
        assert!(matches!(result, Err(AudioError::GraphClosed)));
    }

    #[test]
    fn dry_graph_picks_dry_route() {
        assert_eq!(AudioGraph::dry(48_000).random_reverb(), Route::Dry);
    }
}
