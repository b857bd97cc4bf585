//! Pool of reverb impulse responses
//!
//! Each entry becomes one convolution bus in the graph. Responses are either
//! read from WAV files or synthesized as exponentially decaying stereo noise.

use crate::convolution::Convolver;
use crate::decoder::resample_stereo;
use crate::error::{AudioError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;
use tracing::{debug, info};

/// Level reached at the end of a synthesized response (-60 dB)
const DECAY_FLOOR: f32 = 0.001;

/// Interleaved stereo impulse responses at the graph rate
#[derive(Debug, Clone, Default)]
pub struct ReverbPool {
    responses: Vec<Vec<f32>>,
}

impl ReverbPool {
    /// No reverb buses
    pub fn empty() -> Self {
        Self::default()
    }

    /// `count` distinct decaying-noise responses of `seconds` length
    pub fn synthesized(count: usize, seconds: f32, sample_rate: u32) -> Self {
        let mut rng = StdRng::from_entropy();
        let responses = (0..count)
            .map(|i| {
                // Vary the decay so buses sound distinct
                let length = seconds * (1.0 - 0.15 * i as f32 / count.max(1) as f32);
                decaying_noise(&mut rng, length.max(0.05), sample_rate)
            })
            .collect();
        debug!(count, seconds, "Synthesized reverb impulse responses");
        Self { responses }
    }

    /// Load WAV responses, resampled to `sample_rate`
    pub fn from_wav_files<P: AsRef<Path>>(paths: &[P], sample_rate: u32) -> Result<Self> {
        let responses = paths
            .iter()
            .map(|path| read_wav_ir(path.as_ref(), sample_rate))
            .collect::<Result<Vec<_>>>()?;
        info!(count = responses.len(), "Loaded reverb impulse responses");
        Ok(Self { responses })
    }

    /// Add an interleaved stereo response
    pub fn push(&mut self, response: Vec<f32>) {
        self.responses.push(response);
    }

    /// Number of responses
    pub fn len(&self) -> usize {
        self.responses.len()
    }

    /// Whether the pool has no responses
    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    /// Interleaved response at `index`
    pub fn response(&self, index: usize) -> Option<&[f32]> {
        self.responses.get(index).map(Vec::as_slice)
    }

    pub(crate) fn into_convolvers(self) -> Vec<Convolver> {
        self.responses
            .iter()
            .map(|ir| Convolver::from_interleaved(ir))
            .collect()
    }
}

fn decaying_noise<R: Rng>(rng: &mut R, seconds: f32, sample_rate: u32) -> Vec<f32> {
    let frames = ((seconds * sample_rate as f32) as usize).max(1);
    let decay = DECAY_FLOOR.ln() / frames as f32;

    let mut ir: Vec<f32> = (0..frames)
        .flat_map(|i| {
            let envelope = (decay * i as f32).exp();
            let l: f32 = rng.gen_range(-1.0..1.0);
            let r: f32 = rng.gen_range(-1.0..1.0);
            [l * envelope, r * envelope]
        })
        .collect();

    normalize(&mut ir);
    ir
}

// Unit energy per channel keeps wet level close to the dry level
fn normalize(ir: &mut [f32]) {
    for channel in 0..2 {
        let energy: f32 = ir.iter().skip(channel).step_by(2).map(|s| s * s).sum();
        if energy > 0.0 {
            let scale = energy.sqrt().recip();
            for s in ir.iter_mut().skip(channel).step_by(2) {
                *s *= scale;
            }
        }
    }
}

fn read_wav_ir(path: &Path, sample_rate: u32) -> Result<Vec<f32>> {
    if !path.exists() {
        return Err(AudioError::FileNotFound(path.display().to_string()));
    }

    let reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels);

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|s| s as f32 / max))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    if samples.is_empty() || channels == 0 {
        return Err(AudioError::ImpulseResponse(format!(
            "{} contains no samples",
            path.display()
        )));
    }

    let stereo: Vec<f32> = match channels {
        1 => samples.iter().flat_map(|&s| [s, s]).collect(),
        2 => samples,
        n => samples
            .chunks_exact(n)
            .flat_map(|frame| [frame[0], frame[1]])
            .collect(),
    };

    let mut stereo = resample_stereo(&stereo, spec.sample_rate, sample_rate)?;
    normalize(&mut stereo);
    Ok(stereo)
}
