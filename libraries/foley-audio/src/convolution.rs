//! Uniformly partitioned FFT convolution for reverb buses
//!
//! The impulse response is split into blocks of `BLOCK` frames, each
//! transformed once at load. Input is gathered into blocks; every full block is
//! transformed, pushed onto a frequency-domain delay line and multiplied
//! against the partitions (overlap-save). Output therefore lags input by one
//! block, independent of the callback size.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::collections::VecDeque;
use std::sync::Arc;

/// Partition length in frames
pub const BLOCK: usize = 512;

struct Channel {
    partitions: Vec<Vec<Complex<f32>>>,
    history: VecDeque<Vec<Complex<f32>>>,
    previous: Vec<f32>,
    input: Vec<f32>,
    output: Vec<f32>,
}

impl Channel {
    fn new(ir: &[f32], forward: &Arc<dyn Fft<f32>>) -> Self {
        let fft_size = BLOCK * 2;
        let partitions: Vec<Vec<Complex<f32>>> = ir
            .chunks(BLOCK)
            .map(|part| {
                let mut spectrum = vec![Complex::new(0.0, 0.0); fft_size];
                for (slot, &s) in spectrum.iter_mut().zip(part) {
                    *slot = Complex::new(s, 0.0);
                }
                forward.process(&mut spectrum);
                spectrum
            })
            .collect();

        let history = (0..partitions.len())
            .map(|_| vec![Complex::new(0.0, 0.0); fft_size])
            .collect();

        Self {
            partitions,
            history,
            previous: vec![0.0; BLOCK],
            input: Vec::with_capacity(BLOCK),
            output: vec![0.0; BLOCK],
        }
    }

    fn process_block(
        &mut self,
        forward: &Arc<dyn Fft<f32>>,
        inverse: &Arc<dyn Fft<f32>>,
        accumulator: &mut [Complex<f32>],
    ) {
        let fft_size = BLOCK * 2;

        // Recycle the oldest spectrum for the newest input
        let mut spectrum = self
            .history
            .pop_back()
            .unwrap_or_else(|| vec![Complex::new(0.0, 0.0); fft_size]);
        for (i, slot) in spectrum.iter_mut().enumerate() {
            let s = if i < BLOCK {
                self.previous[i]
            } else {
                self.input[i - BLOCK]
            };
            *slot = Complex::new(s, 0.0);
        }
        forward.process(&mut spectrum);
        self.history.push_front(spectrum);

        accumulator.fill(Complex::new(0.0, 0.0));
        for (x, h) in self.history.iter().zip(&self.partitions) {
            for ((acc, &xv), &hv) in accumulator.iter_mut().zip(x).zip(h) {
                *acc += xv * hv;
            }
        }
        inverse.process(accumulator);

        let scale = 1.0 / fft_size as f32;
        for (out, y) in self.output.iter_mut().zip(&accumulator[BLOCK..]) {
            *out = y.re * scale;
        }

        std::mem::swap(&mut self.previous, &mut self.input);
        self.input.clear();
    }
}

/// Stereo convolver with a fixed impulse response
pub struct Convolver {
    left: Channel,
    right: Channel,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    accumulator: Vec<Complex<f32>>,
    ir_frames: usize,
}

impl Convolver {
    /// Build a convolver from per-channel impulse responses
    ///
    /// An empty channel is treated as silence.
    pub fn new(ir_left: &[f32], ir_right: &[f32]) -> Self {
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(BLOCK * 2);
        let inverse = planner.plan_fft_inverse(BLOCK * 2);

        let ir_frames = ir_left.len().max(ir_right.len()).max(1);
        let pad = |ir: &[f32]| {
            let mut padded = ir.to_vec();
            padded.resize(ir_frames, 0.0);
            padded
        };

        Self {
            left: Channel::new(&pad(ir_left), &forward),
            right: Channel::new(&pad(ir_right), &forward),
            forward,
            inverse,
            accumulator: vec![Complex::new(0.0, 0.0); BLOCK * 2],
            ir_frames,
        }
    }

    /// Build a convolver from an interleaved stereo impulse response
    pub fn from_interleaved(ir: &[f32]) -> Self {
        let left: Vec<f32> = ir.iter().step_by(2).copied().collect();
        let right: Vec<f32> = ir.iter().skip(1).step_by(2).copied().collect();
        Self::new(&left, &right)
    }

    /// Impulse response length in frames
    pub fn ir_frames(&self) -> usize {
        self.ir_frames
    }

    /// Frames between input and the matching output
    pub fn latency(&self) -> usize {
        BLOCK
    }

    /// Frames after the last non-silent input for which output can be non-zero
    pub fn tail_frames(&self) -> usize {
        self.ir_frames + BLOCK * 2
    }

    /// Convolve interleaved stereo `input`, adding the wet signal into `output`
    pub fn process_into(&mut self, input: &[f32], output: &mut [f32]) {
        for (frame_in, frame_out) in input.chunks_exact(2).zip(output.chunks_exact_mut(2)) {
            let pos = self.left.input.len();
            frame_out[0] += self.left.output[pos];
            frame_out[1] += self.right.output[pos];

            self.left.input.push(frame_in[0]);
            self.right.input.push(frame_in[1]);

            if self.left.input.len() == BLOCK {
                self.left
                    .process_block(&self.forward, &self.inverse, &mut self.accumulator);
                self.right
                    .process_block(&self.forward, &self.inverse, &mut self.accumulator);
            }
        }
    }

    /// Clear all history
    pub fn reset(&mut self) {
        for channel in [&mut self.left, &mut self.right] {
            for spectrum in &mut channel.history {
                spectrum.fill(Complex::new(0.0, 0.0));
            }
            channel.previous.fill(0.0);
            channel.input.clear();
            channel.output.fill(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(convolver: &mut Convolver, input: &[f32]) -> Vec<f32> {
        let mut output = vec![0.0; input.len()];
        // Odd chunk size to exercise block accumulation across calls
        for (i, o) in input.chunks(2 * 77).zip(output.chunks_mut(2 * 77)) {
            convolver.process_into(i, o);
        }
        output
    }

    #[test]
    fn unit_impulse_delays_by_one_block() {
        let mut convolver = Convolver::new(&[1.0], &[1.0]);
        let frames = BLOCK * 3;
        let input: Vec<f32> = (0..frames)
            .flat_map(|i| {
                let s = ((i * 7) % 13) as f32 / 13.0 - 0.5;
                [s, -s]
            })
            .collect();

        let output = run(&mut convolver, &input);

        for frame in 0..frames - BLOCK {
            let expected = input[frame * 2];
            let got = output[(frame + BLOCK) * 2];
            assert!((expected - got).abs() < 1e-4, "frame {frame}");
            assert!((input[frame * 2 + 1] - output[(frame + BLOCK) * 2 + 1]).abs() < 1e-4);
        }
        assert!(output[..BLOCK * 2].iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn long_ir_spans_partitions() {
        // Echo 700 frames later lands in the second partition
        let mut ir = vec![0.0; 701];
        ir[700] = 0.5;
        let mut convolver = Convolver::new(&ir, &ir);

        let frames = BLOCK * 4;
        let mut input = vec![0.0; frames * 2];
        input[0] = 1.0;
        input[1] = 1.0;

        let output = run(&mut convolver, &input);
        let peak = BLOCK + 700;
        assert!((output[peak * 2] - 0.5).abs() < 1e-4);
        let energy: f32 = output.iter().map(|s| s * s).sum();
        assert!((energy - 0.5).abs() < 1e-3);
    }
}
