//! Render-side sources pulled by the mixing graph
//!
//! A source writes interleaved stereo frames into a scratch slice. Returning
//! fewer frames than requested means the source has ended.

use crate::buffer::SampleBuffer;
use crate::decoder::StreamingDecoder;
use crate::error::Result;
use std::collections::VecDeque;
use std::sync::Arc;

/// Audio producer owned by one graph voice
pub trait RenderSource: Send {
    /// Write up to `out.len() / 2` frames at playback-rate multiplier `rate`
    ///
    /// Returns the number of frames written. When `looping` is set the source
    /// wraps to its start instead of ending.
    fn render(&mut self, out: &mut [f32], rate: f32, looping: bool) -> Result<usize>;
}

/// Plays a fully decoded buffer with linear-interpolated rate changes
pub struct BufferSource {
    buffer: Arc<SampleBuffer>,
    position: f64,
    base_step: f64,
}

impl BufferSource {
    /// Play `buffer` on a graph running at `output_rate`
    pub fn new(buffer: Arc<SampleBuffer>, output_rate: u32) -> Self {
        let base_step = if output_rate == 0 {
            1.0
        } else {
            f64::from(buffer.sample_rate()) / f64::from(output_rate)
        };
        Self {
            buffer,
            position: 0.0,
            base_step,
        }
    }
}

impl RenderSource for BufferSource {
    fn render(&mut self, out: &mut [f32], rate: f32, looping: bool) -> Result<usize> {
        let total = self.buffer.frames();
        if total == 0 {
            return Ok(0);
        }

        let step = self.base_step * f64::from(rate.max(0.0));
        let mut written = 0;

        for frame in out.chunks_exact_mut(2) {
            if self.position >= total as f64 {
                if !looping {
                    break;
                }
                self.position %= total as f64;
            }

            let index = self.position as usize;
            let t = (self.position - index as f64) as f32;
            let (l0, r0) = self.buffer.frame(index);
            let (l1, r1) = if index + 1 < total {
                self.buffer.frame(index + 1)
            } else if looping {
                self.buffer.frame(0)
            } else {
                (l0, r0)
            };

            frame[0] = l0 + (l1 - l0) * t;
            frame[1] = r0 + (r1 - r0) * t;
            self.position += step;
            written += 1;
        }

        Ok(written)
    }
}

/// Decodes on demand from a small queue of frames
pub struct StreamSource {
    decoder: StreamingDecoder,
    queue: VecDeque<f32>,
    position: f64,
    base_step: f64,
    exhausted: bool,
}

impl StreamSource {
    /// Stream from `decoder` on a graph running at `output_rate`
    pub fn new(decoder: StreamingDecoder, output_rate: u32) -> Self {
        let base_step = if output_rate == 0 {
            1.0
        } else {
            f64::from(decoder.sample_rate()) / f64::from(output_rate)
        };
        Self {
            decoder,
            queue: VecDeque::new(),
            position: 0.0,
            base_step,
            exhausted: false,
        }
    }

    fn queued_frames(&self) -> usize {
        self.queue.len() / 2
    }

    fn fill(&mut self, frames: usize, looping: bool) -> Result<()> {
        // Guards against spinning on a looping stream that yields nothing
        let mut empty_rewinds = 0;
        while self.queued_frames() < frames && !self.exhausted {
            match self.decoder.next_chunk()? {
                Some(chunk) => {
                    if !chunk.is_empty() {
                        empty_rewinds = 0;
                    }
                    self.queue.extend(chunk);
                }
                None if looping && empty_rewinds == 0 => {
                    self.decoder.rewind()?;
                    empty_rewinds += 1;
                }
                None => self.exhausted = true,
            }
        }
        Ok(())
    }

    fn frame(&self, index: usize) -> (f32, f32) {
        (self.queue[index * 2], self.queue[index * 2 + 1])
    }
}

impl RenderSource for StreamSource {
    fn render(&mut self, out: &mut [f32], rate: f32, looping: bool) -> Result<usize> {
        if looping {
            self.exhausted = false;
        }

        let step = self.base_step * f64::from(rate.max(0.0));
        let mut written = 0;

        for frame in out.chunks_exact_mut(2) {
            let index = self.position as usize;
            self.fill(index + 2, looping)?;

            let available = self.queued_frames();
            if index >= available {
                break;
            }

            let t = (self.position - index as f64) as f32;
            let (l0, r0) = self.frame(index);
            let (l1, r1) = if index + 1 < available {
                self.frame(index + 1)
            } else {
                (l0, r0)
            };

            frame[0] = l0 + (l1 - l0) * t;
            frame[1] = r0 + (r1 - r0) * t;
            self.position += step;
            written += 1;

            let consumed = (self.position as usize).min(available);
            self.queue.drain(..consumed * 2);
            self.position -= consumed as f64;
        }

        Ok(written)
    }
}
