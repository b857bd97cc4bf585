//! Symphonia decoding for both playback backends
//!
//! `decode_to_buffer` decodes a whole effect into memory and resamples it to
//! the graph rate. `StreamingDecoder` hands out packets one at a time for the
//! streamed backend, and `scan_duration` walks packet timestamps to find the
//! length of streams whose headers do not carry a frame count.
//!
//! All output is interleaved stereo f32: mono is duplicated, extra channels
//! beyond the front pair are ignored.

use crate::buffer::SampleBuffer;
use crate::error::{AudioError, Result};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::fs::File;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};
use tracing::{debug, warn};

/// Input frames per resampler call
const RESAMPLE_CHUNK: usize = 1024;

/// Encoded media, either on disk or in memory
#[derive(Debug, Clone)]
pub enum MediaInput {
    /// File path
    Path(PathBuf),
    /// Encoded bytes
    Bytes(Arc<[u8]>),
}

impl MediaInput {
    fn open(&self) -> Result<Box<dyn MediaSource>> {
        match self {
            Self::Path(path) => {
                if !path.exists() {
                    return Err(AudioError::FileNotFound(path.display().to_string()));
                }
                Ok(Box::new(File::open(path)?))
            }
            Self::Bytes(bytes) => Ok(Box::new(Cursor::new(Arc::clone(bytes)))),
        }
    }

    fn extension(&self) -> Option<String> {
        match self {
            Self::Path(path) => path
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase),
            Self::Bytes(_) => None,
        }
    }
}

/// Packet-by-packet decoder over one audio track
pub struct StreamingDecoder {
    input: MediaInput,
    hint: Option<String>,
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    n_frames: Option<u64>,
    time_base: Option<TimeBase>,
}

impl StreamingDecoder {
    /// Probe the input and prepare the default track's decoder
    pub fn open(input: MediaInput, hint: Option<&str>) -> Result<Self> {
        let hint = hint.map(str::to_string).or_else(|| input.extension());
        let mss = MediaSourceStream::new(input.open()?, Default::default());

        let mut probe_hint = Hint::new();
        if let Some(ext) = hint.as_deref() {
            probe_hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &probe_hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| AudioError::Symphonia(format!("Failed to probe media: {}", e)))?;

        let format = probed.format;
        let track = format
            .default_track()
            .ok_or_else(|| AudioError::decode("No audio tracks found"))?;

        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| AudioError::decode("Track has no sample rate"))?;
        let track_id = track.id;
        let n_frames = track.codec_params.n_frames;
        let time_base = track.codec_params.time_base;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| AudioError::Symphonia(format!("Failed to create decoder: {}", e)))?;

        debug!(sample_rate, ?n_frames, hint = ?hint, "Opened media");

        Ok(Self {
            input,
            hint,
            format,
            decoder,
            track_id,
            sample_rate,
            n_frames,
            time_base,
        })
    }

    /// Native sample rate of the track
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Length from the container header, when it has one
    pub fn duration(&self) -> Option<Duration> {
        self.n_frames
            .map(|frames| Duration::from_secs_f64(frames as f64 / f64::from(self.sample_rate)))
    }

    /// Decode the next packet into interleaved stereo, `None` at end of stream
    pub fn next_chunk(&mut self) -> Result<Option<Vec<f32>>> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => return Ok(None),
                Err(e) => return Err(e.into()),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => return Ok(Some(interleave_stereo(decoded))),
                Err(SymphoniaError::DecodeError(msg)) => {
                    warn!(error = msg, "Skipping undecodable packet");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Restart from the first frame
    pub fn rewind(&mut self) -> Result<()> {
        let seek = self.format.seek(
            SeekMode::Accurate,
            SeekTo::Time {
                time: Time::new(0, 0.0),
                track_id: Some(self.track_id),
            },
        );

        match seek {
            Ok(_) => {
                self.decoder.reset();
                Ok(())
            }
            Err(e) => {
                // Not every container can seek; reopening always works
                debug!(error = %e, "Seek failed, reopening media");
                *self = Self::open(self.input.clone(), self.hint.as_deref())?;
                Ok(())
            }
        }
    }
}

/// Decode an entire input into memory, resampled to `target_rate`
///
/// Blocking; run it off the async runtime.
pub fn decode_to_buffer(
    input: MediaInput,
    hint: Option<&str>,
    target_rate: u32,
) -> Result<SampleBuffer> {
    let mut decoder = StreamingDecoder::open(input, hint)?;
    let mut samples = Vec::new();
    while let Some(chunk) = decoder.next_chunk()? {
        samples.extend_from_slice(&chunk);
    }

    if samples.is_empty() {
        return Err(AudioError::decode("No audio frames decoded"));
    }

    let source_rate = decoder.sample_rate();
    if source_rate == target_rate {
        return Ok(SampleBuffer::new(samples, target_rate));
    }

    let resampled = resample_stereo(&samples, source_rate, target_rate)?;
    Ok(SampleBuffer::new(resampled, target_rate))
}

/// Find the length of an input by walking its packet timestamps
///
/// Blocking. Used for streams whose header carries no frame count.
pub fn scan_duration(input: MediaInput, hint: Option<&str>) -> Result<Duration> {
    let mut decoder = StreamingDecoder::open(input, hint)?;
    if let Some(duration) = decoder.duration() {
        return Ok(duration);
    }

    let mut end_ts = 0u64;
    loop {
        match decoder.format.next_packet() {
            Ok(packet) => {
                if packet.track_id() == decoder.track_id {
                    end_ts = end_ts.max(packet.ts() + packet.dur());
                }
            }
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        }
    }

    let duration = match decoder.time_base {
        Some(time_base) => {
            let time = time_base.calc_time(end_ts);
            Duration::from_secs(time.seconds) + Duration::from_secs_f64(time.frac)
        }
        None => Duration::from_secs_f64(end_ts as f64 / f64::from(decoder.sample_rate)),
    };
    Ok(duration)
}

/// Resample interleaved stereo between two rates
pub(crate) fn resample_stereo(samples: &[f32], from: u32, to: u32) -> Result<Vec<f32>> {
    if from == to || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let ratio = f64::from(to) / f64::from(from);
    let params = SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Cubic,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, RESAMPLE_CHUNK, 2)
        .map_err(|e| AudioError::Resample(format!("Failed to create resampler: {}", e)))?;

    let left: Vec<f32> = samples.iter().step_by(2).copied().collect();
    let right: Vec<f32> = samples.iter().skip(1).step_by(2).copied().collect();
    let frames = left.len().min(right.len());
    let expected = (frames as f64 * ratio).round() as usize;
    let delay = resampler.output_delay();

    let mut out = [Vec::with_capacity(expected + delay), Vec::with_capacity(expected + delay)];
    fn push(chunk: Vec<Vec<f32>>, out: &mut [Vec<f32>; 2]) {
        for (dst, src) in out.iter_mut().zip(chunk) {
            dst.extend_from_slice(&src);
        }
    }

    let mut pos = 0;
    while pos + RESAMPLE_CHUNK <= frames {
        let input = [
            &left[pos..pos + RESAMPLE_CHUNK],
            &right[pos..pos + RESAMPLE_CHUNK],
        ];
        let chunk = resampler
            .process(&input[..], None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        push(chunk, &mut out);
        pos += RESAMPLE_CHUNK;
    }

    if pos < frames {
        let input = [&left[pos..frames], &right[pos..frames]];
        let chunk = resampler
            .process_partial(Some(&input[..]), None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        push(chunk, &mut out);
    }

    // Drain the filter delay line
    while out[0].len() < expected + delay {
        let chunk = resampler
            .process_partial(None::<&[Vec<f32>]>, None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        if chunk.first().map_or(true, Vec::is_empty) {
            break;
        }
        push(chunk, &mut out);
    }

    let [mut left, mut right] = out;
    for channel in [&mut left, &mut right] {
        channel.drain(..delay.min(channel.len()));
        channel.truncate(expected);
    }

    Ok(left
        .iter()
        .zip(&right)
        .flat_map(|(&l, &r)| [l, r])
        .collect())
}

fn interleave<T, F>(buf: &symphonia::core::audio::AudioBuffer<T>, normalize: F) -> Vec<f32>
where
    T: symphonia::core::sample::Sample,
    F: Fn(T) -> f32,
{
    let channels = buf.spec().channels.count();
    let frames = buf.frames();
    let mut output = Vec::with_capacity(frames * 2);

    if channels == 0 {
        output.resize(frames * 2, 0.0);
        return output;
    }

    let left = buf.chan(0);
    let right = if channels > 1 { buf.chan(1) } else { left };
    for (&l, &r) in left.iter().zip(right).take(frames) {
        output.push(normalize(l));
        output.push(normalize(r));
    }

    output
}

/// Normalize any Symphonia sample format to interleaved stereo f32
fn interleave_stereo(decoded: AudioBufferRef<'_>) -> Vec<f32> {
    match decoded {
        AudioBufferRef::F32(buf) => interleave(&buf, |s| s.clamp(-1.0, 1.0)),
        AudioBufferRef::F64(buf) => interleave(&buf, |s| (s as f32).clamp(-1.0, 1.0)),
        AudioBufferRef::S8(buf) => interleave(&buf, |s| f32::from(s) / 128.0),
        AudioBufferRef::S16(buf) => interleave(&buf, |s| f32::from(s) / 32_768.0),
        AudioBufferRef::S24(buf) => interleave(&buf, |s| s.inner() as f32 / 8_388_608.0),
        AudioBufferRef::S32(buf) => interleave(&buf, |s| s as f32 / 2_147_483_648.0),
        AudioBufferRef::U8(buf) => interleave(&buf, |s| f32::from(s) / 128.0 - 1.0),
        AudioBufferRef::U16(buf) => interleave(&buf, |s| f32::from(s) / 32_768.0 - 1.0),
        AudioBufferRef::U24(buf) => interleave(&buf, |s| s.inner() as f32 / 8_388_608.0 - 1.0),
        AudioBufferRef::U32(buf) => interleave(&buf, |s| s as f32 / 2_147_483_648.0 - 1.0),
    }
}
