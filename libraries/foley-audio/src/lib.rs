//! Foley Audio
//!
//! The render side of the Foley soundboard engine.
//!
//! This crate provides:
//! - Decoding via Symphonia, fully buffered (with Rubato resampling) or streamed
//! - `AudioParam` gain automation on the graph clock
//! - Uniformly partitioned FFT convolution for reverb buses
//! - `AudioGraph`, the mixer the audio thread pulls from
//!
//! # Example
//!
//! ```rust
//! use foley_audio::{AudioGraph, BufferSource, Route, SampleBuffer, VoiceParams};
//! use std::sync::Arc;
//!
//! let graph = AudioGraph::dry(48_000);
//! let tone = SampleBuffer::new(vec![0.25; 2 * 480], 48_000);
//! let source = BufferSource::new(Arc::new(tone), graph.sample_rate());
//!
//! let params = Arc::new(VoiceParams::new());
//! params.set_pan(-1.0);
//! let (_voice, _ended) = graph
//!     .connect(Box::new(source), params, Route::Dry)
//!     .unwrap();
//!
//! let mut out = vec![0.0; 2 * 256];
//! graph.render(&mut out);
//! assert_eq!(out[0], 0.25);
//! assert_eq!(out[1], 0.0);
//! ```

#![forbid(unsafe_code)]

mod buffer;
pub mod convolution;
pub mod decoder;
mod error;
pub mod graph;
pub mod param;
pub mod reverb;
pub mod source;

pub use buffer::SampleBuffer;
pub use convolution::Convolver;
pub use decoder::{decode_to_buffer, scan_duration, MediaInput, StreamingDecoder};
pub use error::{AudioError, Result};
pub use graph::{AudioGraph, Route, VoiceEnd, VoiceId, VoiceParams};
pub use param::{AudioParam, MAX_GAIN};
pub use reverb::ReverbPool;
pub use source::{BufferSource, RenderSource, StreamSource};
