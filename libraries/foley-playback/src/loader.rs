//! Turning effect descriptors into render sources
//!
//! Two backends sit behind [`SymphoniaLoader`]: buffered effects are decoded
//! and resampled up front, streamed effects are opened and decoded on the
//! audio thread. Decoding is blocking work and always runs on the blocking
//! pool.

use crate::error::{PlaybackError, Result};
use async_trait::async_trait;
use foley_audio::{
    decode_to_buffer, scan_duration, BufferSource, MediaInput, RenderSource, SampleBuffer,
    StreamSource, StreamingDecoder,
};
use foley_core::{EffectDescriptor, SourceRef};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task;
use tracing::{debug, warn};

/// Decoded buffers kept for repeated triggers of the same effect
const DEFAULT_CACHE_ENTRIES: usize = 64;

/// What is known about a source's length right after loading
#[derive(Debug)]
pub enum DurationHint {
    /// Length known from the decoded data or the container header
    Known(Duration),
    /// Length arrives later (background scan)
    Pending(oneshot::Receiver<Duration>),
    /// Length cannot be determined
    Unknown,
}

/// A source ready to be connected to the graph
pub struct LoadedSource {
    /// Render side of the effect
    pub source: Box<dyn RenderSource>,
    /// Length information
    pub duration: DurationHint,
}

impl fmt::Debug for LoadedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedSource")
            .field("duration", &self.duration)
            .finish_non_exhaustive()
    }
}

/// Loads descriptors for playback at a given graph rate
#[async_trait]
pub trait SourceLoader: Send + Sync {
    /// Open or decode `descriptor`
    async fn load(&self, descriptor: &EffectDescriptor, sample_rate: u32) -> Result<LoadedSource>;
}

fn media_input(source: &SourceRef) -> MediaInput {
    match source {
        SourceRef::Path(path) => MediaInput::Path(path.clone()),
        SourceRef::Inline { data, .. } => MediaInput::Bytes(Arc::clone(data)),
    }
}

fn join_error(err: task::JoinError) -> PlaybackError {
    PlaybackError::playback(format!("Decoder task failed: {err}"))
}

/// Symphonia-backed loader with a small decoded-buffer cache
pub struct SymphoniaLoader {
    cache: Mutex<HashMap<(SourceRef, u32), Arc<SampleBuffer>>>,
    max_entries: usize,
}

impl Default for SymphoniaLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SymphoniaLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymphoniaLoader")
            .field("cached", &self.cache().len())
            .field("max_entries", &self.max_entries)
            .finish()
    }
}

impl SymphoniaLoader {
    /// Create a loader with the default cache size
    pub fn new() -> Self {
        Self::with_cache_entries(DEFAULT_CACHE_ENTRIES)
    }

    /// Create a loader caching at most `max_entries` decoded buffers (0 disables)
    pub fn with_cache_entries(max_entries: usize) -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            max_entries,
        }
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<(SourceRef, u32), Arc<SampleBuffer>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Forget every cached buffer
    pub fn clear_cache(&self) {
        self.cache().clear();
    }

    async fn load_buffered(
        &self,
        descriptor: &EffectDescriptor,
        sample_rate: u32,
    ) -> Result<LoadedSource> {
        let key = (descriptor.source.clone(), sample_rate);
        let cached = self.cache().get(&key).cloned();

        let buffer = match cached {
            Some(buffer) => {
                debug!(effect = %descriptor.id, "Using cached buffer");
                buffer
            }
            None => {
                let input = media_input(&descriptor.source);
                let hint = descriptor.format_hint();
                let buffer = task::spawn_blocking(move || {
                    decode_to_buffer(input, hint.as_deref(), sample_rate)
                })
                .await
                .map_err(join_error)??;
                let buffer = Arc::new(buffer);

                if self.max_entries > 0 {
                    let mut cache = self.cache();
                    if cache.len() >= self.max_entries {
                        cache.clear();
                    }
                    cache.insert(key, Arc::clone(&buffer));
                }
                buffer
            }
        };

        let duration = buffer.duration();
        debug!(effect = %descriptor.id, ?duration, "Buffered effect decoded");
        Ok(LoadedSource {
            source: Box::new(BufferSource::new(buffer, sample_rate)),
            duration: DurationHint::Known(duration),
        })
    }

    async fn load_streamed(
        &self,
        descriptor: &EffectDescriptor,
        sample_rate: u32,
    ) -> Result<LoadedSource> {
        let input = media_input(&descriptor.source);
        let hint = descriptor.format_hint();

        let open_input = input.clone();
        let open_hint = hint.clone();
        let decoder = task::spawn_blocking(move || {
            StreamingDecoder::open(open_input, open_hint.as_deref())
        })
        .await
        .map_err(join_error)??;

        let duration = match decoder.duration() {
            Some(duration) => DurationHint::Known(duration),
            None => {
                // Header had no frame count; walk the packets in the background
                let (tx, rx) = oneshot::channel();
                let effect = descriptor.id.clone();
                task::spawn_blocking(move || match scan_duration(input, hint.as_deref()) {
                    Ok(duration) => {
                        let _ = tx.send(duration);
                    }
                    Err(e) => warn!(%effect, error = %e, "Duration scan failed"),
                });
                DurationHint::Pending(rx)
            }
        };

        debug!(effect = %descriptor.id, ?duration, "Streamed effect opened");
        Ok(LoadedSource {
            source: Box::new(StreamSource::new(decoder, sample_rate)),
            duration,
        })
    }
}

#[async_trait]
impl SourceLoader for SymphoniaLoader {
    async fn load(&self, descriptor: &EffectDescriptor, sample_rate: u32) -> Result<LoadedSource> {
        if descriptor.streaming {
            self.load_streamed(descriptor, sample_rate).await
        } else {
            self.load_buffered(descriptor, sample_rate).await
        }
    }
}
