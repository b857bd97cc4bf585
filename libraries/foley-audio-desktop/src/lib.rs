//! Desktop audio output for the Foley mixing graph
//!
//! `DesktopOutput` owns a CPAL stream on a dedicated thread whose callback
//! pulls interleaved stereo from an [`foley_audio::AudioGraph`] and maps it
//! onto the device's channel layout.
//!
//! # Example
//!
//! ```no_run
//! use foley_audio::AudioGraph;
//! use foley_audio_desktop::{DesktopOutput, DeviceInfo};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Run the graph at the device's native rate
//! let device = DeviceInfo::default_output()?;
//! let graph = AudioGraph::dry(device.sample_rate);
//!
//! let output = DesktopOutput::start(graph)?;
//! output.pause()?;
//! output.resume()?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod output;

pub use error::{OutputError, Result};
pub use output::{mix_to_channels, DesktopOutput, DeviceInfo};
