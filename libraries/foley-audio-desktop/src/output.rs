use crate::error::{OutputError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};
use foley_audio::AudioGraph;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Commands sent to the thread owning the stream
enum OutputCommand {
    Pause,
    Resume,
    Shutdown,
}

/// Native format of the default output device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Default sample rate in Hz
    pub sample_rate: u32,
    /// Channel count
    pub channels: u16,
}

impl DeviceInfo {
    /// Query the default output device of the default host
    pub fn default_output() -> Result<Self> {
        let device = default_device()?;
        let config = device.default_output_config()?;
        Ok(Self {
            sample_rate: config.sample_rate(),
            channels: config.channels(),
        })
    }
}

fn default_device() -> Result<Device> {
    cpal::default_host()
        .default_output_device()
        .ok_or(OutputError::DeviceNotFound)
}

/// Plays an [`AudioGraph`] on the default output device
///
/// The CPAL stream is not `Send` on every platform, so it lives on a
/// dedicated thread; this handle only talks to it through a channel.
pub struct DesktopOutput {
    command_tx: Sender<OutputCommand>,
    sample_rate: u32,
    channels: u16,
    audio_thread: Option<JoinHandle<()>>,
}

impl DesktopOutput {
    /// Open the default device at the graph's sample rate and start rendering
    pub fn start(graph: AudioGraph) -> Result<Self> {
        let device = default_device()?;
        let supported = device.default_output_config()?;

        let mut config: StreamConfig = supported.config();
        config.sample_rate = graph.sample_rate();
        let channels = config.channels;
        let sample_rate = graph.sample_rate();

        let (command_tx, command_rx) = bounded::<OutputCommand>(8);
        let (ready_tx, ready_rx) = bounded::<Result<()>>(1);

        let audio_thread = thread::Builder::new()
            .name("foley-output".into())
            .spawn(move || audio_thread_run(&device, &config, graph, &command_rx, &ready_tx))
            .map_err(|e| OutputError::Device(e.to_string()))?;

        // Stream construction happens on the audio thread; wait for its verdict
        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                let _ = audio_thread.join();
                return Err(err);
            }
            Err(_) => return Err(OutputError::ThreadGone),
        }

        info!(sample_rate, channels, "Desktop output started");
        Ok(Self {
            command_tx,
            sample_rate,
            channels,
            audio_thread: Some(audio_thread),
        })
    }

    /// Rate the stream runs at
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Device channel count
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Pause the device stream
    pub fn pause(&self) -> Result<()> {
        self.send(OutputCommand::Pause)
    }

    /// Resume after `pause`
    pub fn resume(&self) -> Result<()> {
        self.send(OutputCommand::Resume)
    }

    fn send(&self, command: OutputCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|_| OutputError::ThreadGone)
    }
}

impl Drop for DesktopOutput {
    fn drop(&mut self) {
        let _ = self.command_tx.send(OutputCommand::Shutdown);
        if let Some(handle) = self.audio_thread.take() {
            let _ = handle.join();
        }
    }
}

impl std::fmt::Debug for DesktopOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DesktopOutput")
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .finish_non_exhaustive()
    }
}

fn audio_thread_run(
    device: &Device,
    config: &StreamConfig,
    graph: AudioGraph,
    command_rx: &Receiver<OutputCommand>,
    ready_tx: &Sender<Result<()>>,
) {
    let stream = match build_stream(device, config, graph) {
        Ok(stream) => stream,
        Err(err) => {
            let _ = ready_tx.send(Err(err));
            return;
        }
    };
    if let Err(err) = stream.play() {
        let _ = ready_tx.send(Err(err.into()));
        return;
    }
    let _ = ready_tx.send(Ok(()));

    while let Ok(command) = command_rx.recv() {
        match command {
            OutputCommand::Pause => {
                if let Err(err) = stream.pause() {
                    warn!(error = %err, "Failed to pause output stream");
                }
            }
            OutputCommand::Resume => {
                if let Err(err) = stream.play() {
                    warn!(error = %err, "Failed to resume output stream");
                }
            }
            OutputCommand::Shutdown => break,
        }
    }
    debug!("Audio thread exiting");
}

fn build_stream(device: &Device, config: &StreamConfig, graph: AudioGraph) -> Result<Stream> {
    let channels = usize::from(config.channels.max(1));
    let mut stereo: Vec<f32> = Vec::new();

    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            let frames = data.len() / channels;
            if stereo.len() < frames * 2 {
                stereo.resize(frames * 2, 0.0);
            }
            let stereo = &mut stereo[..frames * 2];
            graph.render(stereo);
            mix_to_channels(stereo, data, channels);
        },
        |err| error!(error = %err, "Audio stream error"),
        None,
    )?;
    Ok(stream)
}

/// Map interleaved stereo onto `channels` interleaved device channels
///
/// Mono devices get the average of both sides; extra channels are silent.
pub fn mix_to_channels(stereo: &[f32], out: &mut [f32], channels: usize) {
    if channels == 0 {
        return;
    }
    for (frame, pair) in out.chunks_exact_mut(channels).zip(stereo.chunks_exact(2)) {
        if channels == 1 {
            frame[0] = (pair[0] + pair[1]) * 0.5;
            continue;
        }
        frame[0] = pair[0];
        frame[1] = pair[1];
        frame[2..].fill(0.0);
    }
    // Frames the graph did not cover
    let covered = (stereo.len() / 2) * channels;
    if covered < out.len() {
        out[covered..].fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stereo_passes_through() {
        let stereo = [0.1, 0.2, 0.3, 0.4];
        let mut out = [9.0; 4];
        mix_to_channels(&stereo, &mut out, 2);
        assert_eq!(out, [0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn mono_averages_both_sides() {
        let stereo = [1.0, 0.0, 0.5, 0.5];
        let mut out = [9.0; 2];
        mix_to_channels(&stereo, &mut out, 1);
        assert_eq!(out, [0.5, 0.5]);
    }

    #[test]
    fn extra_channels_are_silent() {
        let stereo = [0.1, 0.2];
        let mut out = [9.0; 6];
        mix_to_channels(&stereo, &mut out, 6);
        assert_eq!(out, [0.1, 0.2, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn start_on_default_device() {
        // Headless CI has no device
        let Ok(info) = DeviceInfo::default_output() else {
            return;
        };
        match DesktopOutput::start(AudioGraph::dry(info.sample_rate)) {
            Ok(output) => {
                assert_eq!(output.sample_rate(), info.sample_rate);
                assert!(output.pause().is_ok());
                assert!(output.resume().is_ok());
            }
            Err(OutputError::StreamBuild(_) | OutputError::Play(_) | OutputError::Device(_)) => {}
            Err(e) => panic!("Unexpected error: {}", e),
        }
    }
}
