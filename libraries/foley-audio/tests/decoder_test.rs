//! Decoding and streaming against generated WAV fixtures

use foley_audio::{
    decode_to_buffer, scan_duration, AudioGraph, MediaInput, RenderSource, Route, StreamSource,
    StreamingDecoder, VoiceEnd, VoiceParams,
};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// 16-bit sine WAV in memory
fn sine_wav(sample_rate: u32, channels: u16, seconds: f32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut bytes = Vec::new();
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec).unwrap();
        let frames = (sample_rate as f32 * seconds) as usize;
        for i in 0..frames {
            let t = i as f32 / sample_rate as f32;
            let s = ((2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5 * f32::from(i16::MAX)) as i16;
            for _ in 0..channels {
                writer.write_sample(s).unwrap();
            }
        }
        writer.finalize().unwrap();
    }
    bytes
}

fn close(a: Duration, b: Duration) -> bool {
    let diff = if a > b { a - b } else { b - a };
    diff < Duration::from_millis(1)
}

fn write_wav(path: &Path, sample_rate: u32, channels: u16, seconds: f32) {
    std::fs::write(path, sine_wav(sample_rate, channels, seconds)).unwrap();
}

#[test]
fn buffered_decode_matches_graph_rate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    write_wav(&path, 48_000, 2, 0.5);

    let buffer = decode_to_buffer(MediaInput::Path(path), None, 48_000).unwrap();
    assert_eq!(buffer.sample_rate(), 48_000);
    assert_eq!(buffer.frames(), 24_000);
    assert_eq!(buffer.duration(), Duration::from_millis(500));
    let peak = buffer.samples().iter().fold(0.0f32, |m, s| m.max(s.abs()));
    assert!(peak > 0.45 && peak <= 0.5);
}

#[test]
fn buffered_decode_resamples_mono_bytes() {
    let bytes: Arc<[u8]> = sine_wav(22_050, 1, 1.0).into();

    let buffer = decode_to_buffer(MediaInput::Bytes(bytes), Some("wav"), 48_000).unwrap();
    assert_eq!(buffer.sample_rate(), 48_000);
    assert_eq!(buffer.frames(), 48_000);
    // Mono is duplicated to both channels
    let (l, r) = buffer.frame(10_000);
    assert_eq!(l, r);
}

#[test]
fn streaming_decoder_reports_header_duration_and_rewinds() {
    let bytes: Arc<[u8]> = sine_wav(44_100, 2, 0.25).into();
    let mut decoder = StreamingDecoder::open(MediaInput::Bytes(bytes), Some("wav")).unwrap();
    assert_eq!(decoder.sample_rate(), 44_100);

    let expected = Duration::from_secs_f64(0.25);
    let reported = decoder.duration().unwrap();
    assert!(close(reported, expected));

    let mut first_pass = 0;
    while let Some(chunk) = decoder.next_chunk().unwrap() {
        first_pass += chunk.len();
    }
    decoder.rewind().unwrap();
    let mut second_pass = 0;
    while let Some(chunk) = decoder.next_chunk().unwrap() {
        second_pass += chunk.len();
    }
    assert_eq!(first_pass, second_pass);
    assert_eq!(first_pass / 2, 11_025);
}

#[test]
fn scan_duration_finds_length() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("long.wav");
    write_wav(&path, 48_000, 2, 1.5);

    let duration = scan_duration(MediaInput::Path(path), None).unwrap();
    assert!(close(duration, Duration::from_millis(1_500)));
}

#[test]
fn stream_source_plays_to_the_end_through_the_graph() {
    let bytes: Arc<[u8]> = sine_wav(48_000, 2, 0.1).into();
    let decoder = StreamingDecoder::open(MediaInput::Bytes(bytes), Some("wav")).unwrap();
    let source = StreamSource::new(decoder, 48_000);

    let graph = AudioGraph::dry(48_000);
    let (_, mut ended) = graph
        .connect(Box::new(source), Arc::new(VoiceParams::new()), Route::Dry)
        .unwrap();

    let mut out = vec![0.0; 2 * 1_024];
    let mut blocks = 0;
    while graph.active_voices() > 0 && blocks < 100 {
        graph.render(&mut out);
        blocks += 1;
    }

    // 4800 frames need five 1024-frame blocks
    assert_eq!(blocks, 5);
    assert_eq!(ended.try_recv().unwrap(), VoiceEnd::Finished);
}

#[test]
fn looping_stream_never_ends() {
    let bytes: Arc<[u8]> = sine_wav(48_000, 2, 0.01).into();
    let decoder = StreamingDecoder::open(MediaInput::Bytes(bytes), Some("wav")).unwrap();
    let mut source = StreamSource::new(decoder, 48_000);

    let mut out = vec![0.0; 2 * 4_096];
    for _ in 0..5 {
        assert_eq!(source.render(&mut out, 1.0, true).unwrap(), 4_096);
    }
}

#[test]
fn undecodable_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.wav");
    std::fs::write(&path, b"definitely not audio").unwrap();
    assert!(decode_to_buffer(MediaInput::Path(path), None, 48_000).is_err());
}
