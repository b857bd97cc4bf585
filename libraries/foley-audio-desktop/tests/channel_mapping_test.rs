//! Property tests for mapping graph output onto device layouts

use foley_audio::AudioGraph;
use foley_audio_desktop::mix_to_channels;
use proptest::prelude::*;

proptest! {
    #[test]
    fn every_device_sample_is_written(
        frames in 0usize..256,
        channels in 1usize..9,
        value in -1.0f32..1.0,
    ) {
        let stereo = vec![value; frames * 2];
        let mut out = vec![f32::NAN; frames * channels];
        mix_to_channels(&stereo, &mut out, channels);

        prop_assert!(out.iter().all(|s| s.is_finite()));
        for frame in out.chunks_exact(channels) {
            prop_assert!((frame[0] - value).abs() < 1e-6);
            if channels >= 2 {
                prop_assert!((frame[1] - value).abs() < 1e-6);
            }
            prop_assert!(frame.iter().skip(2).all(|&s| s == 0.0));
        }
    }

    #[test]
    fn short_graph_output_leaves_silence(frames in 1usize..64, missing in 1usize..64) {
        let stereo = vec![0.5; frames * 2];
        let mut out = vec![1.0; (frames + missing) * 2];
        mix_to_channels(&stereo, &mut out, 2);

        prop_assert!(out[..frames * 2].iter().all(|&s| s == 0.5));
        prop_assert!(out[frames * 2..].iter().all(|&s| s == 0.0));
    }
}

#[test]
fn silent_graph_renders_silence_on_any_layout() {
    let graph = AudioGraph::dry(48_000);
    let mut stereo = vec![1.0; 2 * 128];
    graph.render(&mut stereo);

    let mut out = vec![1.0; 6 * 128];
    mix_to_channels(&stereo, &mut out, 6);
    assert!(out.iter().all(|&s| s == 0.0));
}
