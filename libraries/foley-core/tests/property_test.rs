//! Property-based tests for descriptor and request invariants

use foley_core::{EffectDescriptor, EffectVolume, FoleyError, SourceRef, MAX_EFFECT_VOLUME};
use proptest::prelude::*;

proptest! {
    #[test]
    fn volume_gain_never_exceeds_five(percent in 0u32..2_000) {
        match EffectVolume::new(percent) {
            Ok(volume) => {
                prop_assert!(percent <= u32::from(MAX_EFFECT_VOLUME));
                prop_assert!(volume.gain() <= 5.0);
                prop_assert!(volume.gain() >= 0.0);
            }
            Err(e) => {
                prop_assert!(percent > u32::from(MAX_EFFECT_VOLUME));
                prop_assert_eq!(e, FoleyError::InvalidVolume(percent));
            }
        }
    }

    #[test]
    fn descriptor_json_rejects_out_of_range_volume(percent in 501u32..10_000) {
        let json = format!(r#"{{"id":"x","source":"/sfx/x.wav","volume":{}}}"#, percent);
        let parsed: Result<EffectDescriptor, _> = serde_json::from_str(&json);
        prop_assert!(parsed.is_err());
    }

    #[test]
    fn path_sources_round_trip(name in "[a-z]{1,12}", ext in "(wav|ogg|mp3|flac)") {
        let text = format!("/sfx/{}.{}", name, ext);
        let source = SourceRef::parse(&text).unwrap();
        prop_assert_eq!(source.to_string(), text);
        prop_assert_eq!(source.extension_hint(), Some(ext));
    }
}

#[test]
fn descriptor_volume_of_600_is_rejected() {
    let result = EffectDescriptor::new("loud", SourceRef::path("/sfx/loud.wav")).with_volume(600);
    assert_eq!(result.unwrap_err(), FoleyError::InvalidVolume(600));
}
