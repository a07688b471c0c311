#![cfg(feature = "engine-mock")]

use std::f32::consts::PI;

use approx::assert_abs_diff_eq;

use stem_studio::core::engine::Engine;
use stem_studio::types::{ManifestArtifact, ModelManifest};
use stem_studio::AudioData;

fn manifest(stems: &[&str]) -> ModelManifest {
    ModelManifest {
        name: "mock".into(),
        version: "1.0.0".into(),
        backend: "onnx".into(),
        sample_rate: 44_100,
        window: 4096,
        hop: 4096,
        stems: stems.iter().map(|s| s.to_string()).collect(),
        input_layout: "BCT".into(),
        output_layout: "BSCT".into(),
        artifacts: vec![ManifestArtifact {
            file: "mock.onnx".into(),
            url: "http://localhost/mock.onnx".into(),
            sha256: "0".repeat(64),
            size_bytes: 0,
        }],
    }
}

fn stereo_sine(frames: usize) -> AudioData {
    let mut samples = Vec::with_capacity(frames * 2);
    for i in 0..frames {
        let t = i as f32 / 44_100.0;
        samples.push((2.0 * PI * 220.0 * t).sin() * 0.8);
        samples.push((2.0 * PI * 330.0 * t).sin() * 0.8);
    }
    AudioData {
        samples,
        sample_rate: 44_100,
        channels: 2,
    }
}

#[test]
fn mock_engine_applies_per_stem_gain() {
    let engine = Engine::from_manifest(manifest(&["vocals", "drums", "bass", "other"]));
    let input = stereo_sine(8000);

    let stems = engine.separate(&input).unwrap();
    assert_eq!(stems.len(), 4);

    for (idx, stem) in stems.iter().enumerate() {
        assert_eq!(stem.channels, 2);
        assert_eq!(stem.sample_rate, 44_100);
        assert_eq!(stem.samples.len(), input.samples.len());

        let gain = 1.0 / (idx as f32 + 1.0);
        for (s, orig) in stem.samples.iter().zip(input.samples.iter()) {
            assert_abs_diff_eq!(*s, orig * gain, epsilon = 1e-6);
        }
    }
}

#[test]
fn engine_rejects_sample_rate_mismatch() {
    let engine = Engine::from_manifest(manifest(&["vocals", "accompaniment"]));
    let mut input = stereo_sine(4000);
    input.sample_rate = 48_000;

    let err = engine.separate(&input).unwrap_err();
    assert!(err.to_string().contains("48000"), "got: {err}");
}

#[test]
fn engine_rejects_empty_input() {
    let engine = Engine::from_manifest(manifest(&["vocals", "accompaniment"]));
    let input = AudioData {
        samples: Vec::new(),
        sample_rate: 44_100,
        channels: 2,
    };
    assert!(engine.separate(&input).is_err());
}

#[test]
fn engine_rejects_bad_window_config() {
    let mut mf = manifest(&["vocals", "accompaniment"]);
    mf.hop = mf.window + 1;
    let engine = Engine::from_manifest(mf);
    assert!(engine.separate(&stereo_sine(4000)).is_err());
}
