//! Preset persistence scenarios
//!
//! A host stores `SaturationParams` as TOML and restores it later; these
//! tests cover the full write/read cycle and that a restored parameter set
//! renders exactly like the original.

use filament_core::domain::{ProcessSpec, SaturationEngine, SaturationParams};
use std::fs;

fn sample_params() -> SaturationParams {
    SaturationParams {
        drive_db: 21.5,
        output_db: -3.75,
        mix_percent: 80.0,
        tone_value: 0.6,
        noise_percent: 15.0,
        noise_hp_hz: 150.0,
    }
}

#[test]
fn test_preset_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("warm_tape.toml");

    let params = sample_params();
    fs::write(&path, toml::to_string_pretty(&params).unwrap()).unwrap();

    let restored: SaturationParams = toml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(restored, params);
}

#[test]
fn test_partial_preset_fills_defaults() {
    let restored: SaturationParams = toml::from_str(
        r#"
drive_db = 30.0
mix_percent = 45.0
"#,
    )
    .unwrap();

    assert_eq!(restored.drive_db, 30.0);
    assert_eq!(restored.mix_percent, 45.0);
    // Everything absent falls back to the defaults
    let defaults = SaturationParams::default();
    assert_eq!(restored.output_db, defaults.output_db);
    assert_eq!(restored.tone_value, defaults.tone_value);
    assert_eq!(restored.noise_percent, defaults.noise_percent);
    assert_eq!(restored.noise_hp_hz, defaults.noise_hp_hz);
}

#[test]
fn test_malformed_preset_rejected() {
    assert!(toml::from_str::<SaturationParams>("drive_db = \"loud\"").is_err());
    assert!(toml::from_str::<SaturationParams>("not valid toml [[").is_err());
}

#[test]
fn test_serialization_is_stable() {
    let params = sample_params();
    let first = toml::to_string(&params).unwrap();
    let reparsed: SaturationParams = toml::from_str(&first).unwrap();
    let second = toml::to_string(&reparsed).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_restored_preset_renders_identically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.toml");

    let params = sample_params();
    fs::write(&path, toml::to_string_pretty(&params).unwrap()).unwrap();
    let restored: SaturationParams = toml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();

    let render = |params: SaturationParams| -> Vec<u32> {
        let mut engine = SaturationEngine::new();
        engine.set_params(params);
        engine.prepare(ProcessSpec::new(44100.0, 1, 512)).unwrap();
        engine.set_noise_seed(31337);

        let mut buffer = vec![(0..512)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44100.0).sin())
            .collect::<Vec<f32>>()];
        engine.process(&mut buffer).unwrap();
        buffer[0].iter().map(|s| s.to_bits()).collect()
    };

    assert_eq!(render(params), render(restored));
}
