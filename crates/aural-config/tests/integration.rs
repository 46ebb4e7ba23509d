//! File round-trips for mixer and scene configuration.

use aural_config::{
    ConfigError, EffectConfig, FrameConfig, MixerConfig, Placement, SampleFormat, SceneConfig,
    SensorConfig, SourceConfig,
};
use aural_effects::{DspKind, FilterType};
use tempfile::TempDir;

fn scene() -> SceneConfig {
    SceneConfig {
        mixer: MixerConfig {
            format: SampleFormat::Pcm24,
            backend: "null".into(),
            ..MixerConfig::default()
        },
        effects: vec![EffectConfig::new("volume").with_param("gain", "-6dB")],
        frames: vec![FrameConfig {
            name: "hall".into(),
            parent: None,
            placement: Placement {
                position: [0.0, 0.0, -3.0],
                ..Placement::default()
            },
            effects: vec![
                EffectConfig::new("distance")
                    .with_model("inverse")
                    .with_param("rolloff", 2.0),
                EffectConfig::new("!echo").with_param("offset", "25%"),
            ],
        }],
        sensors: vec![SensorConfig {
            name: "voice".into(),
            parent: Some("hall".into()),
            source: SourceConfig::Wav {
                path: "voice.wav".into(),
                looped: true,
            },
            pitch: 1.0,
            placement: Placement {
                position: [1.0, 0.0, 0.0],
                velocity: [0.0, 0.0, 2.0],
                relative: true,
                gain: 0.8,
                ..Placement::default()
            },
            effects: Vec::new(),
        }],
    }
}

#[test]
fn scene_survives_save_and_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("scene.toml");

    let original = scene();
    original.save(&path).unwrap();
    let loaded = SceneConfig::load(&path).unwrap();

    assert_eq!(loaded.mixer, original.mixer);
    assert_eq!(loaded.frames, original.frames);
    assert_eq!(loaded.effects, original.effects);
    assert_eq!(loaded.sensors[0].placement, original.sensors[0].placement);
    match &loaded.sensors[0].source {
        SourceConfig::Wav { path: wav, looped } => {
            assert!(*looped);
            assert_eq!(wav, &dir.path().join("nested").join("voice.wav"));
        }
        other => panic!("unexpected source {other:?}"),
    }
}

#[test]
fn saved_effects_build_the_same_descriptors() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scene.toml");
    scene().save(&path).unwrap();
    let loaded = SceneConfig::load(&path).unwrap();

    let dsps = aural_config::to_dsps("frames.hall", &loaded.frames[0].effects).unwrap();
    assert_eq!(dsps[0].kind(), DspKind::Filter(FilterType::Distance));
    assert_eq!(dsps[0].get(0, 2), Some(2.0));
    assert!(dsps[0].is_enabled());
    assert!(!dsps[1].is_enabled());
    assert_eq!(dsps[1].get(0, 3), Some(0.25));

    let root = aural_config::to_dsps("effects", &loaded.effects).unwrap();
    assert!((root[0].get(0, 0).unwrap() - 0.501).abs() < 1e-3);
}

#[test]
fn mixer_config_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mixer.toml");
    let config = MixerConfig {
        sample_rate: 44100,
        refresh_rate: 100.0,
        tracks: 4,
        device: Some("USB".into()),
        ..MixerConfig::default()
    };
    config.save(&path).unwrap();
    let loaded = MixerConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(loaded.period_frames(), 441);
}

#[test]
fn missing_file_reports_path() {
    let err = SceneConfig::load("/nonexistent/aural/scene.toml").unwrap_err();
    assert!(matches!(err, ConfigError::ReadFile { .. }));
    assert!(err.to_string().contains("/nonexistent/aural/scene.toml"));
}

#[test]
fn empty_scene_is_valid() {
    let scene = SceneConfig::from_toml("").unwrap();
    assert_eq!(scene.node_count(), 0);
    assert_eq!(scene.mixer, MixerConfig::default());
}
