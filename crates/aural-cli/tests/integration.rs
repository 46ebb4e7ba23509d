//! Integration tests for the `aural` binary.
//!
//! Scenes are written to temporary directories and rendered through the
//! wav and null backends, so no audio device is needed.

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

fn aural_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_aural"))
}

const TONE_SCENE: &str = r#"
effects = [{ type = "volume", params = { gain = "-6dB" } }]

[mixer]
sample_rate = 48000
refresh_rate = 100.0
tracks = 2
backend = "null"

[[frames]]
name = "room"
position = [0.0, 0.0, -1.0]

[[sensors]]
name = "beep"
parent = "room"
source = { type = "tone", frequency = 440.0, amplitude = 0.8, duration = 0.5 }
"#;

fn write_scene(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("scene.toml");
    std::fs::write(&path, body).expect("failed to write scene");
    path
}

#[test]
fn info_lists_effects_and_backends() {
    let output = aural_bin().arg("info").output().expect("failed to run aural info");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in ["reverb", "echo", "distance", "velocity", "pitch"] {
        assert!(stdout.contains(name), "effect listing should contain '{name}'");
    }
    for backend in ["cpal", "wav", "null"] {
        assert!(stdout.contains(backend), "backend listing should contain '{backend}'");
    }
}

#[test]
fn info_effect_shows_parameters() {
    let output = aural_bin()
        .args(["info", "--effect", "reverb"])
        .output()
        .expect("failed to run aural info --effect");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("decay_level"));
    assert!(stdout.contains("Range"));
}

#[test]
fn info_describes_scene_tree() {
    let dir = TempDir::new().unwrap();
    let scene = write_scene(dir.path(), TONE_SCENE);
    let output = aural_bin()
        .arg("info")
        .arg(&scene)
        .output()
        .expect("failed to run aural info <scene>");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("480 frames per period"));
    assert!(stdout.contains("[frame] room"));
    assert!(stdout.contains("[sensor] beep"));
}

#[test]
fn info_scene_json_is_parseable() {
    let dir = TempDir::new().unwrap();
    let scene = write_scene(dir.path(), TONE_SCENE);
    let output = aural_bin()
        .arg("info")
        .arg(&scene)
        .arg("--json")
        .output()
        .expect("failed to run aural info --json");
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["period_frames"], 480);
    assert_eq!(report["nodes"], 2);
    assert_eq!(report["scene"]["sensors"][0]["name"], "beep");
}

#[test]
fn render_writes_audible_wav() {
    let dir = TempDir::new().unwrap();
    let scene = write_scene(dir.path(), TONE_SCENE);
    let out = dir.path().join("out.wav");

    let output = aural_bin()
        .arg("render")
        .arg(&scene)
        .arg("--output")
        .arg(&out)
        .args(["--tail", "0.5", "--bit-depth", "24", "--quiet"])
        .output()
        .expect("failed to run aural render");
    assert!(
        output.status.success(),
        "render failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let clip = aural_io::read_wav(&out).unwrap();
    assert_eq!(clip.sample_rate, 48000);
    assert_eq!(clip.channels, 2);
    // 0.5 s of tone plus 0.5 s of tail at 480 frames per period.
    assert_eq!(clip.frames(), 100 * 480);

    let peak = clip.samples.iter().fold(0.0f32, |p, s| p.max(s.abs()));
    assert!(peak > 0.05 && peak <= 0.8, "peak {peak}");
}

#[test]
fn render_looped_scene_needs_duration() {
    let dir = TempDir::new().unwrap();
    let wav = dir.path().join("loop.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 44100,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&wav, spec).unwrap();
    for n in 0..4410 {
        let s = (n as f32 * 0.05).sin() * 8000.0;
        writer.write_sample(s as i16).unwrap();
    }
    writer.finalize().unwrap();

    let scene = write_scene(
        dir.path(),
        r#"
[mixer]
refresh_rate = 100.0

[[sensors]]
name = "loop"
source = { type = "wav", path = "loop.wav", looped = true }
"#,
    );
    let out = dir.path().join("out.wav");

    let failed = aural_bin()
        .arg("render")
        .arg(&scene)
        .arg("-o")
        .arg(&out)
        .arg("--quiet")
        .output()
        .expect("failed to run aural render");
    assert!(!failed.status.success());
    assert!(String::from_utf8_lossy(&failed.stderr).contains("--duration"));

    let output = aural_bin()
        .arg("render")
        .arg(&scene)
        .arg("-o")
        .arg(&out)
        .args(["--duration", "0.5", "--quiet"])
        .output()
        .expect("failed to run aural render");
    assert!(output.status.success());
    let clip = aural_io::read_wav(&out).unwrap();
    assert_eq!(clip.frames(), 50 * 480);
}

#[test]
fn render_rejects_bad_scene() {
    let dir = TempDir::new().unwrap();
    let scene = write_scene(
        dir.path(),
        r#"
[[sensors]]
name = "orphan"
parent = "nowhere"
source = { type = "tone" }
"#,
    );
    let output = aural_bin()
        .arg("render")
        .arg(&scene)
        .arg("-o")
        .arg(dir.path().join("out.wav"))
        .output()
        .expect("failed to run aural render");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("nowhere"));
}

#[test]
fn play_through_null_backend_stops_after_duration() {
    let dir = TempDir::new().unwrap();
    let scene = write_scene(dir.path(), TONE_SCENE);
    let output = aural_bin()
        .arg("play")
        .arg(&scene)
        .args(["--backend", "null", "--duration", "0.2"])
        .output()
        .expect("failed to run aural play");
    assert!(
        output.status.success(),
        "play failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Backend: null"));
    assert!(stdout.contains("Done:"));
}

#[test]
fn devices_json_for_null_backend() {
    let output = aural_bin()
        .args(["devices", "--backend", "null", "--json"])
        .output()
        .expect("failed to run aural devices");
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["backend"], "null");
    assert_eq!(report["devices"][0]["name"], "null");
}

#[test]
fn unknown_scene_is_reported() {
    let output = aural_bin()
        .args(["info", "no_such_scene_8127"])
        .output()
        .expect("failed to run aural info");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not found"));
}
