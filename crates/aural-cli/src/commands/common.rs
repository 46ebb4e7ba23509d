//! Shared CLI helpers used across multiple commands.

use aural_config::{MixerConfig, SampleFormat, SceneConfig, find_scene, load_user_mixer_config};
use aural_io::{Backend, BackendConfig, NullBackend, PcmFormat, backend_by_name};
use aural_mixer::MixerSettings;

/// Load a scene by path or by name from the user scenes directory.
pub fn load_scene(name: &str) -> anyhow::Result<SceneConfig> {
    let Some(path) = find_scene(name) else {
        anyhow::bail!(
            "Scene '{}' not found. Pass a .toml path or a name in {}.",
            name,
            aural_config::user_scenes_dir().display()
        );
    };
    tracing::debug!(path = %path.display(), "loading scene");
    SceneConfig::load(&path).map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))
}

/// The user's mixer defaults, used when a command runs without a scene.
pub fn default_mixer_config() -> anyhow::Result<MixerConfig> {
    load_user_mixer_config().map_err(|e| anyhow::anyhow!("{}", e))
}

/// PCM encoding for a configured sample format.
pub fn pcm_format(format: SampleFormat) -> PcmFormat {
    match format {
        SampleFormat::Pcm16 => PcmFormat::Pcm16,
        SampleFormat::Pcm24 => PcmFormat::Pcm24,
    }
}

/// Backend request derived from the mixer configuration.
pub fn backend_config(config: &MixerConfig) -> BackendConfig {
    BackendConfig {
        sample_rate: config.sample_rate,
        tracks: config.tracks,
        period_frames: config.period_frames() as u32,
        format: pcm_format(config.format),
        periods: config.handoff_periods,
    }
}

/// Mixer settings matching what the backend negotiated.
pub fn negotiated_settings(config: &MixerConfig, negotiated: &BackendConfig) -> MixerSettings {
    MixerSettings {
        sample_rate: negotiated.sample_rate as f32,
        tracks: usize::from(negotiated.tracks),
        period_frames: negotiated.period_frames as usize,
        update_interval: config.update_interval,
    }
}

/// A backend for real-time playback. The null sink is paced to the period
/// clock so it behaves like a device.
pub fn live_backend(name: &str) -> anyhow::Result<Box<dyn Backend>> {
    if matches!(name.to_ascii_lowercase().as_str(), "null" | "none") {
        return Ok(Box::new(NullBackend::paced()));
    }
    Ok(backend_by_name(name)?)
}

/// Peak absolute sample value.
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |p, s| p.max(s.abs()))
}

/// Linear gain in dBFS, floored at -120.
pub fn to_db(gain: f32) -> f32 {
    if gain <= 1e-6 {
        -120.0
    } else {
        20.0 * gain.log10()
    }
}
