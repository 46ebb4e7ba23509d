//! Output device and render timing.

use std::path::Path;

use aural_mixer::MixerSettings;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Integer PCM encoding exchanged with the backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    /// Signed 16-bit.
    #[default]
    Pcm16,
    /// Signed 24-bit.
    Pcm24,
}

impl SampleFormat {
    /// Bits per sample.
    pub fn bits(self) -> u16 {
        match self {
            Self::Pcm16 => 16,
            Self::Pcm24 => 24,
        }
    }
}

/// Mixer configuration.
///
/// Every field has a default, so an empty file or table is valid:
///
/// ```rust
/// use aural_config::MixerConfig;
///
/// let config = MixerConfig::from_toml("refresh_rate = 50.0\ntracks = 4").unwrap();
/// assert_eq!(config.sample_rate, 48000);
/// assert_eq!(config.period_frames(), 960);
/// assert_eq!(config.settings().tracks, 4);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MixerConfig {
    /// Mix and output sample rate in Hz.
    pub sample_rate: u32,
    /// Render periods per second.
    pub refresh_rate: f32,
    /// Output tracks (channels).
    pub tracks: u16,
    /// PCM encoding handed to the backend.
    pub format: SampleFormat,
    /// Render periods per matrix-update pass.
    pub update_interval: u32,
    /// Rendered periods queued between the mixer thread and the device.
    pub handoff_periods: u32,
    /// Backend name: cpal, wav or null.
    pub backend: String,
    /// Device name (fuzzy match) or, for the wav backend, the output path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// Master output gain.
    pub gain: f32,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            refresh_rate: 46.875,
            tracks: 2,
            format: SampleFormat::Pcm16,
            update_interval: 4,
            handoff_periods: 2,
            backend: "cpal".to_string(),
            device: None,
            gain: 1.0,
        }
    }
}

impl MixerConfig {
    /// Largest track count the renderer supports.
    pub const MAX_TRACKS: u16 = aural_core::MAX_TRACKS as u16;

    /// Loads and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Parses and validates a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes to TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Writes the configuration, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
        std::fs::write(path, self.to_toml()?).map_err(|e| ConfigError::write_file(path, e))
    }

    /// Checks ranges that the engine would otherwise silently clamp.
    pub fn validate(&self) -> Result<()> {
        if !(8000..=384_000).contains(&self.sample_rate) {
            return Err(ConfigError::invalid(
                "mixer.sample_rate",
                format!("{} Hz is outside 8000..=384000", self.sample_rate),
            ));
        }
        if !self.refresh_rate.is_finite() || self.refresh_rate <= 0.0 {
            return Err(ConfigError::invalid(
                "mixer.refresh_rate",
                "must be a positive number of periods per second",
            ));
        }
        if self.period_frames() < 16 {
            return Err(ConfigError::invalid(
                "mixer.refresh_rate",
                format!("{} Hz leaves fewer than 16 frames per period", self.refresh_rate),
            ));
        }
        if self.tracks == 0 || self.tracks > Self::MAX_TRACKS {
            return Err(ConfigError::invalid(
                "mixer.tracks",
                format!("{} is outside 1..={}", self.tracks, Self::MAX_TRACKS),
            ));
        }
        if self.update_interval == 0 {
            return Err(ConfigError::invalid("mixer.update_interval", "must be at least 1"));
        }
        if self.handoff_periods == 0 {
            return Err(ConfigError::invalid("mixer.handoff_periods", "must be at least 1"));
        }
        if !self.gain.is_finite() || self.gain < 0.0 {
            return Err(ConfigError::invalid("mixer.gain", "must be a finite, non-negative number"));
        }
        Ok(())
    }

    /// Frames per render period.
    pub fn period_frames(&self) -> usize {
        self.settings().period_frames
    }

    /// Render settings for [`aural_mixer::Mixer`].
    pub fn settings(&self) -> MixerSettings {
        MixerSettings::from_refresh_rate(
            self.sample_rate as f32,
            usize::from(self.tracks),
            self.refresh_rate,
            self.update_interval,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_give_1024_frame_periods() {
        let config = MixerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.period_frames(), 1024);
        assert_eq!(config.settings().update_interval, 4);
    }

    #[test]
    fn format_names_are_lowercase() {
        let config = MixerConfig::from_toml("format = \"pcm24\"").unwrap();
        assert_eq!(config.format, SampleFormat::Pcm24);
        assert_eq!(config.format.bits(), 24);
        assert!(MixerConfig::from_toml("format = \"float\"").is_err());
    }

    #[test]
    fn validation_names_the_field() {
        for (toml, field) in [
            ("tracks = 0", "mixer.tracks"),
            ("tracks = 12", "mixer.tracks"),
            ("sample_rate = 1000", "mixer.sample_rate"),
            ("refresh_rate = 0.0", "mixer.refresh_rate"),
            ("refresh_rate = 8000.0", "mixer.refresh_rate"),
            ("update_interval = 0", "mixer.update_interval"),
            ("gain = -1.0", "mixer.gain"),
        ] {
            let err = MixerConfig::from_toml(toml).unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { field: ref f, .. } if f == field),
                "{toml}: {err}"
            );
        }
    }

    #[test]
    fn toml_round_trip_keeps_device() {
        let config = MixerConfig {
            backend: "wav".into(),
            device: Some("out.wav".into()),
            ..MixerConfig::default()
        };
        let parsed = MixerConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }
}
