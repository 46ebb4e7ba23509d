//! Scene description: audio-frames and sensors under the device mixer.
//!
//! ```toml
//! [mixer]
//! sample_rate = 48000
//!
//! [[frames]]
//! name = "hall"
//! position = [0.0, 0.0, -4.0]
//! effects = [{ type = "reverb", params = { decay_level = 0.7 } }]
//!
//! [[sensors]]
//! name = "voice"
//! parent = "hall"
//! source = { type = "wav", path = "voice.wav" }
//! position = [2.0, 0.0, 0.0]
//! relative = true
//! ```
//!
//! Frames may nest through `parent`; sensors hang off a frame or, without
//! a parent, off the device mixer.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use aural_effects::{Dsp, DspKind, EffectType};
use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::effect::EffectConfig;
use crate::error::{ConfigError, Result};
use crate::mixer::MixerConfig;

/// Placement shared by frames and sensors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Placement {
    /// Position in metres.
    pub position: [f32; 3],
    /// Point the node faces; ignored when `matrix` is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub look_at: Option<[f32; 3]>,
    /// Full column-major transform; overrides `position` and `look_at`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matrix: Option<[[f32; 4]; 4]>,
    /// Velocity in metres per second.
    pub velocity: [f32; 3],
    /// Position is relative to the parent frame.
    pub relative: bool,
    /// Linear gain applied when mixing into the parent.
    pub gain: f32,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            look_at: None,
            matrix: None,
            velocity: [0.0; 3],
            relative: false,
            gain: 1.0,
        }
    }
}

impl Placement {
    /// Node matrix.
    pub fn transform(&self) -> Mat4 {
        if let Some(cols) = self.matrix {
            return Mat4::from_cols_array_2d(&cols);
        }
        let position = Vec3::from_array(self.position);
        match self.look_at.map(Vec3::from_array) {
            Some(target) if (target - position).length_squared() > f32::EPSILON => {
                let forward = (target - position).normalize();
                let up = if forward.cross(Vec3::Y).length_squared() > 1e-6 {
                    Vec3::Y
                } else {
                    Vec3::Z
                };
                // Node space looks down -Z, as in the listener convention.
                Mat4::look_to_rh(position, forward, up).inverse()
            }
            _ => Mat4::from_translation(position),
        }
    }

    /// Node velocity.
    pub fn velocity(&self) -> Vec3 {
        Vec3::from_array(self.velocity)
    }

    fn validate(&self, field: &str) -> Result<()> {
        let finite = self.position.iter().chain(&self.velocity).all(|v| v.is_finite())
            && self.look_at.is_none_or(|p| p.iter().all(|v| v.is_finite()))
            && self.matrix.is_none_or(|m| m.iter().flatten().all(|v| v.is_finite()));
        if !finite {
            return Err(ConfigError::invalid(field, "position, velocity and matrix must be finite"));
        }
        if !self.gain.is_finite() || self.gain < 0.0 {
            return Err(ConfigError::invalid(
                format!("{field}.gain"),
                "must be a finite, non-negative number",
            ));
        }
        Ok(())
    }
}

/// An audio-frame: a positional sub-mix bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrameConfig {
    /// Unique name.
    pub name: String,
    /// Enclosing frame; the device mixer when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Position, velocity and gain.
    #[serde(flatten)]
    pub placement: Placement,
    /// Filters and effects on the bus.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<EffectConfig>,
}

/// Where a sensor's samples come from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    /// A WAV file, relative paths resolved against the scene file.
    Wav {
        /// File path.
        path: PathBuf,
        /// Restart at the end.
        #[serde(default)]
        looped: bool,
    },
    /// A sine test tone.
    Tone {
        /// Frequency in Hz.
        #[serde(default = "default_frequency")]
        frequency: f32,
        /// Peak amplitude.
        #[serde(default = "default_amplitude")]
        amplitude: f32,
        /// Length in seconds.
        #[serde(default = "default_duration")]
        duration: f32,
        /// Sample rate the tone is generated at.
        #[serde(default = "default_tone_rate")]
        sample_rate: u32,
    },
}

fn default_frequency() -> f32 {
    440.0
}

fn default_amplitude() -> f32 {
    0.5
}

fn default_duration() -> f32 {
    2.0
}

fn default_tone_rate() -> u32 {
    48000
}

/// An input sensor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SensorConfig {
    /// Unique name.
    pub name: String,
    /// Enclosing frame; the device mixer when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Sample source.
    pub source: SourceConfig,
    /// Playback rate multiplier.
    #[serde(default = "default_pitch")]
    pub pitch: f32,
    /// Position, velocity and gain.
    #[serde(flatten)]
    pub placement: Placement,
    /// Filters and effects on the sensor.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<EffectConfig>,
}

fn default_pitch() -> f32 {
    1.0
}

/// A complete scene.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SceneConfig {
    /// Output and timing.
    pub mixer: MixerConfig,
    /// Filters and effects on the device mixer.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<EffectConfig>,
    /// Audio-frames.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub frames: Vec<FrameConfig>,
    /// Sensors.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sensors: Vec<SensorConfig>,
}

impl SceneConfig {
    /// Loads and validates a scene file. Relative WAV paths are resolved
    /// against the file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let mut scene = Self::from_toml(&content)?;
        if let Some(dir) = path.parent() {
            scene.resolve_paths(dir);
        }
        Ok(scene)
    }

    /// Parses and validates a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let scene: Self = toml::from_str(toml_str)?;
        scene.validate()?;
        Ok(scene)
    }

    /// Serializes to TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Writes the scene, creating parent directories.
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

    /// Makes relative WAV paths relative to `dir`.
    pub fn resolve_paths(&mut self, dir: &Path) {
        for sensor in &mut self.sensors {
            if let SourceConfig::Wav { path, .. } = &mut sensor.source
                && path.is_relative()
            {
                *path = dir.join(&*path);
            }
        }
    }

    /// Checks names, parents, placements, sources and effects.
    pub fn validate(&self) -> Result<()> {
        self.mixer.validate()?;
        to_dsps("effects", &self.effects)?;

        let mut names = HashSet::new();
        let frames: HashMap<&str, &FrameConfig> =
            self.frames.iter().map(|f| (f.name.as_str(), f)).collect();

        for frame in &self.frames {
            let field = format!("frames.{}", frame.name);
            if frame.name.is_empty() || !names.insert(frame.name.as_str()) {
                return Err(ConfigError::invalid(field, "names must be unique and non-empty"));
            }
            check_parent(&field, frame.parent.as_deref(), &frames)?;
            frame.placement.validate(&field)?;
            to_dsps(&field, &frame.effects)?;
        }
        self.frame_order()?;

        for sensor in &self.sensors {
            let field = format!("sensors.{}", sensor.name);
            if sensor.name.is_empty() || !names.insert(sensor.name.as_str()) {
                return Err(ConfigError::invalid(field, "names must be unique and non-empty"));
            }
            check_parent(&field, sensor.parent.as_deref(), &frames)?;
            sensor.placement.validate(&field)?;
            if !sensor.pitch.is_finite() || sensor.pitch <= 0.0 {
                return Err(ConfigError::invalid(format!("{field}.pitch"), "must be positive"));
            }
            if let SourceConfig::Tone {
                frequency,
                amplitude,
                duration,
                sample_rate,
            } = sensor.source
            {
                let ok = frequency.is_finite()
                    && frequency > 0.0
                    && amplitude.is_finite()
                    && duration.is_finite()
                    && duration > 0.0
                    && sample_rate > 0;
                if !ok {
                    return Err(ConfigError::invalid(
                        format!("{field}.source"),
                        "tone needs a positive frequency, duration and sample rate",
                    ));
                }
            }
            to_dsps(&field, &sensor.effects)?;
        }
        Ok(())
    }

    /// Frame indices with every parent before its children.
    ///
    /// Fails if frames enclose each other in a cycle.
    pub fn frame_order(&self) -> Result<Vec<usize>> {
        let index: HashMap<&str, usize> = self
            .frames
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.as_str(), i))
            .collect();
        let mut order = Vec::with_capacity(self.frames.len());
        // 0 = unvisited, 1 = on the current path, 2 = placed
        let mut mark = vec![0u8; self.frames.len()];

        for start in 0..self.frames.len() {
            let mut path = Vec::new();
            let mut at = Some(start);
            while let Some(i) = at {
                match mark[i] {
                    2 => break,
                    1 => {
                        return Err(ConfigError::invalid(
                            format!("frames.{}.parent", self.frames[i].name),
                            "frames enclose each other",
                        ));
                    }
                    _ => {}
                }
                mark[i] = 1;
                path.push(i);
                at = self.frames[i]
                    .parent
                    .as_deref()
                    .and_then(|p| index.get(p).copied());
            }
            for &i in path.iter().rev() {
                mark[i] = 2;
                order.push(i);
            }
        }
        Ok(order)
    }

    /// Descriptors of a sensor: its effects plus a pitch effect when the
    /// pitch is not 1.
    pub fn sensor_dsps(sensor: &SensorConfig) -> Result<Vec<Dsp>> {
        let mut dsps = to_dsps(&format!("sensors.{}", sensor.name), &sensor.effects)?;
        if sensor.pitch != 1.0 {
            let mut pitch = Dsp::new(DspKind::Effect(EffectType::Pitch));
            pitch.set_named("pitch", sensor.pitch);
            pitch.set_enabled(true);
            dsps.retain(|d| d.kind() != pitch.kind());
            dsps.push(pitch);
        }
        Ok(dsps)
    }

    /// Total number of nodes the scene creates below the device mixer.
    pub fn node_count(&self) -> usize {
        self.frames.len() + self.sensors.len()
    }
}

/// Converts a list of effect configurations, prefixing errors with `field`.
pub fn to_dsps(field: &str, effects: &[EffectConfig]) -> Result<Vec<Dsp>> {
    effects
        .iter()
        .map(|e| {
            e.to_dsp().map_err(|err| match err {
                ConfigError::InvalidParameter {
                    effect,
                    param,
                    reason,
                } => ConfigError::invalid_param(format!("{field}.{effect}"), param, reason),
                other => other,
            })
        })
        .collect()
}

fn check_parent(field: &str, parent: Option<&str>, frames: &HashMap<&str, &FrameConfig>) -> Result<()> {
    match parent {
        Some(name) if !frames.contains_key(name) => Err(ConfigError::invalid(
            format!("{field}.parent"),
            format!("no frame named '{name}'"),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE: &str = r#"
        [mixer]
        tracks = 2
        backend = "null"

        [[frames]]
        name = "inner"
        parent = "outer"
        position = [1.0, 0.0, 0.0]
        relative = true

        [[frames]]
        name = "outer"
        position = [0.0, 0.0, -4.0]
        effects = [{ type = "reverb" }]

        [[sensors]]
        name = "voice"
        parent = "inner"
        source = { type = "tone", frequency = 220.0 }
        pitch = 1.5
        gain = 0.5
    "#;

    #[test]
    fn parses_nested_scene() {
        let scene = SceneConfig::from_toml(SCENE).unwrap();
        assert_eq!(scene.node_count(), 3);
        assert_eq!(scene.frame_order().unwrap(), vec![1, 0]);
        assert!(scene.frames[0].placement.relative);
        assert_eq!(
            scene.frames[1].placement.transform(),
            Mat4::from_translation(Vec3::new(0.0, 0.0, -4.0))
        );

        let voice = &scene.sensors[0];
        assert_eq!(voice.placement.gain, 0.5);
        assert!(matches!(voice.source, SourceConfig::Tone { frequency, amplitude, .. } if frequency == 220.0 && amplitude == 0.5));
        let dsps = SceneConfig::sensor_dsps(voice).unwrap();
        assert_eq!(dsps.len(), 1);
        assert_eq!(dsps[0].get(0, 0), Some(1.5));
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let toml = r#"
            [[sensors]]
            name = "voice"
            parent = "hall"
            source = { type = "wav", path = "a.wav" }
        "#;
        let err = SceneConfig::from_toml(toml).unwrap_err();
        assert!(err.to_string().contains("sensors.voice.parent"), "{err}");
    }

    #[test]
    fn frame_cycles_are_rejected() {
        let toml = r#"
            [[frames]]
            name = "a"
            parent = "b"
            [[frames]]
            name = "b"
            parent = "a"
        "#;
        let err = SceneConfig::from_toml(toml).unwrap_err();
        assert!(err.to_string().contains("enclose"), "{err}");
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let toml = r#"
            [[frames]]
            name = "x"
            [[sensors]]
            name = "x"
            source = { type = "tone" }
        "#;
        assert!(SceneConfig::from_toml(toml).is_err());
    }

    #[test]
    fn effect_errors_carry_the_node() {
        let toml = r#"
            [[frames]]
            name = "hall"
            effects = [{ type = "echo", params = { gain = "loud" } }]
        "#;
        let err = SceneConfig::from_toml(toml).unwrap_err();
        assert!(err.to_string().contains("frames.hall.echo"), "{err}");
    }

    #[test]
    fn look_at_faces_target() {
        let placement = Placement {
            position: [0.0, 0.0, 0.0],
            look_at: Some([1.0, 0.0, 0.0]),
            ..Placement::default()
        };
        let forward = placement.transform().transform_vector3(Vec3::NEG_Z);
        assert!((forward - Vec3::X).length() < 1e-5, "{forward}");
    }

    #[test]
    fn relative_wav_paths_follow_the_scene_file() {
        let mut scene = SceneConfig {
            sensors: vec![SensorConfig {
                name: "v".into(),
                parent: None,
                source: SourceConfig::Wav {
                    path: "clips/v.wav".into(),
                    looped: false,
                },
                pitch: 1.0,
                placement: Placement::default(),
                effects: Vec::new(),
            }],
            ..SceneConfig::default()
        };
        scene.resolve_paths(Path::new("/scenes"));
        assert!(matches!(&scene.sensors[0].source, SourceConfig::Wav { path, .. } if path == Path::new("/scenes/clips/v.wav")));
    }
}
