//! Mixer and scene configuration for the aural mixing engine.
//!
//! - **Mixer**: [`MixerConfig`] holds sample rate, refresh rate, tracks,
//!   PCM format, update interval and backend selection
//! - **Scenes**: [`SceneConfig`] describes audio-frames and sensors with
//!   placements, sources and effects
//! - **Effects**: [`EffectConfig`] converts to an [`aural_effects::Dsp`]
//! - **Paths**: platform config and scene directories
//!
//! All types load from TOML and every field has a default.
//!
//! # Example
//!
//! ```rust
//! use aural_config::SceneConfig;
//!
//! let scene = SceneConfig::from_toml(r#"
//!     [mixer]
//!     backend = "null"
//!
//!     [[frames]]
//!     name = "room"
//!     position = [0.0, 0.0, -2.0]
//!     effects = [{ type = "reverb", params = { decay_level = "70%" } }]
//!
//!     [[sensors]]
//!     name = "beep"
//!     parent = "room"
//!     source = { type = "tone", frequency = 880.0 }
//! "#).unwrap();
//!
//! assert_eq!(scene.frames[0].effects[0].to_dsp().unwrap().get(0, 2), Some(0.7));
//! ```

mod effect;
mod error;
mod mixer;
mod scene;

/// Platform-specific paths for configuration and scenes.
pub mod paths;

pub use effect::{EffectConfig, ParamValue, parse_model, parse_order, parse_param_value, parse_waveform};
pub use error::{ConfigError, Result};
pub use mixer::{MixerConfig, SampleFormat};
pub use paths::{
    ensure_user_config_dir, find_scene, list_user_scenes, load_user_mixer_config,
    mixer_config_path, user_config_dir, user_scenes_dir,
};
pub use scene::{FrameConfig, Placement, SceneConfig, SensorConfig, SourceConfig, to_dsps};
