//! Platform-specific paths for the mixer configuration and scenes.
//!
//! - **User config**: `~/.config/aural/` (Linux),
//!   `~/Library/Application Support/aural/` (macOS), `%APPDATA%\aural\`
//!   (Windows)
//! - **Mixer defaults**: `<user config>/mixer.toml`
//! - **Scenes**: `<user config>/scenes/`

use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};
use crate::mixer::MixerConfig;

const APP_NAME: &str = "aural";
const SCENES_SUBDIR: &str = "scenes";
const MIXER_FILE: &str = "mixer.toml";

/// Returns the user-specific configuration directory.
///
/// Falls back to the working directory if the platform has none.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Returns the user-specific scenes directory.
pub fn user_scenes_dir() -> PathBuf {
    user_config_dir().join(SCENES_SUBDIR)
}

/// Path of the user's default mixer configuration.
pub fn mixer_config_path() -> PathBuf {
    user_config_dir().join(MIXER_FILE)
}

/// Loads the user's mixer configuration, or the defaults if there is none.
pub fn load_user_mixer_config() -> Result<MixerConfig> {
    let path = mixer_config_path();
    if path.is_file() {
        MixerConfig::load(&path)
    } else {
        Ok(MixerConfig::default())
    }
}

/// Ensures the user config directory exists.
pub fn ensure_user_config_dir() -> Result<PathBuf> {
    let dir = user_config_dir();
    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| ConfigError::create_dir(&dir, e))?;
    }
    Ok(dir)
}

/// Finds a scene by path or by name in the user scenes directory.
///
/// A name may omit the `.toml` extension.
pub fn find_scene(name: &str) -> Option<PathBuf> {
    let path = PathBuf::from(name);
    if path.is_file() {
        return Some(path);
    }

    let filename = if name.ends_with(".toml") {
        name.to_string()
    } else {
        format!("{name}.toml")
    };
    let user_path = user_scenes_dir().join(filename);
    user_path.is_file().then_some(user_path)
}

/// Scene files in the user scenes directory.
pub fn list_user_scenes() -> Vec<PathBuf> {
    list_toml_in_dir(&user_scenes_dir())
}

fn list_toml_in_dir(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    files.sort();
    files
}

/// Scene name from a file path (the file stem).
///
/// ```rust
/// use aural_config::paths::scene_name_from_path;
/// use std::path::Path;
///
/// assert_eq!(scene_name_from_path(Path::new("/s/hall.toml")), Some("hall".to_string()));
/// ```
pub fn scene_name_from_path(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn dirs_are_namespaced() {
        assert!(user_config_dir().to_string_lossy().contains("aural"));
        assert!(user_scenes_dir().ends_with("aural/scenes"));
        assert!(mixer_config_path().ends_with("aural/mixer.toml"));
    }

    #[test]
    fn find_scene_by_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hall.toml");
        fs::write(&path, "").unwrap();
        assert_eq!(find_scene(path.to_str().unwrap()), Some(path));
        assert!(find_scene("no_such_scene_8127").is_none());
    }

    #[test]
    fn lists_only_toml_sorted() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("b.toml"), "").unwrap();
        fs::write(temp.path().join("a.toml"), "").unwrap();
        fs::write(temp.path().join("notes.txt"), "").unwrap();
        let files = list_toml_in_dir(temp.path());
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("a.toml"));
        assert!(list_toml_in_dir(Path::new("/nonexistent/aural/8127")).is_empty());
    }
}
