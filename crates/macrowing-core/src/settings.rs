//! User settings persisted as `settings.json` in the data directory

use crate::error::{Error, Result};
use crate::trajectory::Easing;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const SETTINGS_FILE: &str = "settings.json";
pub const MACROS_FILE: &str = "macros.json";

/// Application data directory: `%APPDATA%\MacroWing` on Windows,
/// `$HOME/.config/MacroWing` elsewhere
pub fn data_dir() -> Result<PathBuf> {
    let base = if cfg!(target_os = "windows") {
        std::env::var_os("APPDATA")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
    } else {
        std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config"))
    };
    let base = base.ok_or_else(|| {
        Error::not_found("home directory").with_suggestions(vec![
            "Set HOME (or APPDATA on Windows)".to_string(),
        ])
    })?;
    let dir = base.join("MacroWing");
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Combo that stops any playback
    pub panic_key: String,
    pub record_mouse_movement: bool,
    pub record_key_release: bool,
    /// Minimum pointer travel in pixels before a move is recorded
    pub mouse_move_threshold: f64,
    pub smooth_mouse_enabled: bool,
    pub smooth_mouse_easing: Easing,
    pub smooth_mouse_speed: f64,
    pub smooth_mouse_min_duration: f64,
    pub smooth_mouse_max_duration: f64,
    pub smooth_mouse_steps_per_second: u32,
    /// How long `stop` waits for a playback thread before abandoning it
    pub stop_timeout_ms: u64,
    /// Lead time before a CLI recording starts
    pub countdown_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            panic_key: "escape".to_string(),
            record_mouse_movement: false,
            record_key_release: true,
            mouse_move_threshold: 10.0,
            smooth_mouse_enabled: true,
            smooth_mouse_easing: Easing::EaseOutCubic,
            smooth_mouse_speed: 1.0,
            smooth_mouse_min_duration: 50.0,
            smooth_mouse_max_duration: 800.0,
            smooth_mouse_steps_per_second: 120,
            stop_timeout_ms: 1000,
            countdown_secs: 3,
        }
    }
}

impl Settings {
    pub fn default_path() -> Result<PathBuf> {
        Ok(data_dir()?.join(SETTINGS_FILE))
    }

    /// Missing file gives defaults; a corrupt one is logged and ignored
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&content) {
            Ok(s) => s,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable settings");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::load(dir.path().join("nope.json"));
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, r#"{"smooth_mouse_speed": 2.5, "smooth_mouse_easing": "linear"}"#).unwrap();
        let s = Settings::load(&path);
        assert_eq!(s.smooth_mouse_speed, 2.5);
        assert_eq!(s.smooth_mouse_easing, Easing::Linear);
        assert_eq!(s.panic_key, "escape");
    }

    #[test]
    fn corrupt_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load(&path), Settings::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILE);
        let s = Settings {
            record_mouse_movement: true,
            mouse_move_threshold: 4.0,
            ..Default::default()
        };
        s.save(&path).unwrap();
        assert_eq!(Settings::load(&path), s);
    }
}
