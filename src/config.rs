//! Application-level configuration loading: storage location and audio cue assets.

use std::{collections::HashMap, env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::services::audio::SoundId;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "BRAIN_RING_BACK_CONFIG_PATH";
const DEFAULT_STORAGE_DIR: &str = "data";
/// Key the session blob is stored under.
pub const DEFAULT_STORAGE_KEY: &str = "brainRingState";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    storage_dir: PathBuf,
    storage_key: String,
    questions_path: Option<PathBuf>,
    sounds: HashMap<SoundId, String>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        storage_dir = %app_config.storage_dir.display(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Directory holding the persisted session.
    pub fn storage_dir(&self) -> &PathBuf {
        &self.storage_dir
    }

    /// Key the session blob is stored under.
    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// Question list loaded at startup, if configured.
    pub fn questions_path(&self) -> Option<&PathBuf> {
        self.questions_path.as_ref()
    }

    /// Asset path played for `sound`.
    pub fn sound_asset(&self, sound: SoundId) -> String {
        self.sounds
            .get(&sound)
            .cloned()
            .unwrap_or_else(|| default_asset(sound))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            questions_path: None,
            sounds: HashMap::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    storage_dir: Option<PathBuf>,
    storage_key: Option<String>,
    questions_path: Option<PathBuf>,
    /// Sound key (`red`, `warning`, `end`, ...) to asset path.
    sounds: HashMap<String, String>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let sounds = value
            .sounds
            .into_iter()
            .filter_map(|(key, asset)| match SoundId::from_key(&key) {
                Some(sound) => Some((sound, asset)),
                None => {
                    warn!(key, "ignoring unknown sound key in config");
                    None
                }
            })
            .collect();

        Self {
            storage_dir: value
                .storage_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR)),
            storage_key: value
                .storage_key
                .filter(|key| !key.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_STORAGE_KEY.to_string()),
            questions_path: value.questions_path,
            sounds,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn default_asset(sound: SoundId) -> String {
    match sound {
        SoundId::Team(team) => format!("sounds/{team}.mp3"),
        SoundId::Warning => "sounds/background.mp3".to_string(),
        SoundId::End => "sounds/off.mp3".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::game::TeamColor;

    #[test]
    fn raw_config_overrides_and_keeps_defaults() {
        let raw: RawConfig = serde_json::from_str(
            r#"{"storage_key":"  ","sounds":{"red":"cues/red.ogg","bogus":"x.mp3"}}"#,
        )
        .unwrap();
        let config = AppConfig::from(raw);

        assert_eq!(config.storage_key(), DEFAULT_STORAGE_KEY);
        assert_eq!(config.storage_dir(), &PathBuf::from("data"));
        assert_eq!(config.sound_asset(SoundId::Team(TeamColor::Red)), "cues/red.ogg");
        assert_eq!(
            config.sound_asset(SoundId::Team(TeamColor::Pink)),
            "sounds/pink.mp3"
        );
        assert_eq!(config.sound_asset(SoundId::End), "sounds/off.mp3");
    }
}
