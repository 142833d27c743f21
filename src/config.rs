//! Application-level configuration loading, including gameplay timings and the
//! question bank location.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "QUIZ_RALLY_BACK_CONFIG_PATH";
/// Default question bank file, relative to the working directory.
const DEFAULT_QUESTION_FILE: &str = "config/questions.txt";
/// Seconds players get to answer each question.
const DEFAULT_QUESTION_SECS: u64 = 30;
/// Seconds the correct answer stays on screen before the next question.
const DEFAULT_REVEAL_SECS: u64 = 5;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    question_file: PathBuf,
    question_secs: u64,
    reveal_secs: u64,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in
    /// defaults when the file is absent or unreadable.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        question_secs = config.question_secs,
                        "loaded configuration"
                    );
                    config
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

    /// Path of the question bank file loaded at startup.
    pub fn question_file(&self) -> &PathBuf {
        &self.question_file
    }

    /// Answer window advertised to clients, in whole seconds.
    pub fn question_secs(&self) -> u64 {
        self.question_secs
    }

    /// Deadline after which an open question resolves on its own.
    pub fn question_duration(&self) -> Duration {
        Duration::from_secs(self.question_secs)
    }

    /// Pause between revealing an answer and posing the next question.
    pub fn reveal_delay(&self) -> Duration {
        Duration::from_secs(self.reveal_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            question_file: PathBuf::from(DEFAULT_QUESTION_FILE),
            question_secs: DEFAULT_QUESTION_SECS,
            reveal_secs: DEFAULT_REVEAL_SECS,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
///
/// Every field is optional so operators only override what they need.
struct RawConfig {
    question_file: Option<PathBuf>,
    question_secs: Option<u64>,
    reveal_secs: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            question_file: value.question_file.unwrap_or(defaults.question_file),
            question_secs: value.question_secs.unwrap_or(defaults.question_secs),
            reveal_secs: value.reveal_secs.unwrap_or(defaults.reveal_secs),
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
