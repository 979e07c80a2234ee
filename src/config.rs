//! Application-level configuration loading, including the sprint timing knobs.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "SPRINT_BACK_CONFIG_PATH";

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    sprint: SprintConfig,
}

/// Timing parameters for one sprint session, copied into the aggregate at
/// creation so a running game is unaffected by later config changes.
#[derive(Debug, Clone)]
pub struct SprintConfig {
    /// Length of the pre-game countdown in seconds.
    pub countdown_seconds: u32,
    /// Length of the active tap window in milliseconds.
    pub window_duration_ms: u64,
    /// How long a finished session stays queryable before eviction.
    pub finish_grace: Duration,
    /// How long a `waiting` session with no players survives before the
    /// idle sweeper evicts it.
    pub idle_timeout: Duration,
}

impl Default for SprintConfig {
    fn default() -> Self {
        Self {
            countdown_seconds: 3,
            window_duration_ms: 15_000,
            finish_grace: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(300),
        }
    }
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(path = %path.display(), "loaded sprint configuration");
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

    /// Build a configuration with explicit sprint timings, mainly for tests.
    pub fn with_sprint(sprint: SprintConfig) -> Self {
        Self { sprint }
    }

    /// Timing parameters applied to newly created sprint sessions.
    pub fn sprint(&self) -> &SprintConfig {
        &self.sprint
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sprint: SprintConfig::default(),
        }
    }
}

/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    countdown_seconds: Option<u32>,
    #[serde(default)]
    window_duration_ms: Option<u64>,
    #[serde(default)]
    finish_grace_seconds: Option<u64>,
    #[serde(default)]
    idle_timeout_seconds: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = SprintConfig::default();
        Self {
            sprint: SprintConfig {
                countdown_seconds: value.countdown_seconds.unwrap_or(defaults.countdown_seconds),
                window_duration_ms: value
                    .window_duration_ms
                    .unwrap_or(defaults.window_duration_ms),
                finish_grace: value
                    .finish_grace_seconds
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.finish_grace),
                idle_timeout: value
                    .idle_timeout_seconds
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.idle_timeout),
            },
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
