//! Application-level configuration loading: token secret, save debounce and tournament defaults.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::tournament::DEFAULT_TOURNAMENT_NAME;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "POKER_CLOCK_CONFIG_PATH";
/// Environment variable that overrides the token secret from the file.
const JWT_SECRET_ENV: &str = "POKER_CLOCK_JWT_SECRET";
/// Secret used when nothing is configured; only suitable for local development.
const DEV_JWT_SECRET: &str = "poker-clock-dev-secret";
const DEFAULT_SAVE_DEBOUNCE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    jwt_secret: String,
    save_debounce: Duration,
    default_tournament_name: String,
}

impl AppConfig {
    /// Load the configuration from disk and the environment, falling back to built-in defaults.
    pub fn load() -> Self {
        let mut config = Self::from_file();
        if let Some(secret) = env::var(JWT_SECRET_ENV).ok().filter(|secret| !secret.is_empty()) {
            info!("using token secret from {JWT_SECRET_ENV}");
            config.jwt_secret = secret;
        }
        if config.jwt_secret == DEV_JWT_SECRET {
            warn!("no token secret configured; using the development secret");
        }
        config
    }

    fn from_file() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        save_debounce_ms = app_config.save_debounce.as_millis() as u64,
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

    /// Secret used to verify and sign access tokens.
    pub fn jwt_secret(&self) -> &str {
        &self.jwt_secret
    }

    /// Quiet period before a changed tournament is written to storage.
    pub fn save_debounce(&self) -> Duration {
        self.save_debounce
    }

    /// Name given to tournaments created without one.
    pub fn default_tournament_name(&self) -> &str {
        &self.default_tournament_name
    }

    /// Replace the token secret.
    pub fn with_jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.jwt_secret = secret.into();
        self
    }

    /// Replace the save debounce.
    pub fn with_save_debounce(mut self, debounce: Duration) -> Self {
        self.save_debounce = debounce;
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_owned(),
            save_debounce: DEFAULT_SAVE_DEBOUNCE,
            default_tournament_name: DEFAULT_TOURNAMENT_NAME.to_owned(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    jwt_secret: Option<String>,
    save_debounce_ms: Option<u64>,
    default_tournament_name: Option<String>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            jwt_secret: value
                .jwt_secret
                .filter(|secret| !secret.is_empty())
                .unwrap_or(defaults.jwt_secret),
            save_debounce: value
                .save_debounce_ms
                .map_or(defaults.save_debounce, Duration::from_millis),
            default_tournament_name: value
                .default_tournament_name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or(defaults.default_tournament_name),
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
