//! Application-level configuration loading: listen port, storage backend and update tuning.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TICTACTOE_BACK_CONFIG_PATH";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_MAX_UPDATE_ATTEMPTS: u32 = 3;
const DEFAULT_FEED_CAPACITY: usize = 16;
const DEFAULT_SSE_KEEP_ALIVE_SECS: u64 = 15;

/// Storage backend selected at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// In-process store; state is lost on restart.
    #[default]
    Memory,
    /// CouchDB over HTTP.
    Couch,
    /// MongoDB replica set (change streams need one).
    Mongo,
}

impl StoreKind {
    /// Lowercase name, as written in the configuration file.
    pub fn as_str(self) -> &'static str {
        match self {
            StoreKind::Memory => "memory",
            StoreKind::Couch => "couch",
            StoreKind::Mongo => "mongo",
        }
    }
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    port: u16,
    store: StoreKind,
    max_update_attempts: u32,
    feed_capacity: usize,
    sse_keep_alive: Duration,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        store = ?app_config.store,
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

    /// Parse a configuration document; missing fields take their defaults.
    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// Override the listen port, e.g. from the `PORT` environment variable.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override the storage backend.
    pub fn with_store(mut self, store: StoreKind) -> Self {
        self.store = store;
        self
    }

    /// Override how many times a rejected conditional update is retried.
    pub fn with_max_update_attempts(mut self, attempts: u32) -> Self {
        self.max_update_attempts = attempts.max(1);
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn store(&self) -> StoreKind {
        self.store
    }

    /// Upper bound on read-validate-update rounds for one operation. Always at least 1.
    pub fn max_update_attempts(&self) -> u32 {
        self.max_update_attempts
    }

    /// Buffer between a session feed and its SSE response.
    pub fn feed_capacity(&self) -> usize {
        self.feed_capacity
    }

    pub fn sse_keep_alive(&self) -> Duration {
        self.sse_keep_alive
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    port: Option<u16>,
    store: StoreKind,
    max_update_attempts: Option<u32>,
    feed_capacity: Option<usize>,
    sse_keep_alive_secs: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            port: value.port.unwrap_or(DEFAULT_PORT),
            store: value.store,
            max_update_attempts: value
                .max_update_attempts
                .unwrap_or(DEFAULT_MAX_UPDATE_ATTEMPTS)
                .max(1),
            feed_capacity: value.feed_capacity.unwrap_or(DEFAULT_FEED_CAPACITY).max(1),
            sse_keep_alive: Duration::from_secs(
                value
                    .sse_keep_alive_secs
                    .unwrap_or(DEFAULT_SSE_KEEP_ALIVE_SECS)
                    .max(1),
            ),
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
