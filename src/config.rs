//! Application configuration loaded from a JSON file.
//!
//! The file may name only the fields it wants to change. Each field of the
//! file replaces the built-in default only when it is present and non-zero
//! (non-empty string, non-zero number); anything else keeps the default. A
//! missing file is replaced by the defaults, which are written back so the
//! next run has a file to edit.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

/// Default location of the config file.
pub const DEFAULT_CONFIG_PATH: &str = "./config.json";
/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "FLEET_CONFIG_PATH";
/// Environment variable injecting the database URI at runtime (never saved).
pub const DATABASE_URI_ENV: &str = "FLEET_DATABASE_URI";

/// Effective application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Listen address, Go style (":443") or "host:port"
    pub port: String,
    pub database: DatabaseConfig,
}

/// Document store connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `memory://` or `firestore://<project-id>`
    pub uri: String,
    /// Prefix for every collection name
    pub name: String,
    /// Bound on every store call, in seconds
    pub timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: ":443".to_string(),
            database: DatabaseConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            uri: String::new(),
            name: "iotdb".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Partial configuration as read from the file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigOverride {
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default)]
    pub database: Option<DatabaseOverride>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseOverride {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Replace `dst` with `src` unless `src` is absent or the zero value.
fn merge_scalar<T: Default + PartialEq>(dst: &mut T, src: Option<T>) {
    if let Some(value) = src {
        if value != T::default() {
            *dst = value;
        }
    }
}

impl DatabaseConfig {
    fn merge(&mut self, over: DatabaseOverride) {
        merge_scalar(&mut self.uri, over.uri);
        merge_scalar(&mut self.name, over.name);
        merge_scalar(&mut self.timeout_secs, over.timeout_secs);
    }
}

impl AppConfig {
    /// Merge a partial override onto this configuration.
    pub fn merged(mut self, over: ConfigOverride) -> Self {
        merge_scalar(&mut self.port, over.port);
        if let Some(database) = over.database {
            self.database.merge(database);
        }
        self
    }

    /// Socket address to bind. A bare ":port" binds on all interfaces.
    pub fn bind_address(&self) -> String {
        if self.port.starts_with(':') {
            format!("0.0.0.0{}", self.port)
        } else {
            self.port.clone()
        }
    }

    /// Apply runtime-only overrides from the environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_database_uri(env::var(DATABASE_URI_ENV).ok())
    }

    fn with_database_uri(mut self, uri: Option<String>) -> Self {
        merge_scalar(&mut self.database.uri, uri);
        self
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to encode config: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Loads and persists the process configuration.
///
/// `load` holds the write lock for the whole read-parse-merge step, `save`
/// holds the read lock while serializing, so no caller ever observes a
/// partially merged configuration.
pub struct ConfigLoader {
    path: PathBuf,
    current: RwLock<AppConfig>,
}

impl ConfigLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            current: RwLock::new(AppConfig::default()),
        }
    }

    /// Loader for the path named by `FLEET_CONFIG_PATH` (or `./config.json`).
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok(); // Load .env file if present

        let path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the current effective configuration.
    pub fn current(&self) -> AppConfig {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Read the config file and merge it onto the defaults.
    ///
    /// A missing file installs the defaults and writes them out.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);

        match fs::read_to_string(&self.path) {
            Ok(data) => {
                let over: ConfigOverride =
                    serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
                        path: self.path.clone(),
                        source,
                    })?;
                *current = AppConfig::default().merged(over);
                tracing::debug!(path = %self.path.display(), "Config file merged onto defaults");
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!(
                    path = %self.path.display(),
                    "Config file not found, writing defaults"
                );
                *current = AppConfig::default();
                persist(&self.path, &current)?;
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        }

        Ok(current.clone())
    }

    /// Write the current effective configuration to the config file.
    pub fn save(&self) -> Result<(), ConfigError> {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        persist(&self.path, &current)
    }
}

fn persist(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    let data = serde_json::to_string_pretty(config)?;
    fs::write(path, data).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}
