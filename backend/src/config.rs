//! Application configuration.
//!
//! Values are layered with the `config` crate: built-in defaults, then an
//! optional TOML file (`certgen.toml` in the working directory, or the file
//! named by `CERTGEN_CONFIG`), then environment variables prefixed with
//! `CERTGEN__` using `__` as the section separator
//! (e.g. `CERTGEN__SERVER__PORT=9000`).

use crate::drafts::AutoSaveSettings;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "certgen";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub autosave: AutoSaveConfig,
    pub generator: GeneratorConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub json_limit_mb: usize,
    /// Editing sessions untouched for this long are closed. `0` disables eviction.
    pub session_idle_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub database_path: PathBuf,
    pub output_dir: PathBuf,
    pub fonts_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AutoSaveConfig {
    pub debounce_ms: u64,
    pub interval_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

/// External sample-data generator. Generation is disabled when `command` is unset.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneratorConfig {
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
}

impl From<&AutoSaveConfig> for AutoSaveSettings {
    fn from(config: &AutoSaveConfig) -> Self {
        AutoSaveSettings {
            debounce: Duration::from_millis(config.debounce_ms),
            interval: Duration::from_millis(config.interval_ms),
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

impl AppConfig {
    /// Loads configuration from the default file location and the environment.
    pub fn load() -> Result<Self, config::ConfigError> {
        let file = std::env::var("CERTGEN_CONFIG")
            .ok()
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);
        Self::from_sources(file.as_deref())
    }

    /// Loads configuration from `file` (when given) layered over the defaults.
    pub fn from_sources(file: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.json_limit_mb", 10)?
            .set_default("server.session_idle_secs", 1_800)?
            .set_default("storage.database_path", "certgen.sqlite")?
            .set_default("storage.output_dir", "./pdfs")?
            .set_default("storage.fonts_dir", "./fonts")?
            .set_default("autosave.debounce_ms", 2_000)?
            .set_default("autosave.interval_ms", 30_000)?
            .set_default("autosave.max_retries", 3)?
            .set_default("autosave.retry_backoff_ms", 5_000)?
            .set_default("generator.args", Vec::<String>::new())?;

        builder = match file {
            Some(path) => builder.add_source(config::File::from(path)),
            None => builder.add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        builder
            .add_source(config::Environment::with_prefix("CERTGEN").separator("__"))
            .build()?
            .try_deserialize()
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.server.host.clone(), self.server.port)
    }

    /// Idle timeout for editing sessions, `None` when eviction is disabled.
    pub fn session_idle_timeout(&self) -> Option<Duration> {
        match self.server.session_idle_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}
