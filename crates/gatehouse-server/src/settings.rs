//! Server settings.
//!
//! Sources, lowest precedence first:
//! 1. serde defaults
//! 2. the TOML file named by `GATEHOUSE_CONFIG` (default `gatehouse.toml`),
//!    skipped when absent
//! 3. `GATEHOUSE__`-prefixed environment variables, e.g.
//!    `GATEHOUSE__DB__URL` or `GATEHOUSE__DB__POOL__MAX_SIZE`

use std::path::Path;

use config::{Config, ConfigError, Environment, File, Source};
use gatehouse_db::DbConfig;
use serde::Deserialize;

pub const CONFIG_PATH_ENV: &str = "GATEHOUSE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "gatehouse.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub log_filter: String,
    pub db: DbConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_filter: "gatehouse=info".into(),
            db: DbConfig::default(),
        }
    }
}

/// Load from the configured file path and the environment.
pub fn load() -> Result<AppConfig, ConfigError> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    load_from(path)
}

pub fn load_from<P: AsRef<Path>>(path: P) -> Result<AppConfig, ConfigError> {
    from_source(File::from(path.as_ref()).required(false))
}

fn from_source<S>(file: S) -> Result<AppConfig, ConfigError>
where
    S: Source + Send + Sync + 'static,
{
    Config::builder()
        .add_source(file)
        .add_source(
            Environment::with_prefix("GATEHOUSE")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}
