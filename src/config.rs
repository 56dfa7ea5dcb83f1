// ABOUTME: Run configuration from an optional TOML file and command line flags
// ABOUTME: Merges layers (CLI over file over defaults) into connection params and migration options

use crate::migration::ddl::CreateMode;
use crate::migration::rows::{check_batch_size, DEFAULT_BATCH_SIZE};
use crate::migration::run::MigrationOptions;
use crate::postgres::ConnectionParams;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_LOG_FILE: &str = "log_migration.txt";

/// Connection settings for one side; unset fields fall through to the next layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl EndpointConfig {
    fn or(self, fallback: EndpointConfig) -> EndpointConfig {
        EndpointConfig {
            host: self.host.or(fallback.host),
            port: self.port.or(fallback.port),
            database: self.database.or(fallback.database),
            user: self.user.or(fallback.user),
            password: self.password.or(fallback.password),
        }
    }

    fn resolve(self, defaults: &EndpointDefaults) -> ConnectionParams {
        ConnectionParams {
            host: self.host.unwrap_or_else(|| defaults.host.to_string()),
            port: self.port.unwrap_or(defaults.port),
            database: self.database.unwrap_or_else(|| defaults.database.to_string()),
            user: self.user.unwrap_or_else(|| defaults.user.to_string()),
            password: self.password.unwrap_or_else(|| defaults.password.to_string()),
        }
    }
}

struct EndpointDefaults {
    host: &'static str,
    port: u16,
    database: &'static str,
    user: &'static str,
    password: &'static str,
}

const SOURCE_DEFAULTS: EndpointDefaults = EndpointDefaults {
    host: "localhost",
    port: 5432,
    database: "postgres",
    user: "postgres",
    password: "testtest",
};

const TARGET_DEFAULTS: EndpointDefaults = EndpointDefaults {
    host: "localhost",
    port: 5432,
    database: "postgres",
    user: "SYSTEM",
    password: "MANAGER",
};

/// One layer of settings, as read from a config file or the command line
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    pub batch_size: Option<usize>,
    pub create_mode: Option<CreateMode>,
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub source: EndpointConfig,
    #[serde(default)]
    pub target: EndpointConfig,
}

impl ConfigLayer {
    /// Fill every unset field from `fallback`
    pub fn or(self, fallback: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            batch_size: self.batch_size.or(fallback.batch_size),
            create_mode: self.create_mode.or(fallback.create_mode),
            log_file: self.log_file.or(fallback.log_file),
            source: self.source.or(fallback.source),
            target: self.target.or(fallback.target),
        }
    }
}

/// Fully resolved settings for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub source: ConnectionParams,
    pub target: ConnectionParams,
    pub options: MigrationOptions,
    pub log_file: PathBuf,
}

/// Read a TOML config file
///
/// ```toml
/// batch_size = 500
/// create_mode = "if-not-exists"
///
/// [source]
/// host = "db.internal"
/// database = "app"
/// ```
pub fn load_config_file(path: &Path) -> Result<ConfigLayer> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    toml::from_str(&raw)
        .with_context(|| format!("Failed to parse TOML config at {}", path.display()))
}

/// Merge the command line over the optional file layer and apply defaults
pub fn resolve(cli: ConfigLayer, file: Option<ConfigLayer>) -> Result<Settings> {
    let merged = match file {
        Some(file) => cli.or(file),
        None => cli,
    };

    let batch_size = merged.batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
    check_batch_size(batch_size)?;

    Ok(Settings {
        source: merged.source.resolve(&SOURCE_DEFAULTS),
        target: merged.target.resolve(&TARGET_DEFAULTS),
        options: MigrationOptions {
            batch_size,
            create_mode: merged.create_mode.unwrap_or_default(),
        },
        log_file: merged
            .log_file
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
    })
}
