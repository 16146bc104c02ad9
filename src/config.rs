//! TOML configuration parsing and validation.
//!
//! ```toml
//! [db]
//! path = "./data/envsync.sqlite"
//!
//! [sync]
//! actor = "envsync"
//! default_source = "Production"
//! default_target = "Local"
//!
//! [lookup]
//! max_results = 10
//!
//! [server]
//! bind = "127.0.0.1:7341"
//!
//! [log]
//! level = "info"
//! ```
//!
//! Only `[db]` is required; every other section has defaults.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use envsync_core::lookup::DEFAULT_LOOKUP_LIMIT;
use envsync_core::orchestrator::DEFAULT_ACTOR;
use envsync_core::SyncOptions;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub lookup: LookupConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default = "default_actor")]
    pub actor: String,
    #[serde(default = "default_source")]
    pub default_source: String,
    #[serde(default = "default_target")]
    pub default_target: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            actor: default_actor(),
            default_source: default_source(),
            default_target: default_target(),
        }
    }
}

fn default_actor() -> String {
    DEFAULT_ACTOR.to_string()
}
fn default_source() -> String {
    "Production".to_string()
}
fn default_target() -> String {
    "Local".to_string()
}

impl SyncConfig {
    pub fn options(&self) -> SyncOptions {
        SyncOptions {
            actor: self.actor.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LookupConfig {
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
        }
    }
}

fn default_max_results() -> usize {
    DEFAULT_LOOKUP_LIMIT
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

impl Config {
    /// Defaults with the database under `./data`, for commands that can
    /// run without a config file.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from("./data/envsync.sqlite"),
            },
            sync: SyncConfig::default(),
            lookup: LookupConfig::default(),
            server: ServerConfig::default(),
            log: LogConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.sync.actor.trim().is_empty() {
        anyhow::bail!("sync.actor must not be empty");
    }

    if config.sync.default_source.trim().is_empty() || config.sync.default_target.trim().is_empty()
    {
        anyhow::bail!("sync.default_source and sync.default_target must not be empty");
    }

    if config.sync.default_source == config.sync.default_target {
        anyhow::bail!(
            "sync.default_source and sync.default_target must differ (both are '{}')",
            config.sync.default_source
        );
    }

    if !(1..=100).contains(&config.lookup.max_results) {
        anyhow::bail!("lookup.max_results must be in [1, 100]");
    }

    if config.server.bind.trim().is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Config {
        toml::from_str(toml_src).unwrap()
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let cfg = parse("[db]\npath = \"/tmp/x.sqlite\"\n");
        assert_eq!(cfg.sync.actor, "envsync");
        assert_eq!(cfg.sync.default_source, "Production");
        assert_eq!(cfg.sync.default_target, "Local");
        assert_eq!(cfg.lookup.max_results, 10);
        assert_eq!(cfg.log.level, "info");
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn test_same_default_environments_rejected() {
        let cfg = parse(
            "[db]\npath = \"/tmp/x.sqlite\"\n[sync]\ndefault_source = \"Local\"\ndefault_target = \"Local\"\n",
        );
        let err = validate(&cfg).unwrap_err();
        assert!(err.to_string().contains("must differ"));
    }

    #[test]
    fn test_lookup_limit_range() {
        let cfg = parse("[db]\npath = \"/tmp/x.sqlite\"\n[lookup]\nmax_results = 0\n");
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_empty_actor_rejected() {
        let cfg = parse("[db]\npath = \"/tmp/x.sqlite\"\n[sync]\nactor = \" \"\n");
        assert!(validate(&cfg).is_err());
    }
}
