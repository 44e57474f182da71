//! Configuration resolution for the migration flows
//!
//! Every field resolves in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! The resolved [`MigrationConfig`] is built once at flow start and passed by
//! reference into every stage.

use crate::{Error, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const ENV_DATA_LOAD_ENV: &str = "DATA_LOAD_ENV";
pub const ENV_COLIN_DB_URL: &str = "SQLALCHEMY_DATABASE_URI_COLIN_MIGR";
pub const ENV_LEAR_DB_URL: &str = "DATABASE_URL";
pub const ENV_CORP_NAME_SUFFIX: &str = "CORP_NAME_SUFFIX";
pub const ENV_BATCH_SIZE: &str = "MIG_BATCH_SIZE";
pub const ENV_MAX_CONCURRENCY: &str = "MIG_MAX_CONCURRENCY";
pub const ENV_REPROCESS_FAILED: &str = "MIG_REPROCESS_FAILED";
pub const ENV_CORP_TYPES: &str = "MIG_CORP_TYPES";

const DEFAULT_DATA_LOAD_ENV: &str = "dev";
const DEFAULT_BATCH_SIZE: usize = 20;
const DEFAULT_MAX_CONCURRENCY: usize = 8;

const CORPS_FLOW_TYPES: &[&str] = &[
    "BC", "C", "ULC", "CUL", "CC", "CCC", "QA", "QB", "QC", "QD", "QE",
];
const FIRMS_FLOW_TYPES: &[&str] = &["SP", "GP"];

/// Which migration flow is running
///
/// Both flows share the tracker table; rows are separated by [`FlowKind::flow_name`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowKind {
    /// Corporations (BC, ULC, CC, ...)
    Corps,
    /// Sole proprietorships and general partnerships
    Firms,
}

impl FlowKind {
    /// Tracker key for this flow
    pub fn flow_name(&self) -> &'static str {
        match self {
            FlowKind::Corps => "corps-flow",
            FlowKind::Firms => "sp-gp-flow",
        }
    }

    /// Corp type codes this flow selects when no override is configured
    pub fn default_corp_types(&self) -> Vec<String> {
        let types = match self {
            FlowKind::Corps => CORPS_FLOW_TYPES,
            FlowKind::Firms => FIRMS_FLOW_TYPES,
        };
        types.iter().map(|t| t.to_string()).collect()
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.flow_name())
    }
}

impl FromStr for FlowKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "corps" | "corps-flow" => Ok(FlowKind::Corps),
            "firms" | "sp-gp" | "sp-gp-flow" => Ok(FlowKind::Firms),
            other => Err(Error::Config(format!("Unknown flow: {}", other))),
        }
    }
}

/// Optional values read from the TOML config file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub data_load_env: Option<String>,
    pub colin_db_url: Option<String>,
    pub lear_db_url: Option<String>,
    pub corp_name_suffix: Option<String>,
    pub batch_size: Option<usize>,
    pub max_concurrency: Option<usize>,
    pub reprocess_failed: Option<bool>,
    pub corp_types: Option<Vec<String>>,
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub data_load_env: Option<String>,
    pub colin_db_url: Option<String>,
    pub lear_db_url: Option<String>,
    pub batch_size: Option<usize>,
    pub max_concurrency: Option<usize>,
    pub config_path: Option<PathBuf>,
}

/// Resolved configuration for one flow run
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub flow: FlowKind,
    /// Environment whose tracker rows are eligible and written
    pub data_load_env: String,
    pub colin_db_url: String,
    pub lear_db_url: String,
    /// Appended to legal names in test environments
    pub corp_name_suffix: Option<String>,
    pub batch_size: usize,
    pub max_concurrency: usize,
    /// Re-select businesses left FAILED, PARTIAL or PROCESSING by an earlier run
    pub reprocess_failed: bool,
    pub corp_types: Vec<String>,
}

impl MigrationConfig {
    /// Configuration with compiled defaults for the given database URLs
    pub fn new(flow: FlowKind, colin_db_url: impl Into<String>, lear_db_url: impl Into<String>) -> Self {
        Self {
            flow,
            data_load_env: DEFAULT_DATA_LOAD_ENV.to_string(),
            colin_db_url: colin_db_url.into(),
            lear_db_url: lear_db_url.into(),
            corp_name_suffix: None,
            batch_size: DEFAULT_BATCH_SIZE,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            reprocess_failed: true,
            corp_types: flow.default_corp_types(),
        }
    }

    /// Resolve from CLI overrides, process environment and the TOML file
    pub fn resolve(flow: FlowKind, overrides: &ConfigOverrides) -> Result<Self> {
        let toml_config = load_toml_config(overrides.config_path.as_deref())?;
        Self::from_sources(flow, overrides, |name| std::env::var(name).ok(), &toml_config)
    }

    /// Resolve from explicit sources
    ///
    /// `env` is consulted for each variable name; empty values count as unset.
    pub fn from_sources<F>(
        flow: FlowKind,
        overrides: &ConfigOverrides,
        env: F,
        toml_config: &TomlConfig,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |name: &str| env(name).filter(|v| !v.trim().is_empty());

        let data_load_env = overrides
            .data_load_env
            .clone()
            .or_else(|| env(ENV_DATA_LOAD_ENV))
            .or_else(|| toml_config.data_load_env.clone())
            .unwrap_or_else(|| DEFAULT_DATA_LOAD_ENV.to_string());

        let colin_db_url = overrides
            .colin_db_url
            .clone()
            .or_else(|| env(ENV_COLIN_DB_URL))
            .or_else(|| toml_config.colin_db_url.clone())
            .ok_or_else(|| {
                Error::Config(format!(
                    "COLIN database URL not configured (set {} or colin_db_url in TOML)",
                    ENV_COLIN_DB_URL
                ))
            })?;

        let lear_db_url = overrides
            .lear_db_url
            .clone()
            .or_else(|| env(ENV_LEAR_DB_URL))
            .or_else(|| toml_config.lear_db_url.clone())
            .ok_or_else(|| {
                Error::Config(format!(
                    "LEAR database URL not configured (set {} or lear_db_url in TOML)",
                    ENV_LEAR_DB_URL
                ))
            })?;

        let corp_name_suffix = env(ENV_CORP_NAME_SUFFIX)
            .or_else(|| toml_config.corp_name_suffix.clone())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let batch_size = match overrides.batch_size {
            Some(v) => v,
            None => match env(ENV_BATCH_SIZE) {
                Some(v) => parse_value(ENV_BATCH_SIZE, &v)?,
                None => toml_config.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
            },
        };
        if batch_size == 0 {
            return Err(Error::Config("batch_size must be greater than zero".to_string()));
        }

        let max_concurrency = match overrides.max_concurrency {
            Some(v) => v,
            None => match env(ENV_MAX_CONCURRENCY) {
                Some(v) => parse_value(ENV_MAX_CONCURRENCY, &v)?,
                None => toml_config.max_concurrency.unwrap_or(DEFAULT_MAX_CONCURRENCY),
            },
        }
        .max(1);

        let reprocess_failed = match env(ENV_REPROCESS_FAILED) {
            Some(v) => parse_bool(ENV_REPROCESS_FAILED, &v)?,
            None => toml_config.reprocess_failed.unwrap_or(true),
        };

        let corp_types = env(ENV_CORP_TYPES)
            .map(|v| split_list(&v))
            .or_else(|| toml_config.corp_types.clone())
            .filter(|types| !types.is_empty())
            .unwrap_or_else(|| flow.default_corp_types());

        Ok(Self {
            flow,
            data_load_env,
            colin_db_url,
            lear_db_url,
            corp_name_suffix,
            batch_size,
            max_concurrency,
            reprocess_failed,
            corp_types,
        })
    }
}

/// Load the TOML config file
///
/// An explicit path must exist. Without one, the per-user default location is
/// tried and a missing file yields an empty config.
pub fn load_toml_config(path: Option<&Path>) -> Result<TomlConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match default_config_path() {
            Some(p) if p.exists() => p,
            _ => return Ok(TomlConfig::default()),
        },
    };

    let content = std::fs::read_to_string(&path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))
}

/// `~/.config/colin-migrate/config.toml` on Linux, platform equivalent elsewhere
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("colin-migrate").join("config.toml"))
}

fn parse_value<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} has invalid value '{}'", name, value)))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Ok(true),
        "0" | "false" | "no" | "n" => Ok(false),
        _ => Err(Error::Config(format!("{} has invalid value '{}'", name, value))),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}
