//! Layered configuration: CLI flags > environment > TOML files > defaults.

use crate::engine::EngineOptions;
use crate::errors::DbError;
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const ENV_CONFIG: &str = "PLP_BOOKSTORE_CONFIG";
pub const ENV_DATA_DIR: &str = "PLP_BOOKSTORE_DATA_DIR";
pub const ENV_DB: &str = "PLP_BOOKSTORE_DB";
pub const ENV_COLLECTION: &str = "PLP_BOOKSTORE_COLLECTION";
pub const ENV_SEED: &str = "PLP_BOOKSTORE_SEED";
pub const ENV_LOG_DIR: &str = "PLP_BOOKSTORE_LOG_DIR";
pub const ENV_LOG_LEVEL: &str = "PLP_BOOKSTORE_LOG_LEVEL";
pub const ENV_FORMAT: &str = "PLP_BOOKSTORE_FORMAT";

/// One configuration layer; every field is optional so layers can be stacked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_dir: Option<PathBuf>,
    pub database: Option<String>,
    pub collection: Option<String>,
    pub seed_file: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    /// log4rs YAML file; replaces the built-in logging setup when set.
    pub log_config: Option<PathBuf>,
    pub report_format: Option<String>,
    pub create_if_missing: Option<bool>,
}

macro_rules! fill_missing {
    ($dst:expr, $src:expr, $($field:ident),+) => {
        $( if $dst.$field.is_none() { $dst.$field = $src.$field; } )+
    };
}

impl AppConfig {
    /// Fill every unset field from `lower`.
    pub fn fill_from(&mut self, lower: Self) {
        fill_missing!(
            self,
            lower,
            data_dir,
            database,
            collection,
            seed_file,
            log_dir,
            log_level,
            log_config,
            report_format,
            create_if_missing
        );
    }

    /// The environment layer. `lookup` is `std::env::var(..).ok()` in the binary.
    pub fn from_env(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            data_dir: get(ENV_DATA_DIR).map(PathBuf::from),
            database: get(ENV_DB),
            collection: get(ENV_COLLECTION),
            seed_file: get(ENV_SEED).map(PathBuf::from),
            log_dir: get(ENV_LOG_DIR).map(PathBuf::from),
            log_level: get(ENV_LOG_LEVEL),
            log_config: None,
            report_format: get(ENV_FORMAT),
            create_if_missing: None,
        }
    }

    /// # Errors
    /// `Config` when the file cannot be read or is not valid TOML for this structure.
    pub fn from_file(path: &Path) -> Result<Self, DbError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| DbError::Config(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&text)
            .map_err(|e| DbError::Config(format!("invalid config {}: {e}", path.display())))
    }

    /// Apply defaults and validate.
    ///
    /// # Errors
    /// `Config` for an unknown log level or report format, or an empty name.
    pub fn resolve(self) -> Result<Settings, DbError> {
        let data_dir = self.data_dir.unwrap_or_else(|| PathBuf::from("./plp_data"));
        let log_level = self.log_level.as_deref().unwrap_or("info");
        let log_level = LevelFilter::from_str(log_level)
            .map_err(|_| DbError::Config(format!("unknown log level '{log_level}'")))?;
        let report_format = self.report_format.as_deref().unwrap_or("console").parse()?;
        let database = self.database.unwrap_or_else(|| "plp_bookstore".to_string());
        let collection = self.collection.unwrap_or_else(|| "books".to_string());
        if database.trim().is_empty() || collection.trim().is_empty() {
            return Err(DbError::Config("database and collection names must not be empty".into()));
        }
        Ok(Settings {
            log_dir: self.log_dir.unwrap_or_else(|| data_dir.join("logs")),
            data_dir,
            database,
            collection,
            seed_file: self.seed_file,
            log_level,
            log_config: self.log_config,
            report_format,
            create_if_missing: self.create_if_missing.unwrap_or(true),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Plain text on stdout.
    Console,
    /// Through the `plp_bookstore::report` logger.
    Log,
    Ndjson,
}

impl FromStr for ReportFormat {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "console" | "text" => Ok(Self::Console),
            "log" => Ok(Self::Log),
            "ndjson" | "json" => Ok(Self::Ndjson),
            other => Err(DbError::Config(format!("unknown report format '{other}'"))),
        }
    }
}

impl ReportFormat {
    /// `Log` needs an installed logger; without one the report goes to the console.
    #[must_use]
    pub const fn with_logging(self, logging_ready: bool) -> Self {
        match self {
            Self::Log if !logging_ready => Self::Console,
            other => other,
        }
    }
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub database: String,
    pub collection: String,
    pub seed_file: Option<PathBuf>,
    pub log_dir: PathBuf,
    pub log_level: LevelFilter,
    pub log_config: Option<PathBuf>,
    pub report_format: ReportFormat,
    pub create_if_missing: bool,
}

impl Settings {
    #[must_use]
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            data_dir: self.data_dir.clone(),
            database: self.database.clone(),
            create_if_missing: self.create_if_missing,
        }
    }
}

/// Config files in lookup order: `--config`, `$PLP_BOOKSTORE_CONFIG`,
/// `$HOME/.config/plp_bookstore.toml`, `./bookstore.toml`.
pub fn config_paths(cli_cfg: Option<&Path>, lookup: impl Fn(&str) -> Option<String>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(p) = cli_cfg {
        paths.push(p.to_path_buf());
    }
    if let Some(p) = lookup(ENV_CONFIG) {
        paths.push(PathBuf::from(p));
    }
    if let Some(home) = lookup("HOME").or_else(|| lookup("USERPROFILE")) {
        paths.push(PathBuf::from(home).join(".config").join("plp_bookstore.toml"));
    }
    paths.push(PathBuf::from("bookstore.toml"));
    paths
}

/// Stack the layers under `cli`. The first file that sets a field wins; an explicitly
/// requested `--config` file must exist.
///
/// # Errors
/// `Config` for a missing `--config` file or any malformed file.
pub fn load_config(
    cli: AppConfig,
    cli_cfg: Option<&Path>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<AppConfig, DbError> {
    if let Some(p) = cli_cfg {
        if !p.exists() {
            return Err(DbError::Config(format!("config file {} not found", p.display())));
        }
    }
    let mut cfg = cli;
    cfg.fill_from(AppConfig::from_env(&lookup));
    for path in config_paths(cli_cfg, &lookup) {
        if path.is_file() {
            log::debug!("reading config {}", path.display());
            cfg.fill_from(AppConfig::from_file(&path)?);
        }
    }
    Ok(cfg)
}
