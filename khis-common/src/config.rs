//! Configuration loading
//!
//! Settings resolve in priority order:
//! 1. Command-line argument (handled by the binary, highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is not an error: a warning is logged and defaults apply.

use crate::{Error, Program, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "KHIS_ETL_CONFIG";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// sqlx connection string for the relational store
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// HTTP bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP port
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub khis: KhisConfig,

    #[serde(default)]
    pub tables: TableConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote analytics API location and account
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct KhisConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl fmt::Debug for KhisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KhisConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Resolved credential triple consumed by the remote client
#[derive(Clone, PartialEq, Eq)]
pub struct KhisCredentials {
    pub base_url: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for KhisCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KhisCredentials")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl KhisConfig {
    /// Resolve the credential triple, failing if any part is missing or blank
    pub fn credentials(&self) -> Result<KhisCredentials> {
        fn required(value: &Option<String>, name: &str) -> Result<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| {
                    Error::Config(format!(
                        "KHIS {} not configured (set it in the TOML [khis] table or the environment)",
                        name
                    ))
                })
        }

        Ok(KhisCredentials {
            base_url: required(&self.base_url, "base_url")?
                .trim_end_matches('/')
                .to_string(),
            username: required(&self.username, "username")?,
            password: required(&self.password, "password")?,
        })
    }
}

/// Destination table names per program
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    #[serde(default = "default_fp_raw")]
    pub fp_raw: String,
    #[serde(default = "default_fp_summary")]
    pub fp_summary: String,
    #[serde(default = "default_mnch_raw")]
    pub mnch_raw: String,
    #[serde(default = "default_mnch_summary")]
    pub mnch_summary: String,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            fp_raw: default_fp_raw(),
            fp_summary: default_fp_summary(),
            mnch_raw: default_mnch_raw(),
            mnch_summary: default_mnch_summary(),
        }
    }
}

impl TableConfig {
    /// Table receiving extracted observations for `program`
    pub fn raw_table(&self, program: Program) -> &str {
        match program {
            Program::Fp => &self.fp_raw,
            Program::Mnch => &self.mnch_raw,
        }
    }

    /// Table receiving county + national aggregates for `program`
    pub fn summary_table(&self, program: Program) -> &str {
        match program {
            Program::Fp => &self.fp_summary,
            Program::Mnch => &self.mnch_summary,
        }
    }
}

/// Pipeline tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Program used when a request does not name one
    #[serde(default = "default_program")]
    pub program: Program,

    /// Facilities per remote query
    #[serde(default = "default_chunk_size")]
    pub facility_chunk_size: usize,

    /// Per-request timeout for the remote API
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Share of "2 Rod" service volume attributed to Jadelle
    #[serde(default = "default_jadelle_ratio")]
    pub jadelle_ratio: f64,

    /// Default extraction window (days back from today)
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            facility_chunk_size: default_chunk_size(),
            request_timeout_secs: default_timeout_secs(),
            jadelle_ratio: default_jadelle_ratio(),
            lookback_days: default_lookback_days(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stdout if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_database_url() -> String {
    "sqlite://khis.db?mode=rwc".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5740
}

fn default_fp_raw() -> String {
    "fp_khis_raw_data".to_string()
}

fn default_fp_summary() -> String {
    "fp_national_summary".to_string()
}

fn default_mnch_raw() -> String {
    "mnch_khis_raw_data".to_string()
}

fn default_mnch_summary() -> String {
    "mnch_national_summary".to_string()
}

fn default_program() -> Program {
    Program::Fp
}

fn default_chunk_size() -> usize {
    400
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_jadelle_ratio() -> f64 {
    0.8
}

fn default_lookback_days() -> i64 {
    90
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            host: default_host(),
            port: default_port(),
            khis: KhisConfig::default(),
            tables: TableConfig::default(),
            pipeline: PipelineConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl TomlConfig {
    /// Load configuration from `path`, falling back to defaults when the file is absent
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            warn!("No config file location available, using defaults");
            return Ok(Self::default());
        };

        if !path.exists() {
            warn!("Config file not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        let config: TomlConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup (environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T>
        where
            T::Err: fmt::Display,
        {
            raw.trim()
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Invalid value for {}: {} ({})", key, raw, e)))
        }

        if let Some(v) = lookup("DATABASE_URL") {
            self.database_url = v;
        }
        if let Some(v) = lookup("KHIS_ETL_HOST") {
            self.host = v;
        }
        if let Some(v) = lookup("KHIS_ETL_PORT") {
            self.port = parse("KHIS_ETL_PORT", &v)?;
        }
        if let Some(v) = lookup("DHIS2_BASE_URL") {
            self.khis.base_url = Some(v);
        }
        if let Some(v) = lookup("DHIS2_USERNAME") {
            self.khis.username = Some(v);
        }
        if let Some(v) = lookup("DHIS2_PASSWORD") {
            self.khis.password = Some(v);
        }
        if let Some(v) = lookup("FP_KHIS_RAW_DATA_TABLE_NAME") {
            self.tables.fp_raw = v;
        }
        if let Some(v) = lookup("FP_NATIONAL_SUMMARY_TABLE_NAME") {
            self.tables.fp_summary = v;
        }
        if let Some(v) = lookup("MNCH_KHIS_RAW_DATA_TABLE_NAME") {
            self.tables.mnch_raw = v;
        }
        if let Some(v) = lookup("MNCH_NATIONAL_SUMMARY_TABLE_NAME") {
            self.tables.mnch_summary = v;
        }
        if let Some(v) = lookup("KHIS_PROGRAM") {
            self.pipeline.program = v.parse()?;
        }
        if let Some(v) = lookup("KHIS_FACILITY_CHUNK_SIZE") {
            self.pipeline.facility_chunk_size = parse("KHIS_FACILITY_CHUNK_SIZE", &v)?;
        }
        if let Some(v) = lookup("KHIS_REQUEST_TIMEOUT_SECS") {
            self.pipeline.request_timeout_secs = parse("KHIS_REQUEST_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("KHIS_JADELLE_RATIO") {
            self.pipeline.jadelle_ratio = parse("KHIS_JADELLE_RATIO", &v)?;
        }
        if let Some(v) = lookup("KHIS_LOOKBACK_DAYS") {
            self.pipeline.lookback_days = parse("KHIS_LOOKBACK_DAYS", &v)?;
        }
        if let Some(v) = lookup("KHIS_LOG_LEVEL") {
            self.logging.level = v;
        }

        Ok(())
    }

    /// Reject settings that would make every run fail later
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.facility_chunk_size == 0 {
            return Err(Error::Config(
                "pipeline.facility_chunk_size must be at least 1".to_string(),
            ));
        }
        if self.pipeline.request_timeout_secs == 0 {
            return Err(Error::Config(
                "pipeline.request_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.pipeline.lookback_days < 0 {
            return Err(Error::Config(
                "pipeline.lookback_days cannot be negative".to_string(),
            ));
        }
        for program in Program::ALL {
            for table in [
                self.tables.raw_table(program),
                self.tables.summary_table(program),
            ] {
                if !table.starts_with(program.table_prefix()) {
                    return Err(Error::Config(format!(
                        "Table {} configured for {} must start with '{}'",
                        table,
                        program,
                        program.table_prefix()
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Resolve the config file location: CLI argument, then environment, then platform default
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(path));
    }

    default_config_path()
}

/// Platform config location (`~/.config/khis-etl/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("khis-etl").join("config.toml"))
}
