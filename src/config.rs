//! Pipeline configuration loaded from a TOML file.
//!
//! ```toml
//! files_store = "data"
//! database_url = "sqlite://gazettes.db"
//! concurrency = 8
//!
//! [http]
//! connect_timeout_secs = 30
//! read_timeout_secs = 300
//!
//! [sources.sp_sao_paulo]
//! source_id = "3550308"
//! start_date = "2015-01-01"
//! download_file_headers = { Referer = "https://diariooficial.prefeitura.sp.gov.br" }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::catalog::SourceRegistration;
use crate::db::DatabaseOptions;
use crate::download::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use crate::runner::DEFAULT_CONCURRENCY;

/// Top-level configuration for one pipeline run.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Root directory of the file store.
    pub files_store: PathBuf,
    /// Database connection string. `None` disables metadata persistence.
    #[serde(default)]
    pub database_url: Option<String>,
    /// Maximum number of records processed concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Stored files older than this are fetched again. `None` never expires.
    #[serde(default)]
    pub files_expires_days: Option<u32>,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Per-source settings keyed by spider name.
    #[serde(default)]
    pub sources: BTreeMap<String, SourceConfig>,
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

/// HTTP client timeouts for file downloads.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            read_timeout_secs: READ_TIMEOUT_SECS,
        }
    }
}

fn default_connect_timeout() -> u64 {
    CONNECT_TIMEOUT_SECS
}

fn default_read_timeout() -> u64 {
    READ_TIMEOUT_SECS
}

/// Connection pool tuning.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    pub max_connections: Option<u32>,
    pub busy_timeout_ms: Option<u32>,
}

impl DatabaseConfig {
    /// Resolves pool options, falling back to defaults for unset values.
    #[must_use]
    pub fn options(&self) -> DatabaseOptions {
        let defaults = DatabaseOptions::default();
        DatabaseOptions {
            max_connections: self.max_connections.unwrap_or(defaults.max_connections),
            busy_timeout_ms: self.busy_timeout_ms.unwrap_or(defaults.busy_timeout_ms),
        }
    }
}

/// Settings of one publishing source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// Stable identifier stamped on every record (e.g. an IBGE territory code).
    pub source_id: String,
    /// Records published before this date are dropped.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    /// Extra headers sent with plain file URL fetches.
    #[serde(default)]
    pub download_file_headers: BTreeMap<String, String>,
}

impl SourceConfig {
    #[must_use]
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_start_date(mut self, start_date: NaiveDate) -> Self {
        self.start_date = Some(start_date);
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.download_file_headers.insert(name.into(), value.into());
        self
    }
}

impl PipelineConfig {
    /// Reads, parses and validates a config file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read, is not valid TOML for this schema,
    /// or holds out-of-range values.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        Self::from_toml_str(&raw)
            .with_context(|| format!("Failed to parse config file '{}'", path.display()))
    }

    /// Parses and validates config from TOML text.
    ///
    /// # Errors
    ///
    /// Fails on invalid TOML or out-of-range values.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates values against runtime constraints.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.concurrency) {
            bail!(
                "Invalid config value for `concurrency`: {}. Expected range: 1..=100",
                self.concurrency
            );
        }
        if self.files_store.as_os_str().is_empty() {
            bail!("Invalid config value for `files_store`: must not be empty");
        }
        if self
            .database_url
            .as_deref()
            .is_some_and(|url| url.trim().is_empty())
        {
            bail!("Invalid config value for `database_url`: must not be empty when set");
        }
        validate_timeout_secs("http.connect_timeout_secs", self.http.connect_timeout_secs)?;
        validate_timeout_secs("http.read_timeout_secs", self.http.read_timeout_secs)?;
        if let Some(value) = self.database.max_connections
            && !(1..=20).contains(&value)
        {
            bail!(
                "Invalid config value for `database.max_connections`: {value}. Expected range: 1..=20"
            );
        }
        if let Some(value) = self.database.busy_timeout_ms
            && value > 120_000
        {
            bail!(
                "Invalid config value for `database.busy_timeout_ms`: {value}. Expected range: 0..=120000"
            );
        }
        for (name, source) in &self.sources {
            let id = source.source_id.trim();
            if id.is_empty() {
                bail!("Invalid config value for `sources.{name}.source_id`: must not be empty");
            }
            if id.contains(['/', '\\']) || id == "." || id == ".." {
                bail!(
                    "Invalid config value for `sources.{name}.source_id`: {id:?} is not a single path segment"
                );
            }
        }
        Ok(())
    }

    /// Sources to record in the catalog: those with a start date.
    #[must_use]
    pub fn source_registrations(&self) -> Vec<SourceRegistration> {
        self.sources
            .iter()
            .filter_map(|(name, source)| {
                Some(SourceRegistration {
                    spider_name: name.clone(),
                    source_id: source.source_id.clone(),
                    date_from: source.start_date?,
                })
            })
            .collect()
    }

    /// Looks up the settings of a source by spider name.
    ///
    /// # Errors
    ///
    /// Fails when the source is not configured.
    pub fn source(&self, name: &str) -> Result<&SourceConfig> {
        self.sources
            .get(name)
            .with_context(|| format!("Unknown source '{name}': add a [sources.{name}] table"))
    }
}

fn validate_timeout_secs(field: &str, value: u64) -> Result<()> {
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}
