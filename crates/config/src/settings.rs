// Application settings
// Loaded from ~/.config/rowscope/settings.toml

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use rowscope_engine::{ColumnDef, EngineError, Schema};
use serde::{Deserialize, Serialize};

pub const CONFIG_ENV: &str = "ROWSCOPE_CONFIG";
const APP_DIR: &str = "rowscope";
const CONFIG_FILE: &str = "settings.toml";
const DB_FILE: &str = "records.sqlite";
const FILTERS_DIR: &str = "filters";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid column schema: {0}")]
    Schema(#[from] EngineError),

    #[error("export_delimiter must be a single ASCII character (got {0:?})")]
    InvalidDelimiter(String),

    #[error("page_size must be at least 1")]
    InvalidPageSize,

    #[error("no columns configured; add [[columns]] tables to the settings file")]
    NoColumns,

    #[error("cannot determine a data directory; set data_dir in the settings file")]
    NoDataDir,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Database and saved filters live here. Unset = platform data dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    // Query
    pub page_size: u64,
    pub distinct_limit: u64,

    /// Date column whose range `stats` reports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats_date_column: Option<String>,

    // Export
    pub export_delimiter: String,

    pub columns: Vec<ColumnDef>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: None,
            page_size: 50,
            distinct_limit: 200,
            stats_date_column: None,
            export_delimiter: ";".to_string(),
            columns: Vec::new(),
        }
    }
}

impl Settings {
    /// Settings file location: explicit path, else `$ROWSCOPE_CONFIG`, else
    /// the platform config dir.
    pub fn config_path(explicit: Option<&Path>) -> PathBuf {
        resolve_config_path(explicit, std::env::var_os(CONFIG_ENV))
    }

    /// Load settings; a missing file yields defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = Self::config_path(explicit);
        if !path.exists() {
            log::info!("no settings at {}; using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let settings = Self::from_toml(&contents).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        log::debug!("loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Validated column schema. The stats date column, when set, must be
    /// one of the columns.
    pub fn schema(&self) -> Result<Schema, ConfigError> {
        if self.columns.is_empty() {
            return Err(ConfigError::NoColumns);
        }
        let schema = Schema::new(self.columns.clone())?;
        if let Some(col) = &self.stats_date_column {
            schema.require(col)?;
        }
        Ok(schema)
    }

    pub fn delimiter(&self) -> Result<u8, ConfigError> {
        match self.export_delimiter.as_bytes() {
            [b] if b.is_ascii() => Ok(*b),
            _ => Err(ConfigError::InvalidDelimiter(self.export_delimiter.clone())),
        }
    }

    pub fn page_size(&self) -> Result<u64, ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::InvalidPageSize);
        }
        Ok(self.page_size)
    }

    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::data_dir()
                .map(|d| d.join(APP_DIR))
                .ok_or(ConfigError::NoDataDir),
        }
    }

    pub fn db_path(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.data_dir()?.join(DB_FILE))
    }

    pub fn filters_dir(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.data_dir()?.join(FILTERS_DIR))
    }
}

fn resolve_config_path(explicit: Option<&Path>, env: Option<OsString>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Some(path) = env.filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(CONFIG_FILE)
}
