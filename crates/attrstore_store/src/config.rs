use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use attrstore_core::{AttrError, AttrResult};

const DEFAULT_CONFIG_NAME: &str = "attrstore.json";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum DatabaseConfig {
    Sqlite { path: Option<String> },
    Postgres { url: String },
    Mysql { url: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolConfig {
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub connect_timeout_ms: Option<u64>,
    pub acquire_timeout_ms: Option<u64>,
    pub idle_timeout_ms: Option<u64>,
}

/// How values are written to the value column.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ValueEncoding {
    /// zstd + hex; safe for any content on any backend.
    #[default]
    Compressed,
    /// Stored verbatim. Content the backend's text type rejects will fail.
    Raw,
}

/// How `AttributeStore::set_large_map` runs its three write phases.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BulkLoadMode {
    /// One transaction per phase, run concurrently and joined before
    /// returning. Readers may observe one phase without the others.
    #[default]
    Phased,
    /// All phases in a single transaction, one after another.
    Atomic,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    pub database: DatabaseConfig,
    pub pool: Option<PoolConfig>,
    pub value_encoding: Option<ValueEncoding>,
    pub bulk_load_mode: Option<BulkLoadMode>,
    pub log_statements: Option<bool>,
}

impl StoreConfig {
    pub fn default_sqlite(path: impl Into<String>) -> Self {
        Self {
            database: DatabaseConfig::Sqlite {
                path: Some(path.into()),
            },
            pool: None,
            value_encoding: Some(ValueEncoding::Compressed),
            bulk_load_mode: Some(BulkLoadMode::Phased),
            log_statements: Some(false),
        }
    }

    pub fn load_or_init(base_dir: &Path, default_sqlite_path: &Path) -> AttrResult<Self> {
        fs::create_dir_all(base_dir)
            .map_err(|err| AttrError::storage(format!("create config dir: {err}")))?;
        let config_path = base_dir.join(DEFAULT_CONFIG_NAME);
        if config_path.exists() {
            let raw = fs::read_to_string(&config_path)
                .map_err(|err| AttrError::storage(format!("read config: {err}")))?;
            let config: StoreConfig = serde_json::from_str(&raw)
                .map_err(|err| AttrError::validation(err.to_string()))?;
            return Ok(config);
        }
        let default = StoreConfig::default_sqlite(default_sqlite_path.to_string_lossy());
        let payload = serde_json::to_string_pretty(&default)
            .map_err(|err| AttrError::storage(format!("serialize config: {err}")))?;
        fs::write(&config_path, payload)
            .map_err(|err| AttrError::storage(format!("write config: {err}")))?;
        Ok(default)
    }

    pub fn sqlite_path(&self, base_dir: &Path) -> AttrResult<PathBuf> {
        match &self.database {
            DatabaseConfig::Sqlite { path } => {
                let path = path.clone().unwrap_or_else(|| "attrstore.sqlite".to_string());
                let candidate = PathBuf::from(path);
                if candidate.is_absolute() {
                    Ok(candidate)
                } else {
                    Ok(base_dir.join(candidate))
                }
            }
            _ => Err(AttrError::validation("config is not sqlite backend")),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self.database {
            DatabaseConfig::Sqlite { .. } => "sqlite",
            DatabaseConfig::Postgres { .. } => "postgres",
            DatabaseConfig::Mysql { .. } => "mysql",
        }
    }

    pub fn connection_url(&self) -> Option<&str> {
        match &self.database {
            DatabaseConfig::Sqlite { .. } => None,
            DatabaseConfig::Postgres { url } | DatabaseConfig::Mysql { url } => Some(url.as_str()),
        }
    }

    pub fn value_encoding(&self) -> ValueEncoding {
        self.value_encoding.unwrap_or_default()
    }

    pub fn bulk_load_mode(&self) -> BulkLoadMode {
        self.bulk_load_mode.unwrap_or_default()
    }
}
