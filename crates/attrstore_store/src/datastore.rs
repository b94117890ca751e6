use std::path::{Path, PathBuf};

use crate::{AttrResult, Host, StoreConfig};

const DEFAULT_DB_NAME: &str = "attrstore.sqlite";

pub fn load_or_init_config(base: &Path) -> AttrResult<StoreConfig> {
    let default_sqlite = base.join(DEFAULT_DB_NAME);
    StoreConfig::load_or_init(base, &default_sqlite)
}

/// Loads (or writes) the config under `base` and connects to its database.
pub async fn open_host(base: &Path) -> AttrResult<Host> {
    let config = load_or_init_config(base)?;
    Host::connect(&config, base).await
}

pub fn default_sqlite_path(base: &Path) -> PathBuf {
    base.join(DEFAULT_DB_NAME)
}
