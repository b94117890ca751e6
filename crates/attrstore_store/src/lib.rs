pub mod attributes;
pub mod config;
pub mod datastore;
mod db;
pub mod host;
pub mod keyvalue;
pub mod set;

pub use attrstore_core::*;
pub use attributes::{AttributeStore, BulkLoadReport};
pub use config::{BulkLoadMode, DatabaseConfig, PoolConfig, StoreConfig, ValueEncoding};
pub use datastore::{default_sqlite_path, load_or_init_config, open_host};
pub use host::Host;
pub use keyvalue::FlatKeyValue;
pub use set::MembershipSet;
