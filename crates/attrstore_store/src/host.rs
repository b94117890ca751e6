use std::path::Path;
use std::time::Duration;

use sea_orm::sea_query::{
    Alias, IndexCreateStatement, Query, QueryStatementWriter, Table, TableCreateStatement,
};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection,
    DatabaseTransaction, QueryResult, Statement, TransactionTrait,
};
use sea_orm_migration::SchemaManager;

use crate::db::build_stmt;
use crate::{BulkLoadMode, DatabaseConfig, StoreConfig, ValueEncoding};
use attrstore_core::{AttrError, AttrResult, codec};

/// Shared handle to the backing database. Cheap to clone; every structure
/// opened on the same host shares its connection pool and settings.
#[derive(Clone)]
pub struct Host {
    conn: DatabaseConnection,
    backend: DatabaseBackend,
    value_encoding: ValueEncoding,
    bulk_load_mode: BulkLoadMode,
    log_statements: bool,
}

impl Host {
    pub async fn connect(config: &StoreConfig, base_dir: &Path) -> AttrResult<Self> {
        let url = build_connection_url(config, base_dir)?;
        let mut options = ConnectOptions::new(url);
        options.sqlx_logging(false);
        if let Some(pool) = &config.pool {
            if let Some(max) = pool.max_connections {
                options.max_connections(max);
            }
            if let Some(min) = pool.min_connections {
                options.min_connections(min);
            }
            if let Some(timeout_ms) = pool.connect_timeout_ms {
                options.connect_timeout(Duration::from_millis(timeout_ms));
            }
            if let Some(timeout_ms) = pool.acquire_timeout_ms {
                options.acquire_timeout(Duration::from_millis(timeout_ms));
            }
            if let Some(timeout_ms) = pool.idle_timeout_ms {
                options.idle_timeout(Duration::from_millis(timeout_ms));
            }
        }
        let conn = Database::connect(options).await.map_err(AttrError::from)?;
        let backend = conn.get_database_backend();
        log::debug!("attrstore connected to {} backend", config.backend_name());
        Ok(Self {
            conn,
            backend,
            value_encoding: config.value_encoding(),
            bulk_load_mode: config.bulk_load_mode(),
            log_statements: config.log_statements.unwrap_or(false),
        })
    }

    pub async fn connect_sqlite(path: &Path) -> AttrResult<Self> {
        let config = StoreConfig::default_sqlite(path.to_string_lossy());
        Self::connect(&config, path.parent().unwrap_or_else(|| Path::new("."))).await
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    pub fn backend(&self) -> DatabaseBackend {
        self.backend
    }

    pub fn value_encoding(&self) -> ValueEncoding {
        self.value_encoding
    }

    pub fn bulk_load_mode(&self) -> BulkLoadMode {
        self.bulk_load_mode
    }

    /// Whether `CREATE`/`DROP TABLE` take part in the surrounding transaction.
    /// MySQL commits DDL implicitly.
    pub fn transactional_ddl(&self) -> bool {
        matches!(
            self.backend,
            DatabaseBackend::Sqlite | DatabaseBackend::Postgres
        )
    }

    pub async fn begin(&self) -> AttrResult<DatabaseTransaction> {
        self.conn
            .begin()
            .await
            .map_err(|err| AttrError::transaction(format!("begin: {err}")))
    }

    pub async fn commit(&self, tx: DatabaseTransaction) -> AttrResult<()> {
        tx.commit()
            .await
            .map_err(|err| AttrError::transaction(format!("commit: {err}")))
    }

    pub(crate) fn encode_value(&self, value: &str) -> AttrResult<String> {
        match self.value_encoding {
            ValueEncoding::Compressed => codec::encode_str(value),
            ValueEncoding::Raw => Ok(value.to_string()),
        }
    }

    pub(crate) fn decode_value(&self, stored: String) -> AttrResult<String> {
        match self.value_encoding {
            ValueEncoding::Compressed => codec::decode_str(&stored),
            ValueEncoding::Raw => Ok(stored),
        }
    }

    fn statement<S: QueryStatementWriter>(&self, backend: DatabaseBackend, stmt: &S) -> Statement {
        let (sql, values) = build_stmt(backend, stmt);
        if self.log_statements {
            log::debug!("attrstore sql: {sql}");
        }
        Statement::from_sql_and_values(backend, sql, values)
    }

    /// Executes a write and returns the number of affected rows.
    pub(crate) async fn exec<C, S>(&self, conn: &C, stmt: &S) -> AttrResult<u64>
    where
        C: ConnectionTrait,
        S: QueryStatementWriter,
    {
        let statement = self.statement(conn.get_database_backend(), stmt);
        let result = conn.execute_raw(statement).await?;
        Ok(result.rows_affected())
    }

    pub(crate) async fn query_all<C, S>(
        &self,
        conn: &C,
        stmt: &S,
    ) -> AttrResult<Vec<QueryResult>>
    where
        C: ConnectionTrait,
        S: QueryStatementWriter,
    {
        let statement = self.statement(conn.get_database_backend(), stmt);
        let rows = conn.query_all_raw(statement).await?;
        Ok(rows)
    }

    pub(crate) async fn query_one<C, S>(
        &self,
        conn: &C,
        stmt: &S,
    ) -> AttrResult<Option<QueryResult>>
    where
        C: ConnectionTrait,
        S: QueryStatementWriter,
    {
        let statement = self.statement(conn.get_database_backend(), stmt);
        let row = conn.query_one_raw(statement).await?;
        Ok(row)
    }

    /// Creates the table and its lookup index, whichever is missing, in one
    /// transaction.
    pub(crate) async fn ensure_table(
        &self,
        table: &str,
        index_name: &str,
        create: TableCreateStatement,
        index: IndexCreateStatement,
    ) -> AttrResult<()> {
        let tx = self.begin().await?;
        let manager = SchemaManager::new(&tx);
        let created = !manager.has_table(table).await?;
        if created {
            manager.create_table(create).await?;
            log::debug!("attrstore created table {table}");
        }
        if created || !manager.has_index(table, index_name).await? {
            manager.create_index(index).await?;
            if !created {
                log::warn!("attrstore: recreated missing index {index_name} on {table}");
            }
        }
        drop(manager);
        self.commit(tx).await
    }

    pub(crate) async fn drop_tables(
        &self,
        tx: &DatabaseTransaction,
        tables: &[&str],
    ) -> AttrResult<()> {
        let manager = SchemaManager::new(tx);
        for table in tables {
            let drop = Table::drop()
                .table(Alias::new(table.to_string()))
                .if_exists()
                .to_owned();
            manager.drop_table(drop).await?;
        }
        Ok(())
    }

    pub(crate) async fn truncate_tables<C: ConnectionTrait>(
        &self,
        conn: &C,
        tables: &[&str],
    ) -> AttrResult<()> {
        for table in tables {
            let delete = Query::delete()
                .from_table(Alias::new(table.to_string()))
                .to_owned();
            self.exec(conn, &delete).await?;
        }
        Ok(())
    }
}

fn build_connection_url(config: &StoreConfig, base_dir: &Path) -> AttrResult<String> {
    match &config.database {
        DatabaseConfig::Sqlite { .. } => {
            let path = config.sqlite_path(base_dir)?;
            Ok(format!("sqlite://{}?mode=rwc", path.display()))
        }
        DatabaseConfig::Postgres { url } => Ok(url.clone()),
        DatabaseConfig::Mysql { url } => Ok(url.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn sqlite_url_is_resolved_against_base_dir() {
        let base = Path::new("/var/lib/attrs");
        let config = StoreConfig::default_sqlite("attrs.sqlite");
        let url = build_connection_url(&config, base).expect("url");
        assert_eq!(url, "sqlite:///var/lib/attrs/attrs.sqlite?mode=rwc");
    }

    #[test]
    fn server_urls_pass_through() {
        let config = StoreConfig {
            database: DatabaseConfig::Postgres {
                url: "postgres://user@localhost/attrs".to_string(),
            },
            pool: None,
            value_encoding: None,
            bulk_load_mode: None,
            log_statements: None,
        };
        let url = build_connection_url(&config, Path::new(".")).expect("url");
        assert_eq!(url, "postgres://user@localhost/attrs");
    }

    #[tokio::test]
    async fn raw_encoding_stores_values_verbatim() -> AttrResult<()> {
        let dir = tempdir().expect("tempdir");
        let mut config =
            StoreConfig::default_sqlite(dir.path().join("raw.sqlite").to_string_lossy());
        config.value_encoding = Some(ValueEncoding::Raw);
        let host = Host::connect(&config, dir.path()).await?;
        assert_eq!(host.encode_value("plain")?, "plain");
        assert_eq!(host.decode_value("plain".to_string())?, "plain");
        assert!(host.transactional_ddl());
        Ok(())
    }
}
