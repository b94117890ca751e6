use sea_orm::sea_query;
use sea_orm::sea_query::{
    ColumnDef, IntoIden, MysqlQueryBuilder, PostgresQueryBuilder, QueryStatementWriter,
    SqliteQueryBuilder,
};
use sea_orm::{DatabaseBackend, QueryResult};
use sea_orm_migration::prelude::Iden;

use attrstore_core::AttrResult;

/// Columns of a flat key/value relation.
#[derive(Iden, Clone, Copy)]
pub enum KvColumn {
    AttrKey,
    AttrValue,
}

/// Column of a membership set relation.
#[derive(Iden, Clone, Copy)]
pub enum SetColumn {
    Member,
}

pub(crate) const COUNT_ALIAS: &str = "cnt";

/// Widest utf8mb4 `VARCHAR` InnoDB can index in full (3072 bytes).
pub(crate) const MYSQL_LOOKUP_CHARS: u32 = 768;

/// A non-null string column that lookups compare against.
///
/// MySQL's default collations fold case and accents, which would make
/// `bob` and `Bob` the same key; there the column gets a binary collation.
pub(crate) fn lookup_column(backend: DatabaseBackend, column: impl IntoIden) -> ColumnDef {
    let mut def = ColumnDef::new(column);
    match backend {
        DatabaseBackend::MySql => {
            def.string_len(MYSQL_LOOKUP_CHARS)
                .extra("CHARACTER SET utf8mb4 COLLATE utf8mb4_bin");
        }
        _ => {
            def.string();
        }
    }
    def.not_null();
    def
}

pub(crate) fn col_name(column: impl sea_query::Iden) -> String {
    column.to_string()
}

pub(crate) fn build_stmt<S: QueryStatementWriter>(
    backend: DatabaseBackend,
    stmt: &S,
) -> (String, sea_orm::sea_query::Values) {
    match backend {
        DatabaseBackend::Sqlite => stmt.build(SqliteQueryBuilder),
        DatabaseBackend::Postgres => stmt.build(PostgresQueryBuilder),
        DatabaseBackend::MySql => stmt.build(MysqlQueryBuilder),
        _ => stmt.build(SqliteQueryBuilder),
    }
}

pub(crate) fn read_string(row: &QueryResult, column: impl sea_query::Iden) -> AttrResult<String> {
    let value: String = row.try_get("", &col_name(column))?;
    Ok(value)
}

pub(crate) fn read_count(row: Option<QueryResult>) -> AttrResult<u64> {
    let Some(row) = row else {
        return Ok(0);
    };
    let count: i64 = row.try_get("", COUNT_ALIAS)?;
    Ok(u64::try_from(count).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::sea_query::{Alias, SchemaStatementBuilder, Table};

    fn create_sql(backend: DatabaseBackend) -> String {
        let create = Table::create()
            .table(Alias::new("people_kv"))
            .col(lookup_column(backend, KvColumn::AttrKey))
            .to_owned();
        match backend {
            DatabaseBackend::MySql => create.to_string(MysqlQueryBuilder),
            DatabaseBackend::Postgres => create.to_string(PostgresQueryBuilder),
            _ => create.to_string(SqliteQueryBuilder),
        }
    }

    #[test]
    fn mysql_lookup_columns_compare_bytes() {
        let sql = create_sql(DatabaseBackend::MySql);
        assert!(sql.contains("COLLATE utf8mb4_bin"), "{sql}");
        assert!(sql.contains("varchar(768)"), "{sql}");
    }

    #[test]
    fn other_backends_keep_default_collation() {
        for backend in [DatabaseBackend::Sqlite, DatabaseBackend::Postgres] {
            let sql = create_sql(backend);
            assert!(!sql.contains("COLLATE"), "{sql}");
            assert!(sql.contains("NOT NULL"), "{sql}");
        }
    }
}
