use async_trait::async_trait;
use sea_orm::ConnectionTrait;
use sea_orm::sea_query::{Alias, ColumnDef, Expr, ExprTrait, Func, Index, Query, Table};

use crate::Host;
use crate::db::{COUNT_ALIAS, KvColumn, lookup_column, read_count, read_string};
use attrstore_core::{AttrError, AttrResult, KeyValueApi, escape};

pub(crate) const KEY_VALUE_SUFFIX: &str = "_kv";

/// A flat key -> value map backed by one relation with `attr_key` and
/// `attr_value` columns.
///
/// Every operation has a `*_with` form that runs on any connection, so it can
/// be composed into a caller's transaction. The [`KeyValueApi`] methods run in
/// auto-commit mode on the host pool.
#[derive(Clone)]
pub struct FlatKeyValue {
    host: Host,
    table: String,
}

impl FlatKeyValue {
    /// Opens (creating if needed) the key/value structure `name`.
    pub async fn open(host: &Host, name: &str) -> AttrResult<Self> {
        let table = escape::table_name(name, KEY_VALUE_SUFFIX)?;
        Self::attach(host, table).await
    }

    pub(crate) async fn attach(host: &Host, table: String) -> AttrResult<Self> {
        let create = Table::create()
            .table(Alias::new(table.clone()))
            .if_not_exists()
            .col(lookup_column(host.backend(), KvColumn::AttrKey))
            .col(ColumnDef::new(KvColumn::AttrValue).text().not_null())
            .to_owned();
        let index_name = escape::index_name(&table)?;
        let index = Index::create()
            .if_not_exists()
            .name(index_name.clone())
            .table(Alias::new(table.clone()))
            .col(KvColumn::AttrKey)
            .to_owned();
        host.ensure_table(&table, &index_name, create, index).await?;
        Ok(Self {
            host: host.clone(),
            table,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn table_ref(&self) -> Alias {
        Alias::new(self.table.clone())
    }

    async fn update_with<C: ConnectionTrait>(
        &self,
        conn: &C,
        key: &str,
        encoded: &str,
    ) -> AttrResult<u64> {
        let update = Query::update()
            .table(self.table_ref())
            .values([(KvColumn::AttrValue, encoded.to_string().into())])
            .and_where(Expr::col(KvColumn::AttrKey).eq(key))
            .to_owned();
        self.host.exec(conn, &update).await
    }

    pub(crate) async fn insert_with<C: ConnectionTrait>(
        &self,
        conn: &C,
        key: &str,
        encoded: &str,
    ) -> AttrResult<u64> {
        let insert = Query::insert()
            .into_table(self.table_ref())
            .columns([KvColumn::AttrKey, KvColumn::AttrValue])
            .values_panic([key.to_string().into(), encoded.to_string().into()])
            .to_owned();
        self.host.exec(conn, &insert).await
    }

    /// Writes an already encoded value. Returns true if the key existed.
    pub(crate) async fn put_encoded_with<C: ConnectionTrait>(
        &self,
        conn: &C,
        key: &str,
        encoded: &str,
    ) -> AttrResult<bool> {
        match self.update_with(conn, key, encoded).await? {
            0 => {}
            1 => return Ok(true),
            n => {
                log::warn!("attrstore: {n} rows share key {key} in {}", self.table);
                return Err(AttrError::constraint(format!(
                    "{n} rows for key {key} in {}",
                    self.table
                )));
            }
        }
        if self.insert_with(conn, key, encoded).await? != 1 {
            return Err(AttrError::storage(format!(
                "could not update or insert key {key} in {}",
                self.table
            )));
        }
        Ok(false)
    }

    pub async fn set_with<C: ConnectionTrait>(
        &self,
        conn: &C,
        key: &str,
        value: &str,
    ) -> AttrResult<()> {
        self.set_check_with(conn, key, value).await?;
        Ok(())
    }

    /// Like `set_with`, returning whether the key already existed.
    pub async fn set_check_with<C: ConnectionTrait>(
        &self,
        conn: &C,
        key: &str,
        value: &str,
    ) -> AttrResult<bool> {
        let encoded = self.host.encode_value(value)?;
        self.put_encoded_with(conn, key, &encoded).await
    }

    pub async fn set_check(&self, key: &str, value: &str) -> AttrResult<bool> {
        self.set_check_with(self.host.connection(), key, value).await
    }

    pub async fn get_with<C: ConnectionTrait>(&self, conn: &C, key: &str) -> AttrResult<String> {
        let select = Query::select()
            .from(self.table_ref())
            .column(KvColumn::AttrValue)
            .and_where(Expr::col(KvColumn::AttrKey).eq(key))
            .limit(2)
            .to_owned();
        let mut rows = self.host.query_all(conn, &select).await?;
        if rows.len() > 1 {
            log::warn!("attrstore: duplicate rows for key {key} in {}", self.table);
            return Err(AttrError::constraint(format!(
                "more than one row for key {key} in {}",
                self.table
            )));
        }
        let Some(row) = rows.pop() else {
            return Err(AttrError::not_found(key.to_string()));
        };
        let stored = read_string(&row, KvColumn::AttrValue)?;
        self.host.decode_value(stored).inspect_err(|err| {
            log::warn!("attrstore: undecodable value for key {key} in {}: {err}", self.table);
        })
    }

    pub async fn has_with<C: ConnectionTrait>(&self, conn: &C, key: &str) -> AttrResult<bool> {
        let select = Query::select()
            .from(self.table_ref())
            .column(KvColumn::AttrKey)
            .and_where(Expr::col(KvColumn::AttrKey).eq(key))
            .limit(1)
            .to_owned();
        Ok(self.host.query_one(conn, &select).await?.is_some())
    }

    pub async fn del_with<C: ConnectionTrait>(&self, conn: &C, key: &str) -> AttrResult<()> {
        let delete = Query::delete()
            .from_table(self.table_ref())
            .and_where(Expr::col(KvColumn::AttrKey).eq(key))
            .to_owned();
        self.host.exec(conn, &delete).await?;
        Ok(())
    }

    pub async fn all_with<C: ConnectionTrait>(&self, conn: &C) -> AttrResult<Vec<String>> {
        let select = Query::select()
            .from(self.table_ref())
            .column(KvColumn::AttrKey)
            .to_owned();
        let rows = self.host.query_all(conn, &select).await?;
        rows.iter()
            .map(|row| read_string(row, KvColumn::AttrKey))
            .collect()
    }

    /// Every key with its decoded value.
    pub async fn entries_with<C: ConnectionTrait>(
        &self,
        conn: &C,
    ) -> AttrResult<Vec<(String, String)>> {
        let select = Query::select()
            .from(self.table_ref())
            .columns([KvColumn::AttrKey, KvColumn::AttrValue])
            .to_owned();
        let rows = self.host.query_all(conn, &select).await?;
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let key = read_string(&row, KvColumn::AttrKey)?;
            let value = self.host.decode_value(read_string(&row, KvColumn::AttrValue)?)?;
            entries.push((key, value));
        }
        Ok(entries)
    }

    pub async fn entries(&self) -> AttrResult<Vec<(String, String)>> {
        self.entries_with(self.host.connection()).await
    }

    pub async fn count_with<C: ConnectionTrait>(&self, conn: &C) -> AttrResult<u64> {
        let select = Query::select()
            .from(self.table_ref())
            .expr_as(Func::count(Expr::col(KvColumn::AttrKey)), Alias::new(COUNT_ALIAS))
            .to_owned();
        read_count(self.host.query_one(conn, &select).await?)
    }

    pub async fn is_empty(&self) -> AttrResult<bool> {
        Ok(self.count_with(self.host.connection()).await? == 0)
    }

    async fn add_with<C: ConnectionTrait>(
        &self,
        conn: &C,
        key: &str,
        delta: i64,
    ) -> AttrResult<String> {
        let current = match self.get_with(conn, key).await {
            Ok(value) => value.trim().parse::<i64>().unwrap_or(0),
            Err(err) if err.is_not_found() => 0,
            Err(err) => return Err(err),
        };
        let next = current.saturating_add(delta).to_string();
        self.set_with(conn, key, &next).await?;
        Ok(next)
    }

    /// Read-modify-write increment; wrap in a transaction to avoid lost
    /// updates between concurrent callers.
    pub async fn inc_with<C: ConnectionTrait>(&self, conn: &C, key: &str) -> AttrResult<String> {
        self.add_with(conn, key, 1).await
    }

    pub async fn dec_with<C: ConnectionTrait>(&self, conn: &C, key: &str) -> AttrResult<String> {
        self.add_with(conn, key, -1).await
    }

    pub async fn clear_with<C: ConnectionTrait>(&self, conn: &C) -> AttrResult<()> {
        self.host.truncate_tables(conn, &[&self.table]).await
    }

    /// Drops the backing relation.
    pub async fn remove(self) -> AttrResult<()> {
        let tx = self.host.begin().await?;
        self.host.drop_tables(&tx, &[&self.table]).await?;
        self.host.commit(tx).await
    }
}

#[async_trait]
impl KeyValueApi for FlatKeyValue {
    async fn set(&self, key: &str, value: &str) -> AttrResult<()> {
        self.set_with(self.host.connection(), key, value).await
    }

    async fn get(&self, key: &str) -> AttrResult<String> {
        self.get_with(self.host.connection(), key).await
    }

    async fn has(&self, key: &str) -> AttrResult<bool> {
        self.has_with(self.host.connection(), key).await
    }

    async fn del(&self, key: &str) -> AttrResult<()> {
        self.del_with(self.host.connection(), key).await
    }

    async fn all(&self) -> AttrResult<Vec<String>> {
        self.all_with(self.host.connection()).await
    }

    async fn count(&self) -> AttrResult<u64> {
        self.count_with(self.host.connection()).await
    }

    async fn inc(&self, key: &str) -> AttrResult<String> {
        self.inc_with(self.host.connection(), key).await
    }

    async fn dec(&self, key: &str) -> AttrResult<String> {
        self.dec_with(self.host.connection(), key).await
    }

    async fn clear(&self) -> AttrResult<()> {
        self.clear_with(self.host.connection()).await
    }
}
