use async_trait::async_trait;
use sea_orm::ConnectionTrait;
use sea_orm::sea_query::{Alias, Expr, ExprTrait, Func, Index, Query, Table};

use crate::Host;
use crate::db::{COUNT_ALIAS, SetColumn, lookup_column, read_count, read_string};
use attrstore_core::{AttrResult, SetApi, escape};

pub(crate) const SET_SUFFIX: &str = "_set";

/// A deduplicated collection of strings backed by one `member` column.
#[derive(Clone)]
pub struct MembershipSet {
    host: Host,
    table: String,
}

impl MembershipSet {
    pub async fn open(host: &Host, name: &str) -> AttrResult<Self> {
        let table = escape::table_name(name, SET_SUFFIX)?;
        Self::attach(host, table).await
    }

    pub(crate) async fn attach(host: &Host, table: String) -> AttrResult<Self> {
        let create = Table::create()
            .table(Alias::new(table.clone()))
            .if_not_exists()
            .col(lookup_column(host.backend(), SetColumn::Member))
            .to_owned();
        let index_name = escape::index_name(&table)?;
        let index = Index::create()
            .if_not_exists()
            .name(index_name.clone())
            .table(Alias::new(table.clone()))
            .col(SetColumn::Member)
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

    /// Adds `value` unless it is already a member.
    pub async fn add_with<C: ConnectionTrait>(&self, conn: &C, value: &str) -> AttrResult<()> {
        if self.has_with(conn, value).await? {
            return Ok(());
        }
        self.add_no_check_with(conn, value).await
    }

    /// Inserts without the membership query. The caller guarantees `value` is
    /// new; otherwise `all` will report it twice.
    pub(crate) async fn add_no_check_with<C: ConnectionTrait>(
        &self,
        conn: &C,
        value: &str,
    ) -> AttrResult<()> {
        let insert = Query::insert()
            .into_table(self.table_ref())
            .columns([SetColumn::Member])
            .values_panic([value.to_string().into()])
            .to_owned();
        self.host.exec(conn, &insert).await?;
        Ok(())
    }

    pub async fn has_with<C: ConnectionTrait>(&self, conn: &C, value: &str) -> AttrResult<bool> {
        let select = Query::select()
            .from(self.table_ref())
            .column(SetColumn::Member)
            .and_where(Expr::col(SetColumn::Member).eq(value))
            .limit(1)
            .to_owned();
        Ok(self.host.query_one(conn, &select).await?.is_some())
    }

    pub async fn all_with<C: ConnectionTrait>(&self, conn: &C) -> AttrResult<Vec<String>> {
        let select = Query::select()
            .from(self.table_ref())
            .column(SetColumn::Member)
            .to_owned();
        let rows = self.host.query_all(conn, &select).await?;
        rows.iter()
            .map(|row| read_string(row, SetColumn::Member))
            .collect()
    }

    pub async fn del_with<C: ConnectionTrait>(&self, conn: &C, value: &str) -> AttrResult<()> {
        let delete = Query::delete()
            .from_table(self.table_ref())
            .and_where(Expr::col(SetColumn::Member).eq(value))
            .to_owned();
        self.host.exec(conn, &delete).await?;
        Ok(())
    }

    pub async fn count_with<C: ConnectionTrait>(&self, conn: &C) -> AttrResult<u64> {
        let select = Query::select()
            .from(self.table_ref())
            .expr_as(
                Func::count(Expr::col(SetColumn::Member)),
                Alias::new(COUNT_ALIAS),
            )
            .to_owned();
        read_count(self.host.query_one(conn, &select).await?)
    }

    pub async fn clear_with<C: ConnectionTrait>(&self, conn: &C) -> AttrResult<()> {
        self.host.truncate_tables(conn, &[&self.table]).await
    }

    pub async fn remove(self) -> AttrResult<()> {
        let tx = self.host.begin().await?;
        self.host.drop_tables(&tx, &[&self.table]).await?;
        self.host.commit(tx).await
    }
}

#[async_trait]
impl SetApi for MembershipSet {
    async fn add(&self, value: &str) -> AttrResult<()> {
        self.add_with(self.host.connection(), value).await
    }

    async fn has(&self, value: &str) -> AttrResult<bool> {
        self.has_with(self.host.connection(), value).await
    }

    async fn all(&self) -> AttrResult<Vec<String>> {
        self.all_with(self.host.connection()).await
    }

    async fn del(&self, value: &str) -> AttrResult<()> {
        self.del_with(self.host.connection(), value).await
    }

    async fn count(&self) -> AttrResult<u64> {
        self.count_with(self.host.connection()).await
    }

    async fn clear(&self) -> AttrResult<()> {
        self.clear_with(self.host.connection()).await
    }
}
