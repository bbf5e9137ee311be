//! PostgreSQL table store: DDL through the migration module, rows through the SQL builder.

use crate::migration::{change_sql, create_table_sql, drop_table_sql, plan_reconcile, quote};
use crate::schema::{ColumnType, TableBinding};
use crate::sql::{self, PgBindValue, QueryBuf};
use crate::storage::{ExistingColumn, Record, StorageError, TableStore};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{ConnectOptions, PgPool};
use std::str::FromStr;

#[derive(Clone)]
pub struct PgTableStore {
    pool: PgPool,
}

impl PgTableStore {
    pub fn new(pool: PgPool) -> Self {
        PgTableStore { pool }
    }

    async fn fetch_many(&self, q: &QueryBuf) -> Result<Vec<Record>, StorageError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn fetch_optional(&self, q: &QueryBuf) -> Result<Option<Record>, StorageError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let row = query.fetch_optional(&self.pool).await?;
        Ok(row.map(|r| row_to_record(&r)))
    }
}

#[async_trait]
impl TableStore for PgTableStore {
    async fn table_exists(&self, table: &str) -> Result<bool, StorageError> {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM information_schema.tables WHERE table_schema = current_schema() AND table_name = $1)",
        )
        .bind(table)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists.0)
    }

    async fn describe_table(&self, table: &str) -> Result<Option<Vec<ExistingColumn>>, StorageError> {
        if !self.table_exists(table).await? {
            return Ok(None);
        }
        let rows: Vec<(String, String, String, Option<String>)> = sqlx::query_as(
            "SELECT column_name::text, data_type::text, is_nullable::text, column_default::text \
             FROM information_schema.columns \
             WHERE table_schema = current_schema() AND table_name = $1 \
             ORDER BY ordinal_position",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;
        Ok(Some(
            rows.into_iter()
                .map(|(name, data_type, is_nullable, default)| ExistingColumn {
                    name,
                    column_type: ColumnType::from_catalog_name(&data_type),
                    nullable: is_nullable == "YES",
                    default,
                })
                .collect(),
        ))
    }

    async fn sync_table(&self, binding: &TableBinding) -> Result<(), StorageError> {
        let Some(existing) = self.describe_table(&binding.table_name).await? else {
            let ddl = create_table_sql(binding);
            tracing::debug!(sql = %ddl, "create table");
            sqlx::query(&ddl).execute(&self.pool).await?;
            tracing::info!(table = %binding.table_name, "table created");
            return Ok(());
        };
        let plan = plan_reconcile(binding, &existing);
        if plan.is_empty() {
            return Ok(());
        }
        // PostgreSQL DDL is transactional: any failing step rolls the whole plan back.
        let mut tx = self.pool.begin().await?;
        for change in &plan {
            let ddl = change_sql(&binding.table_name, change);
            tracing::debug!(sql = %ddl, "reconcile");
            sqlx::query(&ddl).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        tracing::info!(table = %binding.table_name, changes = plan.len(), "table reconciled");
        Ok(())
    }

    async fn drop_table(&self, table: &str) -> Result<(), StorageError> {
        let ddl = drop_table_sql(table);
        tracing::debug!(sql = %ddl, "drop table");
        sqlx::query(&ddl).execute(&self.pool).await?;
        Ok(())
    }

    async fn insert(&self, binding: &TableBinding, record: &Record) -> Result<Record, StorageError> {
        let q = sql::insert(binding, record);
        self.fetch_optional(&q)
            .await?
            .ok_or_else(|| StorageError::Other("insert returned no row".into()))
    }

    async fn select_all(&self, binding: &TableBinding) -> Result<Vec<Record>, StorageError> {
        self.fetch_many(&sql::select_all(binding)).await
    }

    async fn select_sample(&self, binding: &TableBinding, limit: u32) -> Result<Vec<Record>, StorageError> {
        self.fetch_many(&sql::select_sample(binding, limit)).await
    }

    async fn select_by_id(&self, binding: &TableBinding, id: i64) -> Result<Option<Record>, StorageError> {
        self.fetch_optional(&sql::select_by_id(binding, id)).await
    }

    async fn update_by_id(
        &self,
        binding: &TableBinding,
        id: i64,
        patch: &Record,
    ) -> Result<Option<Record>, StorageError> {
        self.fetch_optional(&sql::update(binding, id, patch)).await
    }

    async fn delete_by_id(&self, binding: &TableBinding, id: i64) -> Result<Option<Record>, StorageError> {
        self.fetch_optional(&sql::delete(binding, id)).await
    }

    async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }
}

fn row_to_record(row: &sqlx::postgres::PgRow) -> Record {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = Record::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    map
}

fn cell_to_value(row: &sqlx::postgres::PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    Value::Null
}

/// Create the database named in `database_url` if it does not exist, connecting through the
/// `postgres` maintenance database.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), StorageError> {
    let (admin_url, db_name) = split_database_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| StorageError::Other(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        sqlx::query(&format!("CREATE DATABASE {}", quote(&db_name)))
            .execute(&mut conn)
            .await?;
        tracing::info!(database = %db_name, "database created");
    }
    Ok(())
}

/// (maintenance database URL, database name)
fn split_database_url(url: &str) -> Result<(String, String), StorageError> {
    let path_start = url
        .rfind('/')
        .ok_or_else(|| StorageError::Other("DATABASE_URL has no database path".into()))?
        + 1;
    let db_name = url[path_start..].split('?').next().unwrap_or("").trim();
    Ok((format!("{}postgres", &url[..path_start]), db_name.to_string()))
}
