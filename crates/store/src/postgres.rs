use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::record::ensure_record;
use crate::{Record, Result, Session, Store, StoreError};

/// Name of the primary key constraint on the `records` table.
const RECORDS_PKEY: &str = "records_pkey";

/// PostgreSQL-backed record store.
///
/// Every table of the domain maps onto rows of a single `records` table keyed
/// by `(table_name, key)` with the record body stored as JSONB.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to the database at `url`.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPool::connect(url).await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn Session>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresSession { tx: Some(tx) }))
    }
}

/// A session wrapping one PostgreSQL transaction.
///
/// Dropping the session drops the transaction, which rolls it back.
pub struct PostgresSession {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PostgresSession {
    fn tx(&mut self) -> Result<&mut Transaction<'static, Postgres>> {
        self.tx.as_mut().ok_or(StoreError::SessionClosed)
    }
}

#[async_trait]
impl Session for PostgresSession {
    async fn get(&mut self, table: &str, key: &str) -> Result<Option<Record>> {
        let tx = self.tx()?;
        let body: Option<Value> =
            sqlx::query_scalar("SELECT body FROM records WHERE table_name = $1 AND key = $2")
                .bind(table)
                .bind(key)
                .fetch_optional(&mut **tx)
                .await?;
        Ok(body)
    }

    async fn find_by(
        &mut self,
        table: &str,
        field: &str,
        value: &Value,
    ) -> Result<Option<(String, Record)>> {
        let tx = self.tx()?;
        let row = sqlx::query(
            r#"
            SELECT key, body
            FROM records
            WHERE table_name = $1 AND body -> $2 = $3
            ORDER BY key ASC
            LIMIT 1
            "#,
        )
        .bind(table)
        .bind(field)
        .bind(value)
        .fetch_optional(&mut **tx)
        .await?;

        match row {
            Some(row) => Ok(Some((row.try_get("key")?, row.try_get("body")?))),
            None => Ok(None),
        }
    }

    async fn insert(&mut self, table: &str, key: &str, record: Record) -> Result<()> {
        ensure_record(table, key, &record)?;
        let tx = self.tx()?;

        sqlx::query("INSERT INTO records (table_name, key, body) VALUES ($1, $2, $3)")
            .bind(table)
            .bind(key)
            .bind(&record)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some(RECORDS_PKEY)
                {
                    return StoreError::DuplicateKey {
                        table: table.to_string(),
                        key: key.to_string(),
                    };
                }
                StoreError::Database(e)
            })?;

        Ok(())
    }

    async fn put(&mut self, table: &str, key: &str, record: Record) -> Result<()> {
        ensure_record(table, key, &record)?;
        let tx = self.tx()?;

        sqlx::query(
            r#"
            INSERT INTO records (table_name, key, body)
            VALUES ($1, $2, $3)
            ON CONFLICT (table_name, key)
            DO UPDATE SET body = EXCLUDED.body, updated_at = now()
            "#,
        )
        .bind(table)
        .bind(key)
        .bind(&record)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    async fn merge(&mut self, table: &str, key: &str, patch: Record) -> Result<Record> {
        ensure_record(table, key, &patch)?;
        let tx = self.tx()?;

        // `||` on two JSONB objects is a shallow merge with the right side winning.
        let merged: Value = sqlx::query_scalar(
            r#"
            INSERT INTO records (table_name, key, body)
            VALUES ($1, $2, $3)
            ON CONFLICT (table_name, key)
            DO UPDATE SET body = records.body || EXCLUDED.body, updated_at = now()
            RETURNING body
            "#,
        )
        .bind(table)
        .bind(key)
        .bind(&patch)
        .fetch_one(&mut **tx)
        .await?;

        Ok(merged)
    }

    async fn delete(&mut self, table: &str, key: &str) -> Result<bool> {
        let tx = self.tx()?;
        let result = sqlx::query("DELETE FROM records WHERE table_name = $1 AND key = $2")
            .bind(table)
            .bind(key)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn commit(&mut self) -> Result<()> {
        let tx = self.tx.take().ok_or(StoreError::SessionClosed)?;
        tx.commit().await?;
        metrics::counter!("store_commits_total", "backend" => "postgres").increment(1);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        let tx = self.tx.take().ok_or(StoreError::SessionClosed)?;
        tx.rollback().await?;
        metrics::counter!("store_rollbacks_total", "backend" => "postgres").increment(1);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.tx.is_some() {
            self.rollback().await?;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.tx.is_some()
    }
}
