//! Transaction-scoped shadow execution.
//!
//! [`PgShadowDatabase::acquire`] opens a transaction that serves as one
//! request's isolation scope. Every statement -- timed runs, result
//! capture, explain, candidate index DDL -- executes inside it, and
//! [`release`](sqlshadow_core::collaborators::ShadowExecutor::release)
//! rolls it back. sqlx's transaction drop guard also rolls back if the
//! executor is dropped without an explicit release, so the scope cannot
//! leak on panic or cancellation paths.

use std::time::Instant;

use async_trait::async_trait;
use sqlx::{Postgres, Transaction};

use sqlshadow_core::collaborators::{ShadowDatabase, ShadowExecutor};
use sqlshadow_core::diagnosis::TableStats;
use sqlshadow_core::error::ShadowError;

use crate::DbPool;

/// Shadow database handle; cheap to clone into request handlers.
#[derive(Clone)]
pub struct PgShadowDatabase {
    pool: DbPool,
}

impl PgShadowDatabase {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ShadowDatabase for PgShadowDatabase {
    async fn acquire(&self) -> Result<Box<dyn ShadowExecutor>, ShadowError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ShadowError::Unavailable(e.to_string()))?;
        Ok(Box::new(PgShadowExecutor { tx: Some(tx) }))
    }

    async fn ping(&self) -> Result<(), ShadowError> {
        crate::health_check(&self.pool)
            .await
            .map_err(|e| ShadowError::Unavailable(e.to_string()))
    }
}

/// One request's isolation scope: a live transaction.
pub struct PgShadowExecutor {
    /// `None` after release.
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgShadowExecutor {
    fn tx(&mut self) -> Result<&mut Transaction<'static, Postgres>, ShadowError> {
        self.tx
            .as_mut()
            .ok_or_else(|| ShadowError::Unavailable("isolation scope already released".into()))
    }
}

#[async_trait]
impl ShadowExecutor for PgShadowExecutor {
    async fn execute(&mut self, sql: &str) -> Result<(), ShadowError> {
        let tx = self.tx()?;
        sqlx::query(sql)
            .execute(&mut **tx)
            .await
            .map_err(statement_error)?;
        Ok(())
    }

    async fn run_timed(&mut self, sql: &str) -> Result<f64, ShadowError> {
        let tx = self.tx()?;
        let start = Instant::now();
        // Rows are fetched but never decoded; the timing covers execution
        // and transfer, identically for both variants.
        sqlx::query(sql)
            .fetch_all(&mut **tx)
            .await
            .map_err(statement_error)?;
        Ok(start.elapsed().as_secs_f64() * 1000.0)
    }

    async fn fetch_rows(&mut self, sql: &str) -> Result<Vec<serde_json::Value>, ShadowError> {
        let tx = self.tx()?;
        let wrapped = wrap_for_capture(sql);
        let value: serde_json::Value = sqlx::query_scalar(&wrapped)
            .fetch_one(&mut **tx)
            .await
            .map_err(statement_error)?;
        match value {
            serde_json::Value::Array(rows) => Ok(rows),
            other => Ok(vec![other]),
        }
    }

    async fn explain(&mut self, sql: &str) -> Result<serde_json::Value, ShadowError> {
        let tx = self.tx()?;
        let statement = format!("EXPLAIN (FORMAT JSON) {}", strip_terminator(sql));
        sqlx::query_scalar(&statement)
            .fetch_one(&mut **tx)
            .await
            .map_err(statement_error)
    }

    async fn table_statistics(&mut self, table: &str) -> Result<Option<TableStats>, ShadowError> {
        let tx = self.tx()?;
        let row: Option<(i64, i64)> = sqlx::query_as(
            "SELECT c.reltuples::bigint, \
                    pg_total_relation_size(c.oid) \
             FROM pg_class c \
             JOIN pg_namespace n ON n.oid = c.relnamespace \
             WHERE c.relname = $1 AND n.nspname = current_schema()",
        )
        .bind(table)
        .fetch_optional(&mut **tx)
        .await
        .map_err(statement_error)?;
        let Some((row_count, total_bytes)) = row else {
            return Ok(None);
        };

        let index_definitions: Vec<String> = sqlx::query_scalar(
            "SELECT indexdef FROM pg_indexes \
             WHERE tablename = $1 AND schemaname = current_schema() \
             ORDER BY indexname",
        )
        .bind(table)
        .fetch_all(&mut **tx)
        .await
        .map_err(statement_error)?;

        Ok(Some(TableStats {
            table: table.to_string(),
            // reltuples is -1 for never-analyzed tables.
            row_count: (row_count >= 0).then_some(row_count),
            total_bytes: Some(total_bytes),
            index_count: Some(index_definitions.len() as i64),
            index_definitions,
        }))
    }

    async fn release(mut self: Box<Self>) -> Result<(), ShadowError> {
        match self.tx.take() {
            Some(tx) => {
                tx.rollback()
                    .await
                    .map_err(|e| ShadowError::Unavailable(e.to_string()))?;
                tracing::debug!("Isolation scope rolled back");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// Wrap a statement so its rows come back as one JSON array.
///
/// `jsonb_agg` preserves the subquery's row order, so ordered captures stay
/// faithful. Both variants of a comparison go through the same wrapping,
/// which keeps the capture path fair.
fn wrap_for_capture(sql: &str) -> String {
    format!(
        "SELECT COALESCE(jsonb_agg(to_jsonb(t)), '[]'::jsonb) FROM ({}) AS t",
        strip_terminator(sql)
    )
}

fn strip_terminator(sql: &str) -> &str {
    sql.trim().trim_end_matches(';').trim_end()
}

fn statement_error(err: sqlx::Error) -> ShadowError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            ShadowError::Unavailable(err.to_string())
        }
        other => ShadowError::Statement(other.to_string()),
    }
}
