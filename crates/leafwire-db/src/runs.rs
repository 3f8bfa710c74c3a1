//! Ingest run history repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use leafwire_core::{new_v7, Error, IngestRun, IngestRunRepository, Result};

/// PostgreSQL implementation of IngestRunRepository.
pub struct PgIngestRunRepository {
    pool: Pool<Postgres>,
}

impl PgIngestRunRepository {
    /// Create a new PgIngestRunRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_run_row(row: sqlx::postgres::PgRow) -> IngestRun {
        IngestRun {
            id: row.get("id"),
            kind: row.get("kind"),
            processed: row.get("processed"),
            failed: row.get("failed"),
            skipped: row.get("skipped"),
            deals_inserted: row.get("deals_inserted"),
            duration_ms: row.get("duration_ms"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl IngestRunRepository for PgIngestRunRepository {
    async fn record(
        &self,
        kind: &str,
        processed: i64,
        failed: i64,
        skipped: i64,
        deals_inserted: i64,
        duration_ms: i64,
    ) -> Result<Uuid> {
        let id = new_v7();
        sqlx::query(
            "INSERT INTO ingest_runs
                 (id, kind, processed, failed, skipped, deals_inserted, duration_ms, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(id)
        .bind(kind)
        .bind(processed)
        .bind(failed)
        .bind(skipped)
        .bind(deals_inserted)
        .bind(duration_ms)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(id)
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<IngestRun>> {
        let rows = sqlx::query(
            "SELECT id, kind, processed, failed, skipped, deals_inserted, duration_ms, created_at
             FROM ingest_runs
             ORDER BY created_at DESC
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.into_iter().map(Self::parse_run_row).collect())
    }
}
