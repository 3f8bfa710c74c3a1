//! Review flag repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use leafwire_core::{new_v7, Error, Result, ReviewFlag, ReviewFlagRepository, ReviewStatus};

/// PostgreSQL implementation of ReviewFlagRepository.
pub struct PgReviewFlagRepository {
    pool: Pool<Postgres>,
}

impl PgReviewFlagRepository {
    /// Create a new PgReviewFlagRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Convert string from database to ReviewStatus.
    fn str_to_status(s: &str) -> ReviewStatus {
        match s {
            "pending" => ReviewStatus::Pending,
            "approved" => ReviewStatus::Approved,
            "rejected" => ReviewStatus::Rejected,
            "fixed" => ReviewStatus::Fixed,
            _ => ReviewStatus::Pending, // fallback
        }
    }

    fn parse_flag_row(row: sqlx::postgres::PgRow) -> ReviewFlag {
        ReviewFlag {
            id: row.get("id"),
            deal_id: row.get("deal_id"),
            reason: row.get("reason"),
            status: Self::str_to_status(row.get("status")),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl ReviewFlagRepository for PgReviewFlagRepository {
    async fn create(&self, deal_id: Uuid, reason: &str) -> Result<Uuid> {
        let id = new_v7();
        sqlx::query(
            "INSERT INTO review_flags (id, deal_id, reason, status, created_at)
             VALUES ($1, $2, $3, 'pending'::review_status, $4)",
        )
        .bind(id)
        .bind(deal_id)
        .bind(reason)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(id)
    }

    async fn list_pending(&self, limit: i64) -> Result<Vec<ReviewFlag>> {
        let rows = sqlx::query(
            "SELECT id, deal_id, reason, status::text, created_at
             FROM review_flags
             WHERE status = 'pending'::review_status
             ORDER BY created_at DESC
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.into_iter().map(Self::parse_flag_row).collect())
    }
}
