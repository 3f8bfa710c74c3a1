//! Notification record repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use leafwire_core::{new_v7, Error, NotificationRepository, Result};

/// Kind string for zone-refresh notifications.
const KIND_ZONE_REFRESHED: &str = "zone_refreshed";

/// PostgreSQL implementation of NotificationRepository.
pub struct PgNotificationRepository {
    pool: Pool<Postgres>,
}

impl PgNotificationRepository {
    /// Create a new PgNotificationRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn notify_zone_refreshed(&self, zone_id: Uuid, subscriber_ids: &[Uuid]) -> Result<i64> {
        let now = Utc::now();
        let mut inserted = 0i64;
        for subscriber_id in subscriber_ids {
            // Idempotent per (subscriber, zone, day): a retried trigger
            // never produces a second notification.
            let result = sqlx::query(
                "INSERT INTO notifications (id, subscriber_id, zone_id, kind, notify_date, created_at)
                 VALUES ($1, $2, $3, $4, CURRENT_DATE, $5)
                 ON CONFLICT (subscriber_id, zone_id, kind, notify_date) DO NOTHING",
            )
            .bind(new_v7())
            .bind(subscriber_id)
            .bind(zone_id)
            .bind(KIND_ZONE_REFRESHED)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
            inserted += result.rows_affected() as i64;
        }
        Ok(inserted)
    }
}
