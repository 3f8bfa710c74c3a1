//! Subscriber repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use leafwire_core::{new_v7, Error, Result, Subscriber, SubscriberRepository};

/// PostgreSQL implementation of SubscriberRepository.
pub struct PgSubscriberRepository {
    pool: Pool<Postgres>,
}

impl PgSubscriberRepository {
    /// Create a new PgSubscriberRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_subscriber_row(row: sqlx::postgres::PgRow) -> Subscriber {
        Subscriber {
            id: row.get("id"),
            email: row.get("email"),
            postal_code: row.get("postal_code"),
            active: row.get("active"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl SubscriberRepository for PgSubscriberRepository {
    async fn create(&self, email: &str, postal_code: &str) -> Result<Uuid> {
        let id = new_v7();
        let now = Utc::now();

        // Zone first: a subscriber's postal code always has a zone, created
        // active and immediately due so discovery runs on the next trigger.
        sqlx::query(
            "INSERT INTO zones (id, postal_code, status, next_due, created_at)
             VALUES ($1, $2, 'active'::zone_status, $3, $3)
             ON CONFLICT (postal_code) DO NOTHING",
        )
        .bind(new_v7())
        .bind(postal_code)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        sqlx::query(
            "INSERT INTO subscribers (id, email, postal_code, active, created_at)
             VALUES ($1, $2, $3, TRUE, $4)
             ON CONFLICT (email) DO UPDATE SET postal_code = EXCLUDED.postal_code, active = TRUE",
        )
        .bind(id)
        .bind(email)
        .bind(postal_code)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        let actual: Uuid = sqlx::query_scalar("SELECT id FROM subscribers WHERE email = $1")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(actual)
    }

    async fn for_zone(&self, zone_id: Uuid) -> Result<Vec<Subscriber>> {
        let rows = sqlx::query(
            "SELECT s.id, s.email, s.postal_code, s.active, s.created_at
             FROM subscribers s
             JOIN zones z ON z.postal_code = s.postal_code
             WHERE z.id = $1 AND s.active",
        )
        .bind(zone_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.into_iter().map(Self::parse_subscriber_row).collect())
    }
}
