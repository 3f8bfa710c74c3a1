//! Zone repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use leafwire_core::{
    defaults, new_v7, Error, GeocodedLocation, Result, Zone, ZoneRepository, ZoneStatus,
};

/// PostgreSQL implementation of ZoneRepository.
pub struct PgZoneRepository {
    pool: Pool<Postgres>,
}

impl PgZoneRepository {
    /// Create a new PgZoneRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Convert ZoneStatus to string for database.
    #[allow(dead_code)]
    fn status_to_str(status: ZoneStatus) -> &'static str {
        match status {
            ZoneStatus::Active => "active",
            ZoneStatus::Paused => "paused",
        }
    }

    /// Convert string from database to ZoneStatus.
    fn str_to_status(s: &str) -> ZoneStatus {
        match s {
            "active" => ZoneStatus::Active,
            "paused" => ZoneStatus::Paused,
            _ => ZoneStatus::Paused, // fallback
        }
    }

    /// Parse a zone row into a Zone struct.
    fn parse_zone_row(row: sqlx::postgres::PgRow) -> Zone {
        Zone {
            id: row.get("id"),
            postal_code: row.get("postal_code"),
            status: Self::str_to_status(row.get("status")),
            latitude: row.get("latitude"),
            longitude: row.get("longitude"),
            city: row.get("city"),
            region: row.get("region"),
            next_due: row.get("next_due"),
            lease_token: row.get("lease_token"),
            lease_expires_at: row.get("lease_expires_at"),
            last_processed_at: row.get("last_processed_at"),
            refresh_interval_secs: row.get("refresh_interval_secs"),
            created_at: row.get("created_at"),
        }
    }

    const ZONE_COLUMNS: &'static str =
        "id, postal_code, status::text, latitude, longitude, city, region, next_due, \
         lease_token, lease_expires_at, last_processed_at, refresh_interval_secs, created_at";
}

#[async_trait]
impl ZoneRepository for PgZoneRepository {
    async fn claim_due(&self, batch_size: i64, lease_secs: i64) -> Result<Vec<Zone>> {
        let now = Utc::now();
        let lease_expiry = now + Duration::seconds(lease_secs);
        let batch = batch_size.clamp(1, defaults::ZONE_CLAIM_BATCH_MAX);

        // Claim and stamp in a single conditional update so two concurrent
        // triggers can never claim the same zone. FOR UPDATE SKIP LOCKED
        // keeps concurrent claimers from serializing on each other's rows.
        let query = format!(
            "UPDATE zones
             SET lease_token = gen_random_uuid(), lease_expires_at = $1
             WHERE id IN (
                 SELECT id FROM zones
                 WHERE status = 'active'::zone_status
                   AND next_due <= $2
                   AND (lease_token IS NULL OR lease_expires_at < $2)
                 ORDER BY next_due ASC
                 LIMIT $3
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING {}",
            Self::ZONE_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(lease_expiry)
            .bind(now)
            .bind(batch)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        // RETURNING gives no ordering guarantee; restore next_due ascending.
        let mut zones: Vec<Zone> = rows.into_iter().map(Self::parse_zone_row).collect();
        zones.sort_by_key(|z| z.next_due);
        Ok(zones)
    }

    async fn complete(
        &self,
        zone_id: Uuid,
        lease_token: Uuid,
        next_due: DateTime<Utc>,
    ) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE zones
             SET lease_token = NULL, lease_expires_at = NULL,
                 last_processed_at = $1, next_due = $2
             WHERE id = $3 AND lease_token = $4",
        )
        .bind(now)
        .bind(next_due)
        .bind(zone_id)
        .bind(lease_token)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn reschedule(
        &self,
        zone_id: Uuid,
        lease_token: Uuid,
        next_due: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE zones
             SET lease_token = NULL, lease_expires_at = NULL, next_due = $1
             WHERE id = $2 AND lease_token = $3",
        )
        .bind(next_due)
        .bind(zone_id)
        .bind(lease_token)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn set_location(&self, zone_id: Uuid, location: &GeocodedLocation) -> Result<()> {
        sqlx::query(
            "UPDATE zones SET latitude = $1, longitude = $2, city = $3, region = $4
             WHERE id = $5",
        )
        .bind(location.latitude)
        .bind(location.longitude)
        .bind(&location.city)
        .bind(&location.region)
        .bind(zone_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn create_for_postal(&self, postal_code: &str) -> Result<Zone> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO zones (id, postal_code, status, next_due, refresh_interval_secs, created_at)
             VALUES ($1, $2, 'active'::zone_status, $3, $4, $3)
             ON CONFLICT (postal_code) DO NOTHING",
        )
        .bind(new_v7())
        .bind(postal_code)
        .bind(now)
        .bind(defaults::ZONE_REFRESH_INTERVAL_SECS)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        self.get_by_postal(postal_code)
            .await?
            .ok_or_else(|| Error::ZoneNotFound(postal_code.to_string()))
    }

    async fn get_by_postal(&self, postal_code: &str) -> Result<Option<Zone>> {
        let query = format!(
            "SELECT {} FROM zones WHERE postal_code = $1",
            Self::ZONE_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(postal_code)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.map(Self::parse_zone_row))
    }

    async fn list_with_subscribers(&self) -> Result<Vec<Zone>> {
        let rows = sqlx::query(
            "SELECT DISTINCT ON (z.id)
                    z.id, z.postal_code, z.status::text, z.latitude, z.longitude,
                    z.city, z.region, z.next_due, z.lease_token, z.lease_expires_at,
                    z.last_processed_at, z.refresh_interval_secs, z.created_at
             FROM zones z
             JOIN subscribers s ON s.postal_code = z.postal_code
             WHERE s.active AND z.status = 'active'::zone_status",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.into_iter().map(Self::parse_zone_row).collect())
    }

    async fn pause(&self, zone_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE zones SET status = 'paused'::zone_status WHERE id = $1")
            .bind(zone_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [ZoneStatus::Active, ZoneStatus::Paused] {
            let s = PgZoneRepository::status_to_str(status);
            assert_eq!(PgZoneRepository::str_to_status(s), status);
        }
    }

    #[test]
    fn test_str_to_status_unknown_fallback() {
        // Unknown strings fall back to Paused so a corrupt row can never
        // re-enter the claim set.
        assert_eq!(PgZoneRepository::str_to_status("bogus"), ZoneStatus::Paused);
    }
}
