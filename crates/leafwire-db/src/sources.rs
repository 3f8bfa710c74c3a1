//! Upstream source repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use leafwire_core::{
    defaults, new_v7, DiscoveredSource, Error, Result, SourceRepository, UpstreamSource,
};

/// PostgreSQL implementation of SourceRepository.
pub struct PgSourceRepository {
    pool: Pool<Postgres>,
}

const SOURCE_COLUMNS: &str =
    "id, place_id, name, address, latitude, longitude, phone, website, menu_url, \
     reliability, active, created_at, last_checked_at";

impl PgSourceRepository {
    /// Create a new PgSourceRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Parse a source row into an UpstreamSource struct.
    fn parse_source_row(row: sqlx::postgres::PgRow) -> UpstreamSource {
        UpstreamSource {
            id: row.get("id"),
            place_id: row.get("place_id"),
            name: row.get("name"),
            address: row.get("address"),
            latitude: row.get("latitude"),
            longitude: row.get("longitude"),
            phone: row.get("phone"),
            website: row.get("website"),
            menu_url: row.get("menu_url"),
            reliability: row.get("reliability"),
            active: row.get("active"),
            created_at: row.get("created_at"),
            last_checked_at: row.get("last_checked_at"),
        }
    }

    /// A discovered website that points straight at a known menu platform
    /// doubles as the extraction target.
    fn menu_url_from_website(website: Option<&str>) -> Option<String> {
        website
            .filter(|w| {
                UpstreamSource::KNOWN_MENU_HOSTS
                    .iter()
                    .any(|h| w.contains(h))
            })
            .map(String::from)
    }
}

#[async_trait]
impl SourceRepository for PgSourceRepository {
    async fn upsert_discovered(&self, discovered: &DiscoveredSource) -> Result<Uuid> {
        // Match on the stable external id first, then on name. Sequential
        // per zone (the scheduler never processes the same source from two
        // tasks in one run), so this does not need to be a single statement.
        if let Some(place_id) = &discovered.place_id {
            let updated = sqlx::query_scalar::<_, Uuid>(
                "UPDATE sources
                 SET latitude = $2, longitude = $3, address = $4, phone = $5, website = $6
                 WHERE place_id = $1
                 RETURNING id",
            )
            .bind(place_id)
            .bind(discovered.latitude)
            .bind(discovered.longitude)
            .bind(&discovered.address)
            .bind(&discovered.phone)
            .bind(&discovered.website)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

            if let Some(id) = updated {
                return Ok(id);
            }
        }

        let updated = sqlx::query_scalar::<_, Uuid>(
            "UPDATE sources
             SET place_id = COALESCE(place_id, $2), latitude = $3, longitude = $4,
                 address = $5, phone = $6, website = $7
             WHERE lower(name) = lower($1)
             RETURNING id",
        )
        .bind(&discovered.name)
        .bind(&discovered.place_id)
        .bind(discovered.latitude)
        .bind(discovered.longitude)
        .bind(&discovered.address)
        .bind(&discovered.phone)
        .bind(&discovered.website)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        if let Some(id) = updated {
            return Ok(id);
        }

        let id = new_v7();
        let menu_url = Self::menu_url_from_website(discovered.website.as_deref());
        sqlx::query(
            "INSERT INTO sources
                 (id, place_id, name, address, latitude, longitude, phone, website,
                  menu_url, reliability, active, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, TRUE, $11)",
        )
        .bind(id)
        .bind(&discovered.place_id)
        .bind(&discovered.name)
        .bind(&discovered.address)
        .bind(discovered.latitude)
        .bind(discovered.longitude)
        .bind(&discovered.phone)
        .bind(&discovered.website)
        .bind(menu_url)
        .bind(defaults::RELIABILITY_INITIAL)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(id)
    }

    async fn link_zone(&self, source_id: Uuid, zone_id: Uuid) -> Result<()> {
        sqlx::query(
            "INSERT INTO zone_sources (zone_id, source_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(zone_id)
        .bind(source_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn adjust_reliability(&self, source_id: Uuid, delta: f64, floor: f64) -> Result<f64> {
        // Clamp and deactivate in one statement; the read-modify-write is
        // safe because no two concurrent dispatch tasks target the same
        // source within one run.
        let row = sqlx::query(
            "UPDATE sources
             SET reliability = LEAST(1.0, GREATEST(0.0, reliability + $2)),
                 active = active AND (reliability + $2 >= $3),
                 last_checked_at = $4
             WHERE id = $1
             RETURNING reliability, active",
        )
        .bind(source_id)
        .bind(delta)
        .bind(floor)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or(Error::SourceNotFound(source_id))?;

        let reliability: f64 = row.get("reliability");
        let active: bool = row.get("active");
        if !active {
            tracing::warn!(
                source_id = %source_id,
                reliability,
                "Source deactivated below reliability floor"
            );
        }
        Ok(reliability)
    }

    async fn set_menu_url(&self, source_id: Uuid, menu_url: &str) -> Result<()> {
        sqlx::query("UPDATE sources SET menu_url = $2 WHERE id = $1")
            .bind(source_id)
            .bind(menu_url)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<UpstreamSource>> {
        let query = format!("SELECT {} FROM sources WHERE active ORDER BY name", SOURCE_COLUMNS);
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(rows.into_iter().map(Self::parse_source_row).collect())
    }

    async fn list_for_subscribed_zones(&self) -> Result<Vec<UpstreamSource>> {
        let rows = sqlx::query(
            "SELECT DISTINCT ON (s.id)
                    s.id, s.place_id, s.name, s.address, s.latitude, s.longitude,
                    s.phone, s.website, s.menu_url, s.reliability, s.active,
                    s.created_at, s.last_checked_at
             FROM sources s
             JOIN zone_sources zs ON zs.source_id = s.id
             JOIN zones z ON z.id = zs.zone_id
             JOIN subscribers sub ON sub.postal_code = z.postal_code
             WHERE s.active AND sub.active AND z.status = 'active'::zone_status",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.into_iter().map(Self::parse_source_row).collect())
    }

    async fn get(&self, source_id: Uuid) -> Result<UpstreamSource> {
        let query = format!("SELECT {} FROM sources WHERE id = $1", SOURCE_COLUMNS);
        let row = sqlx::query(&query)
            .bind(source_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.map(Self::parse_source_row)
            .ok_or(Error::SourceNotFound(source_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_url_from_website_known_platform() {
        let url = PgSourceRepository::menu_url_from_website(Some(
            "https://dutchie.com/dispensary/green-relief",
        ));
        assert!(url.is_some());
    }

    #[test]
    fn test_menu_url_from_website_plain_site() {
        let url =
            PgSourceRepository::menu_url_from_website(Some("https://greenrelief.example.com"));
        assert!(url.is_none());
        assert!(PgSourceRepository::menu_url_from_website(None).is_none());
    }
}
