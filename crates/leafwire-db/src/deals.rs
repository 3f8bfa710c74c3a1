//! Deal repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use leafwire_core::{
    defaults, new_v7, Deal, DealCategory, DealRepository, DealWithSource, Error, FeedQuery,
    NewDeal, Result,
};

/// PostgreSQL implementation of DealRepository.
pub struct PgDealRepository {
    pool: Pool<Postgres>,
}

const DEAL_COLUMNS: &str =
    "id, source_id, category::text, title, normalized_title, brand, product_name, \
     price_text, confidence, identity_hash, valid, needs_review, review_reason, created_at";

impl PgDealRepository {
    /// Create a new PgDealRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Convert DealCategory to string for database.
    pub(crate) fn category_to_str(category: DealCategory) -> &'static str {
        match category {
            DealCategory::Flower => "flower",
            DealCategory::Edible => "edible",
            DealCategory::Vape => "vape",
            DealCategory::Concentrate => "concentrate",
            DealCategory::Preroll => "preroll",
            DealCategory::Accessory => "accessory",
            DealCategory::Other => "other",
        }
    }

    /// Convert string from database to DealCategory.
    pub(crate) fn str_to_category(s: &str) -> DealCategory {
        match s {
            "flower" => DealCategory::Flower,
            "edible" => DealCategory::Edible,
            "vape" => DealCategory::Vape,
            "concentrate" => DealCategory::Concentrate,
            "preroll" => DealCategory::Preroll,
            "accessory" => DealCategory::Accessory,
            _ => DealCategory::Other, // fallback
        }
    }

    /// Parse a deal row into a Deal struct.
    fn parse_deal_row(row: &sqlx::postgres::PgRow) -> Deal {
        Deal {
            id: row.get("id"),
            source_id: row.get("source_id"),
            category: Self::str_to_category(row.get("category")),
            title: row.get("title"),
            normalized_title: row.get("normalized_title"),
            brand: row.get("brand"),
            product_name: row.get("product_name"),
            price_text: row.get("price_text"),
            confidence: row.get("confidence"),
            identity_hash: row.get("identity_hash"),
            valid: row.get("valid"),
            needs_review: row.get("needs_review"),
            review_reason: row.get("review_reason"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl DealRepository for PgDealRepository {
    async fn insert(&self, deal: &NewDeal) -> Result<Option<Uuid>> {
        // ON CONFLICT DO NOTHING makes the insert-if-absent atomic: a
        // duplicate admitted concurrently simply yields no row here.
        let id = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO deals
                 (id, source_id, category, title, normalized_title, brand, product_name,
                  price_text, confidence, identity_hash, valid, needs_review, review_reason,
                  created_at)
             VALUES ($1, $2, $3::deal_category, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
             ON CONFLICT (source_id, identity_hash) DO NOTHING
             RETURNING id",
        )
        .bind(new_v7())
        .bind(deal.source_id)
        .bind(Self::category_to_str(deal.category))
        .bind(&deal.title)
        .bind(&deal.normalized_title)
        .bind(&deal.brand)
        .bind(&deal.product_name)
        .bind(&deal.price_text)
        .bind(deal.confidence)
        .bind(&deal.identity_hash)
        .bind(deal.valid)
        .bind(deal.needs_review)
        .bind(&deal.review_reason)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(id)
    }

    async fn exists_exact(&self, source_id: Uuid, identity_hash: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM deals WHERE source_id = $1 AND identity_hash = $2)",
        )
        .bind(source_id)
        .bind(identity_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(exists)
    }

    async fn recent_for_source(
        &self,
        source_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<Deal>> {
        let query = format!(
            "SELECT {} FROM deals
             WHERE source_id = $1 AND created_at >= $2
             ORDER BY created_at DESC",
            DEAL_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(source_id)
            .bind(since)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(rows.iter().map(Self::parse_deal_row).collect())
    }

    async fn feed(&self, query: &FeedQuery) -> Result<Vec<DealWithSource>> {
        let mut conditions = vec![
            "d.valid".to_string(),
            "NOT d.needs_review".to_string(),
            "s.active".to_string(),
            "d.created_at >= $1".to_string(),
        ];
        let mut param_idx = 2;

        if query.category.is_some() {
            conditions.push(format!("d.category = ${}::deal_category", param_idx));
            param_idx += 1;
        }
        if query.brand.is_some() {
            conditions.push(format!("lower(d.brand) = lower(${})", param_idx));
            param_idx += 1;
        }

        let sql = format!(
            "SELECT d.id, d.source_id, d.category::text, d.title, d.normalized_title,
                    d.brand, d.product_name, d.price_text, d.confidence, d.identity_hash,
                    d.valid, d.needs_review, d.review_reason, d.created_at,
                    s.name AS source_name, s.latitude AS source_latitude,
                    s.longitude AS source_longitude
             FROM deals d
             JOIN sources s ON s.id = d.source_id
             WHERE {}
             ORDER BY d.created_at DESC
             LIMIT ${}",
            conditions.join(" AND "),
            param_idx
        );

        let since = query.since.unwrap_or_else(|| {
            Utc::now() - chrono::Duration::days(defaults::FEED_WINDOW_DAYS)
        });
        let limit = query.limit.unwrap_or(defaults::FEED_LIMIT);

        let mut q = sqlx::query(&sql).bind(since);
        if let Some(category) = query.category {
            q = q.bind(Self::category_to_str(category));
        }
        if let Some(brand) = &query.brand {
            q = q.bind(brand);
        }
        q = q.bind(limit);

        let rows = q.fetch_all(&self.pool).await.map_err(Error::Database)?;
        Ok(rows
            .iter()
            .map(|row| DealWithSource {
                deal: Self::parse_deal_row(row),
                source_name: row.get("source_name"),
                source_latitude: row.get("source_latitude"),
                source_longitude: row.get("source_longitude"),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trip() {
        for category in DealCategory::all() {
            let s = PgDealRepository::category_to_str(*category);
            assert_eq!(PgDealRepository::str_to_category(s), *category);
        }
    }

    #[test]
    fn test_str_to_category_unknown_fallback() {
        assert_eq!(PgDealRepository::str_to_category("mystery"), DealCategory::Other);
        assert_eq!(PgDealRepository::str_to_category(""), DealCategory::Other);
    }

    #[test]
    fn test_category_strings_are_unique() {
        let strings: Vec<&str> = DealCategory::all()
            .iter()
            .map(|c| PgDealRepository::category_to_str(*c))
            .collect();
        let mut unique = strings.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(strings.len(), unique.len());
    }
}
