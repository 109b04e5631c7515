//! Read-side queries backing the facade's search/stats/crosswalk
//! operations. Kept separate from [`crate::repository`] because these
//! are plain reads with no upsert/merge policy to reason about.

use biblio_common::{EnrichmentError, EntityType};
use sqlx::{PgPool, Row};

#[derive(Debug, Clone)]
pub struct WorkSearchRow {
    pub work_key: uuid::Uuid,
    pub title: String,
    pub subtitle: Option<String>,
    pub isbn: Option<String>,
    pub cover_url_medium: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EngineStats {
    pub works: i64,
    pub editions: i64,
    pub authors: i64,
}

#[derive(Debug, Clone)]
pub struct ExternalIdCrosswalkRow {
    pub entity_type: EntityType,
    pub entity_key: String,
    pub provider_name: String,
    pub external_id: String,
    pub confidence: i16,
}

/// Postgres-backed read queries for the public search/stats/crosswalk
/// surface. A thin wrapper over `PgPool` rather than a trait, since
/// there is exactly one implementation and no test double needs to swap
/// it out — unlike [`crate::repository::EnrichmentRepository`], nothing
/// downstream depends on substitutability here.
pub struct PgQueryRepository {
    pool: PgPool,
}

impl PgQueryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// ISBN-exact, title, or author search, capped at `limit` (the caller
    /// is responsible for enforcing the public API's cap of 100).
    pub async fn search_by_isbn(&self, isbn: &str, limit: i64, offset: i64) -> Result<Vec<WorkSearchRow>, EnrichmentError> {
        let rows = sqlx::query(
            r#"
            SELECT w.work_key, w.title, w.subtitle, e.isbn, w.cover_url_medium
            FROM works w
            JOIN editions e ON e.work_key = w.work_key
            WHERE e.isbn = $1
            ORDER BY w.title
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(isbn)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(EnrichmentError::from)?;

        Ok(rows.into_iter().map(row_to_work_search).collect())
    }

    pub async fn search_by_title(&self, title: &str, limit: i64, offset: i64) -> Result<Vec<WorkSearchRow>, EnrichmentError> {
        let pattern = format!("%{title}%");
        let rows = sqlx::query(
            r#"
            SELECT w.work_key, w.title, w.subtitle, e.isbn, w.cover_url_medium
            FROM works w
            LEFT JOIN editions e ON e.work_key = w.work_key
            WHERE w.title ILIKE $1
            ORDER BY w.title
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(EnrichmentError::from)?;

        Ok(rows.into_iter().map(row_to_work_search).collect())
    }

    pub async fn search_by_author(&self, author_name: &str, limit: i64, offset: i64) -> Result<Vec<WorkSearchRow>, EnrichmentError> {
        let pattern = format!("%{author_name}%");
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT w.work_key, w.title, w.subtitle, e.isbn, w.cover_url_medium
            FROM works w
            JOIN work_authors wa ON wa.work_key = w.work_key
            JOIN authors a ON a.author_key = wa.author_key
            LEFT JOIN editions e ON e.work_key = w.work_key
            WHERE a.name ILIKE $1
            ORDER BY w.title
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(EnrichmentError::from)?;

        Ok(rows.into_iter().map(row_to_work_search).collect())
    }

    pub async fn stats(&self) -> Result<EngineStats, EnrichmentError> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM works) AS works,
                (SELECT COUNT(*) FROM editions) AS editions,
                (SELECT COUNT(*) FROM authors) AS authors
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(EnrichmentError::from)?;

        Ok(EngineStats {
            works: row.get("works"),
            editions: row.get("editions"),
            authors: row.get("authors"),
        })
    }

    /// All external-ID crosswalk rows for a given entity.
    pub async fn external_ids_for(&self, entity_type: EntityType, entity_key: &str) -> Result<Vec<ExternalIdCrosswalkRow>, EnrichmentError> {
        let rows = sqlx::query(
            r#"
            SELECT entity_type, entity_key, provider_name, external_id, confidence
            FROM external_id_mappings
            WHERE entity_type = $1 AND entity_key = $2
            "#,
        )
        .bind(entity_type)
        .bind(entity_key)
        .fetch_all(&self.pool)
        .await
        .map_err(EnrichmentError::from)?;

        Ok(rows.into_iter().map(row_to_crosswalk).collect())
    }

    /// Reverse crosswalk lookup: given a provider and its external id,
    /// find which entity it maps to.
    pub async fn resolve_external_id(&self, provider_name: &str, external_id: &str) -> Result<Option<ExternalIdCrosswalkRow>, EnrichmentError> {
        let row = sqlx::query(
            r#"
            SELECT entity_type, entity_key, provider_name, external_id, confidence
            FROM external_id_mappings
            WHERE provider_name = $1 AND external_id = $2
            ORDER BY confidence DESC
            LIMIT 1
            "#,
        )
        .bind(provider_name)
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(EnrichmentError::from)?;

        Ok(row.map(row_to_crosswalk))
    }
}

fn row_to_work_search(row: sqlx::postgres::PgRow) -> WorkSearchRow {
    WorkSearchRow {
        work_key: row.get("work_key"),
        title: row.get("title"),
        subtitle: row.get("subtitle"),
        isbn: row.get("isbn"),
        cover_url_medium: row.get("cover_url_medium"),
    }
}

fn row_to_crosswalk(row: sqlx::postgres::PgRow) -> ExternalIdCrosswalkRow {
    ExternalIdCrosswalkRow {
        entity_type: row.get("entity_type"),
        entity_key: row.get("entity_key"),
        provider_name: row.get("provider_name"),
        external_id: row.get("external_id"),
        confidence: row.get("confidence"),
    }
}
