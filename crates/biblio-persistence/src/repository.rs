//! PostgreSQL persistence for Works, Editions, Authors, and the external-ID
//! crosswalk. Raw `sqlx::query`/`query_as` calls throughout, not the
//! `query!` macro, so this crate compiles without a live `DATABASE_URL`.

use std::collections::HashSet;

use biblio_common::{AuthorRow, EditionRow, EnrichmentError, ExternalIdMappingRow, Isbn13, WorkAuthorRow, WorkRow};
use chrono::Utc;
use sqlx::{PgPool, Row};

/// Enrichment persistence contract. Implementors write plain `async
/// fn`s; the `Send`-bounded `EnrichmentRepository` trait used by callers is
/// generated by `trait_variant::make`.
#[trait_variant::make(EnrichmentRepository: Send)]
pub trait LocalEnrichmentRepository {
    /// Inserts or updates a Work. A Work row is never deleted, only
    /// monotonically enriched: existing non-null fields are kept unless the
    /// incoming row also supplies a value.
    async fn enrich_work(&self, work: &WorkRow) -> Result<(), EnrichmentError>;

    /// Inserts or updates an Edition. `work_key` must already exist (caller
    /// is responsible for calling `enrich_work` first within the same
    /// transaction scope when introducing a new Work).
    async fn enrich_edition(&self, edition: &EditionRow) -> Result<(), EnrichmentError>;

    /// Looks up the Work an Edition with this ISBN already belongs to, if
    /// one exists. Callers introducing a new Edition for an ISBN must
    /// check this first and reuse the existing `work_key` instead of
    /// minting a fresh one, or re-processing the same enrichment message
    /// would grow an orphan Work row per retry.
    async fn work_key_for_isbn(&self, isbn: &Isbn13) -> Result<Option<biblio_common::WorkKey>, EnrichmentError>;

    /// Inserts or updates an Author.
    async fn enrich_author(&self, author: &AuthorRow) -> Result<(), EnrichmentError>;

    /// Replaces the ordered Work↔Author join for a Work with the given rows.
    async fn link_work_authors(&self, work_key: biblio_common::WorkKey, links: &[WorkAuthorRow]) -> Result<(), EnrichmentError>;

    /// Inserts external-ID crosswalk rows, keeping the higher-confidence
    /// claim when a `(entity_type, entity_key, provider_name)` triple
    /// already exists.
    async fn upsert_external_ids(&self, mappings: &[ExternalIdMappingRow]) -> Result<(), EnrichmentError>;

    /// Best-effort cover-URL update used by the Cover Queue Consumer,
    /// separate from [`LocalEnrichmentRepository::enrich_edition`]
    /// because a standalone cover job doesn't carry a title or the rest of
    /// an Edition's fields to upsert. A missing Edition row is not an
    /// error: the update simply matches zero rows.
    async fn update_edition_cover_urls(
        &self,
        isbn: &Isbn13,
        large: &str,
        medium: &str,
        small: &str,
    ) -> Result<(), EnrichmentError>;
}

/// Postgres-backed `EnrichmentRepository`.
pub struct PgEnrichmentRepository {
    pool: PgPool,
}

impl PgEnrichmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl LocalEnrichmentRepository for PgEnrichmentRepository {
    async fn enrich_work(&self, work: &WorkRow) -> Result<(), EnrichmentError> {
        sqlx::query(
            r#"
            INSERT INTO works (
                work_key, title, subtitle, description, original_language,
                first_publication_year, subjects, cover_url_large,
                cover_url_medium, cover_url_small, cross_provider_ids,
                primary_provider, contributors, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (work_key) DO UPDATE SET
                title = EXCLUDED.title,
                subtitle = COALESCE(works.subtitle, EXCLUDED.subtitle),
                description = COALESCE(works.description, EXCLUDED.description),
                original_language = COALESCE(works.original_language, EXCLUDED.original_language),
                first_publication_year = COALESCE(works.first_publication_year, EXCLUDED.first_publication_year),
                subjects = ARRAY(SELECT DISTINCT unnest(works.subjects || EXCLUDED.subjects)),
                cover_url_large = COALESCE(EXCLUDED.cover_url_large, works.cover_url_large),
                cover_url_medium = COALESCE(EXCLUDED.cover_url_medium, works.cover_url_medium),
                cover_url_small = COALESCE(EXCLUDED.cover_url_small, works.cover_url_small),
                cross_provider_ids = ARRAY(SELECT DISTINCT unnest(works.cross_provider_ids || EXCLUDED.cross_provider_ids)),
                primary_provider = COALESCE(works.primary_provider, EXCLUDED.primary_provider),
                contributors = ARRAY(SELECT DISTINCT unnest(works.contributors || EXCLUDED.contributors)),
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(work.work_key)
        .bind(&work.title)
        .bind(&work.subtitle)
        .bind(&work.description)
        .bind(&work.original_language)
        .bind(work.first_publication_year)
        .bind(&merged_subjects(work))
        .bind(&work.cover_url_large)
        .bind(&work.cover_url_medium)
        .bind(&work.cover_url_small)
        .bind(&work.cross_provider_ids)
        .bind(&work.primary_provider)
        .bind(&work.contributors)
        .bind(work.created_at)
        .bind(work.updated_at)
        .execute(&self.pool)
        .await
        .map_err(EnrichmentError::from)?;

        Ok(())
    }

    async fn enrich_edition(&self, edition: &EditionRow) -> Result<(), EnrichmentError> {
        sqlx::query(
            r#"
            INSERT INTO editions (
                isbn, work_key, title, publisher, publication_date,
                page_count, binding, language, cover_url_large,
                cover_url_medium, cover_url_small, related_isbns,
                quality_score, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (isbn) DO UPDATE SET
                title = EXCLUDED.title,
                publisher = COALESCE(editions.publisher, EXCLUDED.publisher),
                publication_date = COALESCE(editions.publication_date, EXCLUDED.publication_date),
                page_count = COALESCE(editions.page_count, EXCLUDED.page_count),
                binding = COALESCE(editions.binding, EXCLUDED.binding),
                language = COALESCE(editions.language, EXCLUDED.language),
                cover_url_large = COALESCE(EXCLUDED.cover_url_large, editions.cover_url_large),
                cover_url_medium = COALESCE(EXCLUDED.cover_url_medium, editions.cover_url_medium),
                cover_url_small = COALESCE(EXCLUDED.cover_url_small, editions.cover_url_small),
                related_isbns = editions.related_isbns,
                quality_score = GREATEST(editions.quality_score, EXCLUDED.quality_score),
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&edition.isbn)
        .bind(edition.work_key)
        .bind(&edition.title)
        .bind(&edition.publisher)
        .bind(edition.publication_date)
        .bind(edition.page_count)
        .bind(&edition.binding)
        .bind(&edition.language)
        .bind(&edition.cover_url_large)
        .bind(&edition.cover_url_medium)
        .bind(&edition.cover_url_small)
        .bind(&edition.related_isbns)
        .bind(edition.quality_score)
        .bind(edition.created_at)
        .bind(edition.updated_at)
        .execute(&self.pool)
        .await
        .map_err(EnrichmentError::from)?;

        Ok(())
    }

    async fn work_key_for_isbn(&self, isbn: &Isbn13) -> Result<Option<biblio_common::WorkKey>, EnrichmentError> {
        let row = sqlx::query("SELECT work_key FROM editions WHERE isbn = $1")
            .bind(isbn)
            .fetch_optional(&self.pool)
            .await
            .map_err(EnrichmentError::from)?;

        Ok(row.map(|r| r.get::<biblio_common::WorkKey, _>("work_key")))
    }

    async fn enrich_author(&self, author: &AuthorRow) -> Result<(), EnrichmentError> {
        sqlx::query(
            r#"
            INSERT INTO authors (
                author_key, name, gender, nationality, birth_year,
                death_year, birth_place, death_place, biography,
                photo_url, wikidata_id, provider_ids, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (author_key) DO UPDATE SET
                name = EXCLUDED.name,
                gender = COALESCE(authors.gender, EXCLUDED.gender),
                nationality = COALESCE(authors.nationality, EXCLUDED.nationality),
                birth_year = COALESCE(authors.birth_year, EXCLUDED.birth_year),
                death_year = COALESCE(authors.death_year, EXCLUDED.death_year),
                birth_place = COALESCE(authors.birth_place, EXCLUDED.birth_place),
                death_place = COALESCE(authors.death_place, EXCLUDED.death_place),
                biography = COALESCE(authors.biography, EXCLUDED.biography),
                photo_url = COALESCE(authors.photo_url, EXCLUDED.photo_url),
                wikidata_id = COALESCE(authors.wikidata_id, EXCLUDED.wikidata_id),
                provider_ids = EXCLUDED.provider_ids,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(author.author_key)
        .bind(&author.name)
        .bind(&author.gender)
        .bind(&author.nationality)
        .bind(author.birth_year)
        .bind(author.death_year)
        .bind(&author.birth_place)
        .bind(&author.death_place)
        .bind(&author.biography)
        .bind(&author.photo_url)
        .bind(&author.wikidata_id)
        .bind(&author.provider_ids)
        .bind(author.created_at)
        .bind(author.updated_at)
        .execute(&self.pool)
        .await
        .map_err(EnrichmentError::from)?;

        Ok(())
    }

    async fn link_work_authors(&self, work_key: biblio_common::WorkKey, links: &[WorkAuthorRow]) -> Result<(), EnrichmentError> {
        let mut tx = self.pool.begin().await.map_err(EnrichmentError::from)?;

        sqlx::query("DELETE FROM work_authors WHERE work_key = $1")
            .bind(work_key)
            .execute(&mut *tx)
            .await
            .map_err(EnrichmentError::from)?;

        for link in links {
            sqlx::query(
                "INSERT INTO work_authors (work_key, author_key, author_order) VALUES ($1, $2, $3)",
            )
            .bind(link.work_key)
            .bind(link.author_key)
            .bind(link.author_order)
            .execute(&mut *tx)
            .await
            .map_err(EnrichmentError::from)?;
        }

        tx.commit().await.map_err(EnrichmentError::from)?;
        Ok(())
    }

    async fn upsert_external_ids(&self, mappings: &[ExternalIdMappingRow]) -> Result<(), EnrichmentError> {
        let mut tx = self.pool.begin().await.map_err(EnrichmentError::from)?;

        for mapping in mappings {
            sqlx::query(
                r#"
                INSERT INTO external_id_mappings (
                    entity_type, entity_key, provider_name, external_id, confidence, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (entity_type, entity_key, provider_name) DO UPDATE SET
                    external_id = EXCLUDED.external_id,
                    confidence = EXCLUDED.confidence,
                    created_at = EXCLUDED.created_at
                WHERE EXCLUDED.confidence >= external_id_mappings.confidence
                "#,
            )
            .bind(mapping.entity_type)
            .bind(&mapping.entity_key)
            .bind(&mapping.provider_name)
            .bind(&mapping.external_id)
            .bind(mapping.confidence)
            .bind(mapping.created_at)
            .execute(&mut *tx)
            .await
            .map_err(EnrichmentError::from)?;
        }

        tx.commit().await.map_err(EnrichmentError::from)?;
        Ok(())
    }

    async fn update_edition_cover_urls(
        &self,
        isbn: &Isbn13,
        large: &str,
        medium: &str,
        small: &str,
    ) -> Result<(), EnrichmentError> {
        sqlx::query(
            r#"
            UPDATE editions
            SET cover_url_large = $2, cover_url_medium = $3, cover_url_small = $4, updated_at = $5
            WHERE isbn = $1
            "#,
        )
        .bind(isbn)
        .bind(large)
        .bind(medium)
        .bind(small)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(EnrichmentError::from)?;

        Ok(())
    }
}

/// De-dups the incoming row's own subjects before binding. The union
/// against whatever is already stored for this Work happens in the upsert's
/// `ON CONFLICT DO UPDATE` itself (`subjects = ARRAY(SELECT DISTINCT
/// unnest(works.subjects || EXCLUDED.subjects))`); this only guards against
/// the caller handing us a row with its own internal duplicates.
fn merged_subjects(work: &WorkRow) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut out = Vec::with_capacity(work.subjects.len());
    for subject in &work.subjects {
        if seen.insert(subject.as_str()) {
            out.push(subject.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use biblio_common::WorkKey;

    #[test]
    fn merged_subjects_dedupes_preserving_order() {
        let mut work = WorkRow::new(WorkKey::new(), "Dune");
        work.subjects = vec!["sci-fi".into(), "desert".into(), "sci-fi".into()];
        let merged = merged_subjects(&work);
        assert_eq!(merged, vec!["sci-fi".to_string(), "desert".to_string()]);
    }
}
