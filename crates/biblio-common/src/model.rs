//! Persisted row shapes and queue wire shapes for the book-enrichment
//! domain.
//!
//! These are used directly by the persistence and queue layers; there is no
//! separate DTO layer translating between "row" and "domain" shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{AuthorKey, EntityType, Isbn13, Tier, WorkKey};

/// The canonical abstract book. Never deleted; updated monotonically as
/// higher-confidence data arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct WorkRow {
    pub work_key: WorkKey,
    pub title: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub original_language: Option<String>,
    pub first_publication_year: Option<i32>,
    pub subjects: Vec<String>,
    pub cover_url_large: Option<String>,
    pub cover_url_medium: Option<String>,
    pub cover_url_small: Option<String>,
    pub cross_provider_ids: Vec<String>,
    pub primary_provider: Option<String>,
    pub contributors: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkRow {
    pub fn new(work_key: WorkKey, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            work_key,
            title: title.into(),
            subtitle: None,
            description: None,
            original_language: None,
            first_publication_year: None,
            subjects: Vec::new(),
            cover_url_large: None,
            cover_url_medium: None,
            cover_url_small: None,
            cross_provider_ids: Vec::new(),
            primary_provider: None,
            contributors: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A physical/digital manifestation of a Work, identified by normalized
/// ISBN-13.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct EditionRow {
    pub isbn: Isbn13,
    pub work_key: WorkKey,
    pub title: String,
    pub publisher: Option<String>,
    pub publication_date: Option<DateTime<Utc>>,
    pub page_count: Option<i32>,
    pub binding: Option<String>,
    pub language: Option<String>,
    pub cover_url_large: Option<String>,
    pub cover_url_medium: Option<String>,
    pub cover_url_small: Option<String>,
    pub related_isbns: Vec<String>,
    pub quality_score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EditionRow {
    pub fn new(isbn: Isbn13, work_key: WorkKey, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            isbn,
            work_key,
            title: title.into(),
            publisher: None,
            publication_date: None,
            page_count: None,
            binding: None,
            language: None,
            cover_url_large: None,
            cover_url_medium: None,
            cover_url_small: None,
            related_isbns: Vec::new(),
            quality_score: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A biographical entity, many-to-many with Work via an ordered join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AuthorRow {
    pub author_key: AuthorKey,
    pub name: String,
    pub gender: Option<String>,
    pub nationality: Option<String>,
    pub birth_year: Option<i32>,
    pub death_year: Option<i32>,
    pub birth_place: Option<String>,
    pub death_place: Option<String>,
    pub biography: Option<String>,
    pub photo_url: Option<String>,
    pub wikidata_id: Option<String>,
    pub provider_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AuthorRow {
    pub fn new(author_key: AuthorKey, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            author_key,
            name: name.into(),
            gender: None,
            nationality: None,
            birth_year: None,
            death_year: None,
            birth_place: None,
            death_place: None,
            biography: None,
            photo_url: None,
            wikidata_id: None,
            provider_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// One ordered row of the Work↔Author join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct WorkAuthorRow {
    pub work_key: WorkKey,
    pub author_key: AuthorKey,
    pub author_order: i32,
}

/// A bidirectional crosswalk row: one provider's claim about one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ExternalIdMappingRow {
    pub entity_type: EntityType,
    pub entity_key: String,
    pub provider_name: String,
    pub external_id: String,
    pub confidence: i16,
    pub created_at: DateTime<Utc>,
}

impl ExternalIdMappingRow {
    pub fn new(
        entity_type: EntityType,
        entity_key: impl Into<String>,
        provider_name: impl Into<String>,
        external_id: impl Into<String>,
        confidence: i16,
    ) -> Self {
        Self {
            entity_type,
            entity_key: entity_key.into(),
            provider_name: provider_name.into(),
            external_id: external_id.into(),
            confidence: confidence.clamp(0, 100),
            created_at: Utc::now(),
        }
    }
}

/// Queue-message priority for cover jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
}

/// The discriminated enrichment job variants, `#[serde(tag =
/// "type")]` internally tagged so the wire shape is the stable external
/// contract (`{"type": "enrich_isbn", "isbn": "...", ...}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EnrichmentJob {
    EnrichIsbn {
        isbn: String,
        source: Option<String>,
    },
    EnrichCover {
        isbn: String,
        work_key: Option<WorkKey>,
        provider_url: Option<String>,
        priority: Priority,
    },
    EnrichAuthorBibliography {
        author_name: String,
        max_pages: u32,
    },
    BackfillMonth {
        year: i32,
        month: u32,
        resume_page: Option<u32>,
    },
}

/// Metadata carried alongside a job by the queue transport, not part of the
/// job's own wire shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEnvelope {
    pub job: EnrichmentJob,
    pub attempt_count: u32,
    pub first_enqueued_at: DateTime<Utc>,
}

impl JobEnvelope {
    pub fn new(job: EnrichmentJob) -> Self {
        Self {
            job,
            attempt_count: 0,
            first_enqueued_at: Utc::now(),
        }
    }
}

/// In-memory provider record.
#[derive(Debug, Clone)]
pub struct ProviderRecord {
    pub name: String,
    pub tier: Tier,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enrichment_job_serializes_enrich_isbn_shape() {
        let job = EnrichmentJob::EnrichIsbn {
            isbn: "9780385544153".into(),
            source: Some("batch_direct".into()),
        };
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["type"], "enrich_isbn");
        assert_eq!(json["isbn"], "9780385544153");
    }

    #[test]
    fn enrichment_job_round_trips() {
        let job = EnrichmentJob::EnrichCover {
            isbn: "9780385544153".into(),
            work_key: Some(WorkKey::new()),
            provider_url: None,
            priority: Priority::High,
        };
        let json = serde_json::to_string(&job).unwrap();
        let back: EnrichmentJob = serde_json::from_str(&json).unwrap();
        match back {
            EnrichmentJob::EnrichCover { priority, .. } => assert_eq!(priority, Priority::High),
            _ => panic!("wrong variant"),
        }
    }
}
