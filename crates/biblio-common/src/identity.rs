//! Identity types for the book-enrichment domain.
//!
//! Follows the workspace's newtype-over-UUID idiom for opaque keys
//! (`WorkKey`, `AuthorKey`), but `Isbn13` is deliberately *not* a UUID
//! wrapper: Edition identity is the ISBN itself, normalized and validated,
//! never a synthetic key.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EnrichmentError;

/// Opaque stable identity for a Work (the abstract, edition-agnostic book).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
pub struct WorkKey(Uuid);

impl WorkKey {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for WorkKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "work:{}", self.0)
    }
}

impl FromStr for WorkKey {
    type Err = EnrichmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("work:").unwrap_or(s);
        Uuid::parse_str(raw)
            .map(WorkKey)
            .map_err(|e| EnrichmentError::Validation(format!("invalid work key: {e}")))
    }
}

/// Opaque stable identity for an Author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
pub struct AuthorKey(Uuid);

impl AuthorKey {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AuthorKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AuthorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "author:{}", self.0)
    }
}

impl FromStr for AuthorKey {
    type Err = EnrichmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("author:").unwrap_or(s);
        Uuid::parse_str(raw)
            .map(AuthorKey)
            .map_err(|e| EnrichmentError::Validation(format!("invalid author key: {e}")))
    }
}

/// A normalized, validated ISBN-13 string. The only way to construct one is
/// [`Isbn13::normalize`], so any `Isbn13` in hand is guaranteed to be a
/// well-formed 13-digit, checksum-valid identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
pub struct Isbn13(String);

impl Isbn13 {
    /// Strip non-alphanumerics, upper-case, accept either a 10- or 13-digit
    /// input, converting ISBN-10 to ISBN-13 via the standard checksum rule.
    /// `normalize(normalize(x)) == normalize(x)` for any valid `x`.
    pub fn normalize(raw: &str) -> Result<Self, EnrichmentError> {
        let cleaned: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_uppercase())
            .collect();

        match cleaned.len() {
            13 => {
                if !cleaned.chars().all(|c| c.is_ascii_digit()) {
                    return Err(EnrichmentError::Validation(format!(
                        "ISBN-13 must be all digits: {raw}"
                    )));
                }
                if !is_valid_isbn13_checksum(&cleaned) {
                    return Err(EnrichmentError::Validation(format!(
                        "invalid ISBN-13 checksum: {raw}"
                    )));
                }
                Ok(Isbn13(cleaned))
            }
            10 => {
                if !is_valid_isbn10_checksum(&cleaned) {
                    return Err(EnrichmentError::Validation(format!(
                        "invalid ISBN-10 checksum: {raw}"
                    )));
                }
                Ok(Isbn13(isbn10_to_isbn13(&cleaned)))
            }
            _ => Err(EnrichmentError::Validation(format!(
                "ISBN must be 10 or 13 characters after normalization, got {}: {raw}",
                cleaned.len()
            ))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Isbn13 {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Isbn13 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Isbn13 {
    type Err = EnrichmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Isbn13::normalize(s)
    }
}

fn isbn10_to_isbn13(isbn10: &str) -> String {
    let core = &isbn10[..9]; // drop the ISBN-10 check digit
    let prefix = format!("978{core}");
    let check = compute_isbn13_check_digit(&prefix);
    format!("{prefix}{check}")
}

fn compute_isbn13_check_digit(first12: &str) -> u32 {
    let sum: u32 = first12
        .chars()
        .enumerate()
        .map(|(i, c)| {
            let d = c.to_digit(10).unwrap_or(0);
            if i % 2 == 0 {
                d
            } else {
                d * 3
            }
        })
        .sum();
    (10 - (sum % 10)) % 10
}

fn is_valid_isbn13_checksum(isbn13: &str) -> bool {
    if isbn13.len() != 13 {
        return false;
    }
    let digits: Vec<u32> = isbn13.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() != 13 {
        return false;
    }
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { *d } else { d * 3 })
        .sum();
    sum % 10 == 0
}

fn is_valid_isbn10_checksum(isbn10: &str) -> bool {
    if isbn10.len() != 10 {
        return false;
    }
    let chars: Vec<char> = isbn10.chars().collect();
    let mut sum: u32 = 0;
    for (i, c) in chars.iter().enumerate() {
        let weight = 10 - i as u32;
        let value = if *c == 'X' && i == 9 {
            10
        } else if let Some(d) = c.to_digit(10) {
            d
        } else {
            return false;
        };
        sum += weight * value;
    }
    sum % 11 == 0
}

/// The discriminant used in External-ID mappings and crosswalk lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Work,
    Edition,
    Author,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityType::Work => "work",
            EntityType::Edition => "edition",
            EntityType::Author => "author",
        };
        write!(f, "{s}")
    }
}

impl FromStr for EntityType {
    type Err = EnrichmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "work" => Ok(EntityType::Work),
            "edition" => Ok(EntityType::Edition),
            "author" => Ok(EntityType::Author),
            other => Err(EnrichmentError::Validation(format!(
                "unknown entity type: {other}"
            ))),
        }
    }
}

/// Provider cost tier. Ordered for the default "paid, then free, then AI"
/// discovery ordering in the orchestrator skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Paid,
    Free,
    Ai,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tier::Paid => "paid",
            Tier::Free => "free",
            Tier::Ai => "ai",
        };
        write!(f, "{s}")
    }
}

/// The closed set of capabilities a provider may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    IsbnResolution,
    CoverImages,
    MetadataEnrichment,
    SubjectEnrichment,
    BookGeneration,
    EditionVariants,
    EnhancedExternalIds,
    Ratings,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Capability::IsbnResolution => "isbn_resolution",
            Capability::CoverImages => "cover_images",
            Capability::MetadataEnrichment => "metadata_enrichment",
            Capability::SubjectEnrichment => "subject_enrichment",
            Capability::BookGeneration => "book_generation",
            Capability::EditionVariants => "edition_variants",
            Capability::EnhancedExternalIds => "enhanced_external_ids",
            Capability::Ratings => "ratings",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Capability {
    type Err = EnrichmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "isbn_resolution" => Ok(Capability::IsbnResolution),
            "cover_images" => Ok(Capability::CoverImages),
            "metadata_enrichment" => Ok(Capability::MetadataEnrichment),
            "subject_enrichment" => Ok(Capability::SubjectEnrichment),
            "book_generation" => Ok(Capability::BookGeneration),
            "edition_variants" => Ok(Capability::EditionVariants),
            "enhanced_external_ids" => Ok(Capability::EnhancedExternalIds),
            "ratings" => Ok(Capability::Ratings),
            other => Err(EnrichmentError::Validation(format!(
                "unknown capability: {other}"
            ))),
        }
    }
}

/// Stored as `TEXT` rather than a native Postgres enum, so the crosswalk
/// table doesn't need an `ALTER TYPE` migration whenever a new entity kind
/// is added; encodes/decodes via the `Display`/`FromStr` impls above.
#[cfg(feature = "sqlx")]
impl sqlx::Type<sqlx::Postgres> for EntityType {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }
}

#[cfg(feature = "sqlx")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for EntityType {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let raw = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        raw.parse().map_err(Into::into)
    }
}

#[cfg(feature = "sqlx")]
impl<'q> sqlx::Encode<'q, sqlx::Postgres> for EntityType {
    fn encode_by_ref(
        &self,
        buf: &mut <sqlx::Postgres as sqlx::database::HasArguments<'q>>::ArgumentBuffer,
    ) -> sqlx::encode::IsNull {
        <String as sqlx::Encode<sqlx::Postgres>>::encode(self.to_string(), buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_isbn13_with_hyphens() {
        let isbn = Isbn13::normalize("978-0-385-54415-3").unwrap();
        assert_eq!(isbn.as_str(), "9780385544153");
    }

    #[test]
    fn converts_isbn10_to_isbn13() {
        // "0-385-54415-X" style check: use a known valid ISBN-10.
        let isbn = Isbn13::normalize("0-7475-3269-9").unwrap();
        assert_eq!(isbn.as_str().len(), 13);
        assert!(isbn.as_str().starts_with("978"));
    }

    #[test]
    fn rejects_bad_checksum() {
        assert!(Isbn13::normalize("9780385544150").is_err());
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(Isbn13::normalize("12345").is_err());
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = Isbn13::normalize("978-0-385-54415-3").unwrap();
        let twice = Isbn13::normalize(once.as_str()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn capability_round_trips_through_string() {
        for cap in [
            Capability::IsbnResolution,
            Capability::CoverImages,
            Capability::MetadataEnrichment,
            Capability::SubjectEnrichment,
            Capability::BookGeneration,
            Capability::EditionVariants,
            Capability::EnhancedExternalIds,
            Capability::Ratings,
        ] {
            let s = cap.to_string();
            assert_eq!(s.parse::<Capability>().unwrap(), cap);
        }
    }

    #[test]
    fn tier_orders_paid_first() {
        let mut tiers = vec![Tier::Ai, Tier::Paid, Tier::Free];
        tiers.sort();
        assert_eq!(tiers, vec![Tier::Paid, Tier::Free, Tier::Ai]);
    }
}
