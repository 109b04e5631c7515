//! Domain result shapes returned by capability methods.

use std::collections::HashMap;

use biblio_common::Isbn13;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsbnResolution {
    pub isbn: Isbn13,
    pub confidence: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverSize {
    Large,
    Medium,
    Small,
    /// The provider returned a single URL without a declared size; the
    /// Cover Processor derives the three sizes itself.
    Unspecified,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverResult {
    pub url: String,
    pub size: CoverSize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub publisher: Option<String>,
    pub page_count: Option<i32>,
    pub language: Option<String>,
    pub publication_year: Option<i32>,
    pub isbns: Vec<String>,
    pub cover_url: Option<String>,
    pub description: Option<String>,
    pub authors: Vec<String>,
    pub subjects: Vec<String>,
    pub external_ids: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookCandidate {
    pub title: String,
    pub author: String,
    pub publish_date: Option<String>,
    pub confidence: u8,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditionVariant {
    pub isbn: Isbn13,
    pub format: String,
    pub language: Option<String>,
    pub publisher: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalIdResult {
    pub id_type: String,
    pub value: String,
    pub confidence: u8,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RatingResult {
    pub value: f64,
    pub confidence: u8,
}
