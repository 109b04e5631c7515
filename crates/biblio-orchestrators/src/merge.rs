//! Merge-rule free functions used by the aggregate-mode orchestrators.
//! Kept free of any provider/orchestrator
//! machinery so they're unit-testable without spinning up fake providers.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use biblio_registry::{BookCandidate, ExternalIdResult};

static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("static regex"));
static STOP_ARTICLES: [&str; 3] = ["the", "a", "an"];

/// Lowercase, strip punctuation, drop a single leading stop-article.
/// Used both for the fast exact-match dedup path and as the input to the
/// fuzzy Levenshtein pass.
pub fn normalize_title(title: &str) -> String {
    let lowered = title.to_lowercase();
    let stripped = PUNCTUATION.replace_all(&lowered, "");
    let collapsed: String = stripped.split_whitespace().collect::<Vec<_>>().join(" ");

    for article in STOP_ARTICLES {
        if let Some(rest) = collapsed.strip_prefix(article) {
            if let Some(rest) = rest.strip_prefix(' ') {
                return rest.to_string();
            }
        }
    }
    collapsed
}

/// Union with case-insensitive dedup, preserving first-seen casing.
/// O(n) via a lowercased-key `HashSet`, critical for
/// subject-heavy books.
pub fn merge_subjects(lists: impl IntoIterator<Item = Vec<String>>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut merged = Vec::new();
    for list in lists {
        for subject in list {
            let key = subject.to_lowercase();
            if seen.insert(key) {
                merged.push(subject);
            }
        }
    }
    merged
}

/// Choose the longest non-null string among candidates.
pub fn longest_non_empty<'a>(candidates: impl IntoIterator<Item = &'a str>) -> Option<String> {
    candidates
        .into_iter()
        .filter(|s| !s.is_empty())
        .max_by_key(|s| s.len())
        .map(|s| s.to_string())
}

/// First non-null value in priority order.
pub fn first_non_null<T>(candidates: impl IntoIterator<Item = Option<T>>) -> Option<T> {
    candidates.into_iter().flatten().next()
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergedExternalId {
    pub id_type: String,
    pub value: String,
    pub sources: Vec<String>,
    pub confidence: u8,
}

/// Merge external-ID results by `id_type` across providers: agreement
/// unions source names and raises confidence to the mean,
/// rounded; disagreement keeps the higher-confidence value and logs the
/// conflict via the returned `conflicts` list rather than panicking.
pub fn merge_external_ids(
    results: impl IntoIterator<Item = (String, Vec<ExternalIdResult>)>,
) -> (Vec<MergedExternalId>, Vec<String>) {
    let mut by_type: HashMap<String, Vec<(String, ExternalIdResult)>> = HashMap::new();
    for (provider, ids) in results {
        for id in ids {
            by_type
                .entry(id.id_type.clone())
                .or_default()
                .push((provider.clone(), id));
        }
    }

    let mut merged = Vec::new();
    let mut conflicts = Vec::new();

    for (id_type, entries) in by_type {
        let mut by_value: HashMap<String, Vec<(String, u8)>> = HashMap::new();
        for (provider, id) in &entries {
            by_value
                .entry(id.value.clone())
                .or_default()
                .push((provider.clone(), id.confidence));
        }

        if by_value.len() == 1 {
            let (value, contributors) = by_value.into_iter().next().expect("len checked above");
            let mean_confidence = mean_rounded(contributors.iter().map(|(_, c)| *c));
            merged.push(MergedExternalId {
                id_type,
                value,
                sources: contributors.into_iter().map(|(p, _)| p).collect(),
                confidence: mean_confidence,
            });
        } else {
            // Disagreement: keep the value from the highest-confidence
            // contributor, log the conflict.
            let (winning_value, winning_contributors) = by_value
                .into_iter()
                .max_by_key(|(_, contributors)| contributors.iter().map(|(_, c)| *c).max().unwrap_or(0))
                .expect("non-empty by construction");
            conflicts.push(format!(
                "conflicting values for external id type '{id_type}': chose '{winning_value}'"
            ));
            let mean_confidence = mean_rounded(winning_contributors.iter().map(|(_, c)| *c));
            merged.push(MergedExternalId {
                id_type,
                value: winning_value,
                sources: winning_contributors.into_iter().map(|(p, _)| p).collect(),
                confidence: mean_confidence,
            });
        }
    }

    (merged, conflicts)
}

fn mean_rounded(values: impl Iterator<Item = u8>) -> u8 {
    let values: Vec<u8> = values.collect();
    if values.is_empty() {
        return 0;
    }
    let sum: u32 = values.iter().map(|v| *v as u32).sum();
    ((sum as f64 / values.len() as f64).round()) as u8
}

/// Deduplicate generated book candidates by normalized title similarity:
/// exact-normalized matches are dropped via a fast `HashSet`
/// path; the O(n²) fuzzy pass runs only against the remaining candidates.
pub fn dedup_generated_titles(candidates: Vec<BookCandidate>, threshold: f64) -> Vec<BookCandidate> {
    let mut seen_exact = std::collections::HashSet::new();
    let mut exact_survivors = Vec::new();

    for candidate in candidates {
        let key = normalize_title(&candidate.title);
        if seen_exact.insert(key) {
            exact_survivors.push(candidate);
        }
    }

    let mut accepted: Vec<BookCandidate> = Vec::new();
    'candidates: for candidate in exact_survivors {
        let normalized = normalize_title(&candidate.title);
        for existing in &accepted {
            let existing_normalized = normalize_title(&existing.title);
            if strsim::normalized_levenshtein(&normalized, &existing_normalized) >= threshold {
                continue 'candidates;
            }
        }
        accepted.push(candidate);
    }

    accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_title_strips_article_and_punctuation() {
        assert_eq!(normalize_title("The Hobbit!"), "hobbit");
        assert_eq!(normalize_title("A Tale of Two Cities"), "tale of two cities");
    }

    #[test]
    fn merge_subjects_dedups_case_insensitively_preserving_first_casing() {
        let merged = merge_subjects(vec![
            vec!["Fantasy".to_string(), "Adventure".to_string()],
            vec!["fantasy".to_string(), "Young Adult".to_string()],
        ]);
        assert_eq!(merged, vec!["Fantasy", "Adventure", "Young Adult"]);
    }

    #[test]
    fn longest_non_empty_picks_the_longest_description() {
        let picked = longest_non_empty(vec!["short", "a much longer description here", ""]);
        assert_eq!(picked, Some("a much longer description here".to_string()));
    }

    #[test]
    fn merge_external_ids_unions_agreeing_sources_and_averages_confidence() {
        let (merged, conflicts) = merge_external_ids(vec![
            (
                "goodreads_id".to_string(),
                vec![ExternalIdResult {
                    id_type: "goodreads_id".to_string(),
                    value: "12345".to_string(),
                    confidence: 80,
                }],
            ),
            (
                "work-graph".to_string(),
                vec![ExternalIdResult {
                    id_type: "goodreads_id".to_string(),
                    value: "12345".to_string(),
                    confidence: 90,
                }],
            ),
        ]);
        assert!(conflicts.is_empty());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].confidence, 85);
        assert_eq!(merged[0].sources.len(), 2);
    }

    #[test]
    fn merge_external_ids_logs_conflict_and_keeps_higher_confidence_value() {
        let (merged, conflicts) = merge_external_ids(vec![
            (
                "provider-a".to_string(),
                vec![ExternalIdResult {
                    id_type: "goodreads_id".to_string(),
                    value: "111".to_string(),
                    confidence: 60,
                }],
            ),
            (
                "provider-b".to_string(),
                vec![ExternalIdResult {
                    id_type: "goodreads_id".to_string(),
                    value: "222".to_string(),
                    confidence: 95,
                }],
            ),
        ]);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(merged[0].value, "222");
    }

    #[test]
    fn dedup_generated_titles_drops_fuzzy_duplicates() {
        let candidates = vec![
            BookCandidate {
                title: "The Left Hand of Darkness".to_string(),
                author: "Ursula K. Le Guin".to_string(),
                publish_date: None,
                confidence: 80,
                source: "gemini-generator".to_string(),
            },
            BookCandidate {
                title: "Left Hand of Darkness".to_string(),
                author: "Ursula Le Guin".to_string(),
                publish_date: None,
                confidence: 70,
                source: "xai-generator".to_string(),
            },
            BookCandidate {
                title: "Dune".to_string(),
                author: "Frank Herbert".to_string(),
                publish_date: None,
                confidence: 90,
                source: "gemini-generator".to_string(),
            },
        ];
        let deduped = dedup_generated_titles(candidates, 0.6);
        assert_eq!(deduped.len(), 2);
    }
}
