//! Passage ranking over knowledge entries.
//!
//! Retrieval is keyword-only when no query vector is available and hybrid
//! otherwise. The algorithm operates on a slice of [`KnowledgeEntry`] in
//! insertion order, so any store that can hand over its entries can share it.
//!
//! # Hybrid Scoring Algorithm
//!
//! 1. Keyword candidates: entries sharing at least one token with the query,
//!    scored by the fraction of distinct query tokens they contain. A query
//!    with no tokens (`"!!!"`, `""`) matches entries containing its text
//!    verbatim instead, each scored 1.0.
//! 2. Vector candidates: entries carrying a vector, scored by cosine
//!    similarity to the query vector.
//! 3. Normalize both sets to `[0, 1]` using min-max normalization.
//! 4. Merge: `score = (1 - α) × keyword + α × semantic`.
//! 5. Sort by score (desc), then by recency (newest entry first).
//! 6. Drop repeated passage texts, keeping the best-ranked copy.
//! 7. Truncate to `k`.

use std::collections::{HashMap, HashSet};

use crate::embedding::cosine_similarity;
use crate::models::{KnowledgeEntry, Passage};

/// A scored reference into the entry slice.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    /// Position of the entry in insertion order.
    pub index: usize,
    pub raw_score: f64,
}

/// Split text into distinct lower-case alphanumeric tokens, in first-seen order.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Fraction of `query_terms` that appear as tokens of `text`.
pub fn keyword_score(query_terms: &[String], text: &str) -> f64 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let tokens: HashSet<String> = tokenize(text).into_iter().collect();
    let matched = query_terms.iter().filter(|t| tokens.contains(*t)).count();
    matched as f64 / query_terms.len() as f64
}

/// Score for a query that has no tokens: 1.0 when `text` contains the trimmed
/// query (or equals it, for an empty query), otherwise 0.0.
pub fn literal_score(query: &str, text: &str) -> f64 {
    let needle = query.trim();
    let hit = if needle.is_empty() {
        text.trim().is_empty()
    } else {
        text.contains(needle)
    };
    if hit {
        1.0
    } else {
        0.0
    }
}

/// Min-max normalize raw scores to `[0.0, 1.0]`.
///
/// If all scores are equal, they are normalized to `1.0`.
pub fn normalize_scores(candidates: &[Candidate]) -> Vec<(Candidate, f64)> {
    if candidates.is_empty() {
        return Vec::new();
    }

    let s_min = candidates
        .iter()
        .map(|c| c.raw_score)
        .fold(f64::INFINITY, f64::min);
    let s_max = candidates
        .iter()
        .map(|c| c.raw_score)
        .fold(f64::NEG_INFINITY, f64::max);

    candidates
        .iter()
        .map(|c| {
            let norm = if (s_max - s_min).abs() < f64::EPSILON {
                1.0
            } else {
                (c.raw_score - s_min) / (s_max - s_min)
            };
            (*c, norm)
        })
        .collect()
}

/// Rank `entries` against `query` and return the top `k` passages.
///
/// `query_vec` enables the semantic channel; `alpha` weights it.
pub fn rank(
    entries: &[KnowledgeEntry],
    query: &str,
    query_vec: Option<&[f32]>,
    alpha: f64,
    k: usize,
) -> Vec<Passage> {
    if k == 0 || entries.is_empty() {
        return Vec::new();
    }

    let terms = tokenize(query);
    let keyword_candidates: Vec<Candidate> = entries
        .iter()
        .enumerate()
        .map(|(index, e)| Candidate {
            index,
            raw_score: if terms.is_empty() {
                literal_score(query, &e.text)
            } else {
                keyword_score(&terms, &e.text)
            },
        })
        .filter(|c| c.raw_score > 0.0)
        .collect();

    let vector_candidates: Vec<Candidate> = match query_vec {
        Some(qv) => entries
            .iter()
            .enumerate()
            .filter_map(|(index, e)| {
                e.vector.as_ref().map(|v| Candidate {
                    index,
                    raw_score: cosine_similarity(qv, v) as f64,
                })
            })
            .collect(),
        None => Vec::new(),
    };

    if keyword_candidates.is_empty() && vector_candidates.is_empty() {
        return Vec::new();
    }

    let effective_alpha = if vector_candidates.is_empty() {
        0.0
    } else {
        alpha
    };

    let kw_map: HashMap<usize, f64> = normalize_scores(&keyword_candidates)
        .into_iter()
        .map(|(c, s)| (c.index, s))
        .collect();
    let vec_map: HashMap<usize, f64> = normalize_scores(&vector_candidates)
        .into_iter()
        .map(|(c, s)| (c.index, s))
        .collect();

    let all: HashSet<usize> = kw_map.keys().chain(vec_map.keys()).copied().collect();

    let mut scored: Vec<(usize, f64)> = all
        .into_iter()
        .map(|index| {
            let k = kw_map.get(&index).copied().unwrap_or(0.0);
            let v = vec_map.get(&index).copied().unwrap_or(0.0);
            (index, (1.0 - effective_alpha) * k + effective_alpha * v)
        })
        .collect();

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.0.cmp(&a.0))
    });

    let mut seen_texts = HashSet::new();
    scored
        .into_iter()
        .filter(|(index, _)| seen_texts.insert(entries[*index].text.as_str()))
        .take(k)
        .map(|(index, score)| Passage {
            text: entries[index].text.clone(),
            source_id: entries[index].metadata.source_id.clone(),
            score,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntryMetadata;

    fn entry(text: &str, vector: Option<Vec<f32>>) -> KnowledgeEntry {
        KnowledgeEntry {
            id: text.to_string(),
            text: text.to_string(),
            metadata: EntryMetadata {
                source_id: format!("src-{}", text.len()),
            },
            vector,
        }
    }

    #[test]
    fn test_tokenize_dedups_and_lowercases() {
        assert_eq!(
            tokenize("UNIQUE constraint failed: employee.email unique"),
            vec!["unique", "constraint", "failed", "employee", "email"]
        );
        assert!(tokenize("  ;; ").is_empty());
    }

    #[test]
    fn test_keyword_score_fraction() {
        let terms = tokenize("database is locked");
        assert!((keyword_score(&terms, "the database is locked") - 1.0).abs() < 1e-9);
        assert!((keyword_score(&terms, "database gone") - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(keyword_score(&terms, "nothing here"), 0.0);
        assert_eq!(keyword_score(&[], "anything"), 0.0);
    }

    #[test]
    fn test_normalize_range() {
        let c = vec![
            Candidate { index: 0, raw_score: 10.0 },
            Candidate { index: 1, raw_score: 5.0 },
            Candidate { index: 2, raw_score: 0.0 },
        ];
        let n = normalize_scores(&c);
        assert!((n[0].1 - 1.0).abs() < 1e-9);
        assert!((n[1].1 - 0.5).abs() < 1e-9);
        assert!((n[2].1 - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_all_equal() {
        let c = vec![
            Candidate { index: 0, raw_score: 3.0 },
            Candidate { index: 1, raw_score: 3.0 },
        ];
        for (_, s) in normalize_scores(&c) {
            assert!((s - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_rank_keyword_prefers_best_match() {
        let entries = vec![
            entry("UNIQUE constraint failed: employee.email", None),
            entry("database is locked", None),
            entry("no such table: employees", None),
        ];
        let passages = rank(&entries, "database is locked", None, 0.6, 1);
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].text, "database is locked");
    }

    #[test]
    fn test_rank_ties_prefer_newest() {
        let entries = vec![
            entry("database is locked (old)", None),
            entry("database is locked (new)", None),
        ];
        let passages = rank(&entries, "database is locked", None, 0.6, 2);
        assert_eq!(passages[0].text, "database is locked (new)");
        assert_eq!(passages[1].text, "database is locked (old)");
    }

    #[test]
    fn test_rank_dedups_repeated_text() {
        let entries = vec![
            entry("database is locked", None),
            entry("database is locked", None),
            entry("database disk image is malformed", None),
        ];
        let passages = rank(&entries, "database is locked", None, 0.6, 3);
        assert_eq!(passages.len(), 2);
        assert_ne!(passages[0].text, passages[1].text);
    }

    #[test]
    fn test_rank_semantic_channel() {
        let entries = vec![
            entry("alpha", Some(vec![1.0, 0.0])),
            entry("beta", Some(vec![0.0, 1.0])),
        ];
        let passages = rank(&entries, "unrelated words", Some(&[0.0, 1.0]), 1.0, 1);
        assert_eq!(passages[0].text, "beta");
    }

    #[test]
    fn test_rank_tokenless_query_matches_literally() {
        let entries = vec![
            entry("!!!", None),
            entry("database is locked", None),
            entry("boom 💥", None),
            entry("", None),
            entry("again !!!", None),
        ];

        let passages = rank(&entries, "!!!", None, 0.6, 5);
        assert_eq!(passages.len(), 2);
        assert_eq!(passages[0].text, "again !!!");
        assert_eq!(passages[1].text, "!!!");
        assert!((passages[0].score - 1.0).abs() < 1e-9);

        let passages = rank(&entries, "💥", None, 0.6, 5);
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].text, "boom 💥");

        let passages = rank(&entries, "", None, 0.6, 5);
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].text, "");

        assert!(rank(&entries, "???", None, 0.6, 5).is_empty());
    }

    #[test]
    fn test_rank_empty_inputs() {
        assert!(rank(&[], "q", None, 0.5, 3).is_empty());
        let entries = vec![entry("database is locked", None)];
        assert!(rank(&entries, "database", None, 0.5, 0).is_empty());
        assert!(rank(&entries, "zzz", None, 0.5, 3).is_empty());
    }
}
