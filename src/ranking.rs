//! # Relevance Ranking Module
//!
//! ## Purpose
//! Scores candidate titles against a user query so search and image results
//! can be ordered by relevance. Shared by the text and file search paths.
//!
//! ## Input/Output Specification
//! - **Input**: Candidate title + query string
//! - **Output**: Relevance score (higher is more relevant), 0-1 similarity
//! - **Ordering**: Stable sort by score descending preserves discovery order
//!   for ties
//!
//! ## Key Features
//! - Fixed point awards for exact, prefix, substring and token-cover matches
//! - Per-token awards for equality, prefix, and fuzzy character similarity
//! - Small length tiebreak favoring shorter (more likely exact) titles
//!
//! The character similarity measure is deliberately simple: a positional
//! match ratio over the shorter string, penalized by the relative length
//! difference. It catches single-character typos but not transpositions or
//! insertions at the start of a string; that trade-off is acceptable for
//! title ranking and much cheaper than true edit distance.

use crate::utils::collapse_whitespace;
use unicode_normalization::UnicodeNormalization;

/// Normalize a title or query for comparison: NFC, lowercase, `File:` and
/// `Image:` prefixes stripped, underscores to spaces, whitespace collapsed.
pub fn normalize_title(raw: &str) -> String {
    let mut text: String = raw.nfc().collect::<String>().trim().to_string();
    for prefix in ["file:", "image:"] {
        if text.len() >= prefix.len() && text[..prefix.len()].eq_ignore_ascii_case(prefix) {
            text = text[prefix.len()..].to_string();
            break;
        }
    }
    let lowered = text.to_lowercase().replace('_', " ");
    collapse_whitespace(&lowered).trim().to_string()
}

/// Positional character-match ratio between two strings, 0.0 to 1.0.
///
/// Compares characters at equal positions over the shorter string's length,
/// then penalizes by the relative length difference. Not an edit distance.
pub fn char_similarity(a: &str, b: &str) -> f64 {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    if a_chars.is_empty() || b_chars.is_empty() {
        return 0.0;
    }

    let shorter = a_chars.len().min(b_chars.len());
    let longer = a_chars.len().max(b_chars.len());

    let matches = a_chars
        .iter()
        .zip(b_chars.iter())
        .filter(|(x, y)| x == y)
        .count();

    let ratio = matches as f64 / shorter as f64;
    let length_penalty = (longer - shorter) as f64 / longer as f64;
    (ratio * (1.0 - length_penalty)).clamp(0.0, 1.0)
}

/// Score a candidate title against a query; higher is more relevant.
///
/// Awards are additive so an exact match always outranks a substring match,
/// which outranks a single fuzzy token hit. `fuzzy_threshold` is the minimum
/// [`char_similarity`] for a token to count as a fuzzy match.
pub fn relevance_score(candidate: &str, query: &str, fuzzy_threshold: f64) -> f64 {
    let cand = normalize_title(candidate);
    let q = normalize_title(query);
    if cand.is_empty() || q.is_empty() {
        return 0.0;
    }

    let mut score = 0.0;

    if cand == q {
        score += 100.0;
    } else if cand.starts_with(&q) {
        score += 50.0;
    } else if cand.contains(&q) {
        score += 30.0;
    }

    let cand_tokens: Vec<&str> = cand.split(' ').collect();
    let q_tokens: Vec<&str> = q.split(' ').collect();

    // All query tokens present as a token or token-prefix
    if q_tokens
        .iter()
        .all(|qt| cand_tokens.iter().any(|ct| ct == qt || ct.starts_with(qt)))
    {
        score += 20.0;
    }

    for qt in &q_tokens {
        for ct in &cand_tokens {
            if ct == qt {
                score += 10.0;
                break;
            } else if ct.starts_with(qt) {
                score += 5.0;
                break;
            } else if char_similarity(ct, qt) >= fuzzy_threshold {
                score += 3.0;
                break;
            }
        }
    }

    // Length tiebreak: shorter titles are more likely the intended match
    score - cand.chars().count() as f64 * 0.01
}

/// Stable sort of `(item, title)` pairs by relevance to `query`, descending.
/// Ties keep their original discovery order.
pub fn rank_by_relevance<T>(items: Vec<T>, query: &str, fuzzy_threshold: f64, title_of: impl Fn(&T) -> &str) -> Vec<T> {
    let mut scored: Vec<(f64, T)> = items
        .into_iter()
        .map(|item| (relevance_score(title_of(&item), query, fuzzy_threshold), item))
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().map(|(_, item)| item).collect()
}
