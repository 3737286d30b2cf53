//! # Candidate Filter Module
//!
//! ## Purpose
//! Narrows a large crawled member list down to the titles that plausibly
//! match a query, using several matching strategies of decreasing
//! strictness. The orchestrator escalates to a targeted fulltext search
//! when the surviving candidate set is still too large.
//!
//! ## Input/Output Specification
//! - **Input**: Crawled [`CategoryMember`] list + query
//! - **Output**: Matching members in discovery order
//! - **Strategies**: exact, substring, word-order-independent token cover,
//!   partial-word prefixes, initials/acronym, fuzzy character similarity

use crate::ranking::{char_similarity, normalize_title};
use crate::CategoryMember;

/// Multi-strategy title matcher
#[derive(Debug, Clone)]
pub struct CandidateFilter {
    fuzzy_threshold: f64,
}

impl CandidateFilter {
    pub fn new(fuzzy_threshold: f64) -> Self {
        Self { fuzzy_threshold }
    }

    /// Keep the members whose titles match the query under any strategy,
    /// preserving discovery order.
    pub fn filter(&self, members: &[CategoryMember], query: &str) -> Vec<CategoryMember> {
        members
            .iter()
            .filter(|member| self.matches(&member.title, query))
            .cloned()
            .collect()
    }

    /// Check one title against the query with every strategy.
    pub fn matches(&self, title: &str, query: &str) -> bool {
        let t = normalize_title(title);
        let q = normalize_title(query);
        if t.is_empty() || q.is_empty() {
            return false;
        }

        // Exact and substring (either direction)
        if t == q || t.contains(&q) || q.contains(&t) {
            return true;
        }

        let t_tokens: Vec<&str> = t.split(' ').collect();
        let q_tokens: Vec<&str> = q.split(' ').collect();

        // Word-order-independent: every query token appears as a title token
        if q_tokens.iter().all(|qt| t_tokens.contains(qt)) {
            return true;
        }

        // Partial-word: every query token is a prefix of some title token
        if q_tokens
            .iter()
            .all(|qt| t_tokens.iter().any(|tt| tt.starts_with(qt)))
        {
            return true;
        }

        // Initials/acronym: "upr" matches "United Provinces of Rhodinia"
        if matches_initials(&t_tokens, &q) {
            return true;
        }

        // Fuzzy: whole-string similarity, or every query token fuzzy-matching
        // some title token
        if char_similarity(&t, &q) >= self.fuzzy_threshold {
            return true;
        }
        q_tokens.iter().all(|qt| {
            t_tokens
                .iter()
                .any(|tt| char_similarity(tt, qt) >= self.fuzzy_threshold)
        })
    }
}

fn matches_initials(title_tokens: &[&str], query: &str) -> bool {
    if title_tokens.len() < 2 {
        return false;
    }
    // Filler words do not contribute initials: "United Provinces of
    // Rhodinia" answers to "UPR".
    let acronym: String = title_tokens
        .iter()
        .filter(|token| !matches!(**token, "of" | "the" | "and"))
        .filter_map(|token| token.chars().next())
        .collect();
    let compact: String = query.chars().filter(|c| c.is_alphanumeric()).collect();
    compact.len() >= 2 && acronym == compact
}
