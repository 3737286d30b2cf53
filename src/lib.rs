//! # Wiki Content Discovery & Infobox Extraction Engine
//!
//! ## Overview
//! This library turns community-authored wiki pages about fictional nations
//! into structured data for a stats application: it discovers matching pages
//! and files across several configured MediaWiki backends, ranks them by
//! relevance, and extracts a clean key/value record from each page's country
//! infobox, with inline markup rewritten into display-safe text.
//!
//! ## Architecture
//! The system is composed of several key modules:
//! - `config`: Site table and tuning knobs, loaded once at startup
//! - `client`: Typed reqwest wrapper over the MediaWiki JSON API
//! - `crawler`: Category member crawling with continuation-token pagination
//! - `filter`: Multi-strategy candidate matching for crawled member lists
//! - `ranking`: Relevance scoring and fuzzy character similarity
//! - `wikitext`: Template isolation, parameter parsing, value rewriting
//! - `images`: Filename-to-URL resolution with naming-convention fallbacks
//! - `infobox`: The page-to-country-record extraction pipeline
//! - `search`: Query orchestration across crawl, filter, rank and fallback
//! - `cache`: Injected TTL cache shared by orchestrator instances
//! - `errors`: Centralized error handling and recovery policy
//!
//! ## Input/Output Specification
//! - **Input**: User queries (text), page titles, optional category filters
//! - **Output**: Ranked search results, ranked image candidates, structured
//!   country records
//! - **Failure policy**: absence of data (empty lists, `None` fields) is
//!   always preferred over raising an error; only invalid requests throw
//!
//! ## Usage
//! ```rust,no_run
//! use wiki_infobox_search::{Config, SearchOrchestrator, SiteRegistry, WikiSiteId};
//! use wiki_infobox_search::cache::SearchCaches;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load()?;
//!     let site = SiteRegistry::builtin().get(WikiSiteId::IiWiki).unwrap().clone();
//!     let caches = Arc::new(SearchCaches::new(&config.cache));
//!     let orchestrator = SearchOrchestrator::new(site, &config, caches)?;
//!     let results = orchestrator.search_pages("nordania", Some("Nations")).await?;
//!     println!("Found {} results", results.len());
//!     Ok(())
//! }
//! ```

// Core modules
pub mod cache;
pub mod client;
pub mod config;
pub mod crawler;
pub mod errors;
pub mod filter;
pub mod images;
pub mod infobox;
pub mod ranking;
pub mod search;
pub mod wikitext;

// Utilities
pub mod utils;

// Re-exports for convenience
pub use config::{Config, SiteRegistry, WikiSite, WikiSiteId};
pub use errors::{Result, WikiError};
pub use infobox::{CountryInfobox, InfoboxExtractor, ParsedCountryData};
pub use search::SearchOrchestrator;

use serde::{Deserialize, Serialize};

/// One ranked text search result. The `url` is always derived from
/// `title` + site, never cached independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Page title
    pub title: String,
    /// Plain-text snippet of the match context (may be empty for
    /// category-derived results)
    pub snippet: String,
    /// Canonical page URL
    pub url: String,
    /// Namespace the page lives in, when the API reported one
    pub namespace: Option<i64>,
}

/// One member discovered during a category crawl. Transient: produced by
/// the crawler, discarded after filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryMember {
    /// Page title
    pub title: String,
    /// Namespace number
    pub namespace: i64,
    /// Whether the member came from a direct subcategory crawl
    pub from_subcategory: bool,
}

/// One ranked image/file candidate. Deduplicated by `name` after ranking;
/// the first-seen entry per name wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageCandidate {
    /// `File:`-prefixed name
    pub name: String,
    /// Hosted file URL
    pub url: String,
    /// Short description (snippet or empty)
    pub description: String,
}

/// One page of ranked image results with an opaque pagination cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSearchPage {
    /// Ranked, deduplicated candidates for this page
    pub results: Vec<ImageCandidate>,
    /// Cursor to pass back for the next page, if any
    pub next_cursor: Option<String>,
    /// Whether more results exist beyond this page
    pub has_more: bool,
}
