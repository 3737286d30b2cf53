//! # Configuration Management Module
//!
//! ## Purpose
//! Centralized configuration for the wiki extraction engine: the table of
//! configured wiki backends plus the tuning knobs for crawling, ranking,
//! image batching, caching, and the HTTP client.
//!
//! ## Input/Output Specification
//! - **Input**: Optional TOML configuration file, built-in defaults
//! - **Output**: Validated configuration structs
//! - **Validation**: Range checks with detailed error messages
//!
//! ## Key Features
//! - Built-in site table for the supported wiki backends, immutable after load
//! - Defaults for every setting so a missing config file still works
//! - TOML override file for deployments that need different limits
//!
//! ## Usage
//! ```rust,no_run
//! use wiki_infobox_search::config::{Config, SiteRegistry, WikiSiteId};
//!
//! let config = Config::load().unwrap();
//! let sites = SiteRegistry::builtin();
//! let site = sites.get(WikiSiteId::IiWiki).unwrap();
//! println!("API endpoint: {}", site.api_url());
//! ```

use crate::errors::{Result, WikiError};
use crate::utils::encode_title;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Identifier for one of the configured wiki backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WikiSiteId {
    /// IIWiki, the largest fictional-nation wiki
    IiWiki,
    /// Constructed Worlds wiki
    ConWorlds,
    /// Alternative History wiki
    AltHistory,
}

impl WikiSiteId {
    /// All configured site identifiers
    pub fn all() -> &'static [WikiSiteId] {
        &[WikiSiteId::IiWiki, WikiSiteId::ConWorlds, WikiSiteId::AltHistory]
    }

    /// Stable string form used in cache keys and config files
    pub fn as_str(&self) -> &'static str {
        match self {
            WikiSiteId::IiWiki => "iiwiki",
            WikiSiteId::ConWorlds => "conworlds",
            WikiSiteId::AltHistory => "althistory",
        }
    }
}

impl fmt::Display for WikiSiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WikiSiteId {
    type Err = WikiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "iiwiki" => Ok(WikiSiteId::IiWiki),
            "conworlds" => Ok(WikiSiteId::ConWorlds),
            "althistory" => Ok(WikiSiteId::AltHistory),
            other => Err(WikiError::Config {
                message: format!("unknown wiki site id '{}'", other),
            }),
        }
    }
}

/// One configured wiki backend. Loaded once at startup, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikiSite {
    /// Site identifier
    pub id: WikiSiteId,
    /// Base URL without trailing slash, e.g. `https://iiwiki.us`
    pub base_url: String,
    /// Path of the MediaWiki API endpoint, e.g. `/mediawiki/api.php`
    pub api_path: String,
    /// Namespaces searched for page queries (0 = main)
    pub search_namespaces: Vec<i64>,
}

impl WikiSite {
    /// Full URL of the API endpoint
    pub fn api_url(&self) -> String {
        format!("{}{}", self.base_url, self.api_path)
    }

    /// Derive the canonical page URL for a title. Result URLs are always
    /// computed this way from title + site, never cached independently.
    pub fn page_url(&self, title: &str) -> String {
        format!("{}/wiki/{}", self.base_url, encode_title(title))
    }
}

/// The immutable table of configured wiki backends
#[derive(Debug, Clone)]
pub struct SiteRegistry {
    sites: Vec<WikiSite>,
}

impl SiteRegistry {
    /// The built-in site table
    pub fn builtin() -> Self {
        Self {
            sites: vec![
                WikiSite {
                    id: WikiSiteId::IiWiki,
                    base_url: "https://iiwiki.us".to_string(),
                    api_path: "/mediawiki/api.php".to_string(),
                    search_namespaces: vec![0],
                },
                WikiSite {
                    id: WikiSiteId::ConWorlds,
                    base_url: "https://wiki.conworlds.org".to_string(),
                    api_path: "/api.php".to_string(),
                    search_namespaces: vec![0],
                },
                WikiSite {
                    id: WikiSiteId::AltHistory,
                    base_url: "https://althistory.fandom.com".to_string(),
                    api_path: "/api.php".to_string(),
                    search_namespaces: vec![0],
                },
            ],
        }
    }

    /// Look up a site by id
    pub fn get(&self, id: WikiSiteId) -> Option<&WikiSite> {
        self.sites.iter().find(|site| site.id == id)
    }

    /// All configured sites
    pub fn sites(&self) -> &[WikiSite] {
        &self.sites
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP client settings
    pub http: HttpConfig,
    /// Category crawler settings
    pub crawler: CrawlerConfig,
    /// Search and ranking behavior
    pub search: SearchConfig,
    /// Image search and batch resolution
    pub images: ImageConfig,
    /// Result cache settings
    pub cache: CacheConfig,
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Identifying User-Agent sent with every request
    pub user_agent: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

/// Category crawler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Members requested per pagination page
    pub page_size: usize,
    /// Hard ceiling on pagination requests per category
    pub max_pages: usize,
    /// Maximum direct subcategories crawled
    pub max_subcategories: usize,
    /// Politeness delay between sequential subcategory crawls (ms)
    pub subcategory_delay_ms: u64,
}

/// Search and ranking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Maximum text results returned
    pub max_results: usize,
    /// Candidate count above which the targeted fulltext fallback runs
    pub fallback_threshold: usize,
    /// Character-similarity threshold for fuzzy token matches
    pub fuzzy_threshold: f64,
    /// Minimum query length
    pub min_query_length: usize,
    /// Maximum query length
    pub max_query_length: usize,
}

/// Image search and batch resolution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Default image results per page
    pub default_limit: usize,
    /// Files requested per `allimages` listing page
    pub prefix_page_size: usize,
    /// Hard ceiling on `allimages` pagination requests
    pub max_list_pages: usize,
    /// Concurrent requests per resolution batch
    pub batch_size: usize,
    /// Delay between batches (ms)
    pub batch_delay_ms: u64,
    /// Retry passes over failed batch items before giving up
    pub retry_passes: u32,
    /// Base retry delay (ms); actual delay is `retry_delay_ms * attempt`
    pub retry_delay_ms: u64,
}

/// Result cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable/disable the result cache
    pub enabled: bool,
    /// Entry time-to-live in seconds
    pub ttl_seconds: u64,
    /// Maximum entries per cache before eviction
    pub max_entries: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "wiki-infobox-search/0.1 (country stats aggregator)".to_string(),
            timeout_seconds: 15,
        }
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            page_size: 500,
            max_pages: 20,
            max_subcategories: 5,
            subcategory_delay_ms: 250,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: 30,
            fallback_threshold: 40,
            fuzzy_threshold: 0.72,
            min_query_length: 2,
            max_query_length: 256,
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            prefix_page_size: 50,
            max_list_pages: 4,
            batch_size: 4,
            batch_delay_ms: 200,
            retry_passes: 2,
            retry_delay_ms: 500,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: 300,
            max_entries: 256,
        }
    }
}

impl Config {
    /// Load from the default location, falling back to defaults
    pub fn load() -> Result<Self> {
        Self::from_file("wiki-search.toml")
    }

    /// Load configuration from a TOML file. A missing file is not an error.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("configuration file not found: {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| WikiError::Config {
            message: format!("failed to read config file {:?}: {}", path, e),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| WikiError::Config {
            message: format!("failed to parse config file {:?}: {}", path, e),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration ranges
    pub fn validate(&self) -> Result<()> {
        if self.crawler.page_size == 0 || self.crawler.page_size > 500 {
            return Err(WikiError::Config {
                message: format!("crawler.page_size must be 1..=500, got {}", self.crawler.page_size),
            });
        }
        if self.crawler.max_pages == 0 {
            return Err(WikiError::Config {
                message: "crawler.max_pages must be at least 1".to_string(),
            });
        }
        if self.images.batch_size == 0 {
            return Err(WikiError::Config {
                message: "images.batch_size must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.search.fuzzy_threshold) {
            return Err(WikiError::Config {
                message: format!(
                    "search.fuzzy_threshold must be within 0.0..=1.0, got {}",
                    self.search.fuzzy_threshold
                ),
            });
        }
        if self.search.min_query_length > self.search.max_query_length {
            return Err(WikiError::Config {
                message: "search.min_query_length exceeds max_query_length".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_has_all_sites() {
        let registry = SiteRegistry::builtin();
        for id in WikiSiteId::all() {
            assert!(registry.get(*id).is_some(), "missing site {}", id);
        }
    }

    #[test]
    fn page_url_derivation() {
        let site = SiteRegistry::builtin().get(WikiSiteId::IiWiki).unwrap().clone();
        assert_eq!(site.page_url("United Provinces"), "https://iiwiki.us/wiki/United_Provinces");
        assert_eq!(site.api_url(), "https://iiwiki.us/mediawiki/api.php");
    }

    #[test]
    fn defaults_validate() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn invalid_page_size_rejected() {
        let mut config = Config::default();
        config.crawler.page_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn toml_overrides_parse() {
        let config: Config = toml::from_str(
            r#"
            [search]
            max_results = 10

            [images]
            batch_size = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.search.max_results, 10);
        assert_eq!(config.images.batch_size, 2);
        assert_eq!(config.crawler.page_size, 500);
    }
}
