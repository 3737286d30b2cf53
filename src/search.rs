//! # Search Orchestrator Module
//!
//! ## Purpose
//! Answers one user query against one wiki site by combining the category
//! crawler, the candidate filter, the relevance ranker, and the plain and
//! targeted fulltext search paths; also answers image queries through the
//! prefix file listing with a fulltext fallback.
//!
//! ## Input/Output Specification
//! - **Input**: Query text, optional category filter, pagination cursor for
//!   images
//! - **Output**: Sorted, capped [`SearchResult`] lists and ranked
//!   [`ImageSearchPage`]s
//! - **States**: no category filter -> plain API search; category filter ->
//!   crawl -> filter -> (candidate count above the threshold) -> targeted
//!   fulltext search restricted to the candidate titles -> rank; every
//!   branch terminates in a sorted, capped result list
//!
//! ## Key Features
//! - Injected cache object (get/put/clear) instead of process-wide state
//! - Transport failures recover as empty results; API-reported errors are
//!   surfaced to the caller as the request itself was invalid
//! - Stable ranking: ties keep their discovery order

use crate::cache::{cache_key, SearchCaches};
use crate::client::{ApiSearchHit, WikiClient};
use crate::config::Config;
use crate::crawler::CategoryCrawler;
use crate::errors::{recover_transient, Result, WikiError};
use crate::filter::CandidateFilter;
use crate::images::normalize_filename;
use crate::ranking::rank_by_relevance;
use crate::utils::collapse_whitespace;
use crate::{CategoryMember, ImageCandidate, ImageSearchPage, SearchResult, WikiSite};
use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

/// Orchestrates search against one wiki site
pub struct SearchOrchestrator {
    client: Arc<WikiClient>,
    crawler: CategoryCrawler,
    filter: CandidateFilter,
    config: Config,
    caches: Arc<SearchCaches>,
}

impl SearchOrchestrator {
    /// Build an orchestrator for one site with an injected cache set.
    pub fn new(site: WikiSite, config: &Config, caches: Arc<SearchCaches>) -> Result<Self> {
        let client = Arc::new(WikiClient::new(site, &config.http)?);
        let crawler = CategoryCrawler::new(Arc::clone(&client), config.crawler.clone());
        let filter = CandidateFilter::new(config.search.fuzzy_threshold);
        Ok(Self {
            client,
            crawler,
            filter,
            config: config.clone(),
            caches,
        })
    }

    /// The client this orchestrator issues requests through
    pub fn client(&self) -> &Arc<WikiClient> {
        &self.client
    }

    /// Search pages, optionally restricted to a category's members.
    pub async fn search_pages(&self, query: &str, category: Option<&str>) -> Result<Vec<SearchResult>> {
        self.validate_query(query)?;

        let kind = match category {
            Some(name) => format!("pages:{}", name),
            None => "pages".to_string(),
        };
        let key = cache_key(self.client.site().id, &kind, query);
        if let Some(cached) = self.caches.pages.get(&key).await {
            tracing::debug!("cache hit for '{}'", key);
            return Ok(cached);
        }

        let results = match category {
            None => self.plain_search(query).await?,
            Some(category) => self.category_search(query, category).await?,
        };

        self.caches.pages.put(key, results.clone()).await;
        Ok(results)
    }

    /// Plain fulltext search against the site's search namespaces.
    async fn plain_search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let site = self.client.site();
        let hits = recover_transient(
            self.client
                .search(query, &site.search_namespaces, self.config.search.max_results)
                .await,
            "fulltext search",
        )?;

        let results: Vec<SearchResult> = hits.into_iter().map(|hit| self.to_result(hit)).collect();
        Ok(self.rank_and_cap(results, query))
    }

    /// Crawl a category, filter the member list, and either rank directly
    /// or escalate to a targeted fulltext search when too many candidates
    /// survive filtering.
    async fn category_search(&self, query: &str, category: &str) -> Result<Vec<SearchResult>> {
        let members = self.crawler.crawl(category, true).await?;
        let matched = self.filter.filter(&members, query);
        tracing::info!(
            "category '{}': {} members, {} match '{}'",
            category,
            members.len(),
            matched.len(),
            query
        );

        let results = if matched.len() > self.config.search.fallback_threshold {
            self.targeted_search(query, &matched).await?
        } else {
            matched
                .into_iter()
                .map(|member| SearchResult {
                    url: self.client.site().page_url(&member.title),
                    title: member.title,
                    snippet: String::new(),
                    namespace: Some(member.namespace),
                })
                .collect()
        };

        Ok(self.rank_and_cap(results, query))
    }

    /// Run a real fulltext search and keep only hits belonging to the known
    /// candidate set.
    async fn targeted_search(&self, query: &str, candidates: &[CategoryMember]) -> Result<Vec<SearchResult>> {
        let site = self.client.site();
        let limit = self.config.search.max_results.max(candidates.len().min(500));
        let hits = recover_transient(
            self.client.search(query, &site.search_namespaces, limit).await,
            "targeted fulltext search",
        )?;

        let titles: HashSet<&str> = candidates.iter().map(|member| member.title.as_str()).collect();
        Ok(hits
            .into_iter()
            .filter(|hit| titles.contains(hit.title.as_str()))
            .map(|hit| self.to_result(hit))
            .collect())
    }

    /// Search image files: prefix listing first, fulltext fallback when the
    /// listing comes up short, then rank, dedupe and paginate.
    pub async fn search_images(&self, query: &str, limit: Option<usize>, cursor: Option<&str>) -> Result<ImageSearchPage> {
        self.validate_query(query)?;
        let limit = limit.unwrap_or(self.config.images.default_limit).max(1);
        let offset = parse_cursor(query, cursor)?;

        let key = cache_key(self.client.site().id, "images", query);
        let ranked = match self.caches.images.get(&key).await {
            Some(page) => page.results,
            None => {
                let ranked = self.collect_ranked_images(query).await?;
                let full = ImageSearchPage {
                    results: ranked.clone(),
                    next_cursor: None,
                    has_more: false,
                };
                self.caches.images.put(key, full).await;
                ranked
            }
        };

        let slice: Vec<ImageCandidate> = ranked.iter().skip(offset).take(limit).cloned().collect();
        let consumed = offset + slice.len();
        let has_more = consumed < ranked.len();
        Ok(ImageSearchPage {
            results: slice,
            next_cursor: has_more.then(|| consumed.to_string()),
            has_more,
        })
    }

    /// Gather candidates from the prefix listing plus the fulltext
    /// fallback, rank them, and dedupe by name (first after ranking wins).
    async fn collect_ranked_images(&self, query: &str) -> Result<Vec<ImageCandidate>> {
        let mut candidates = self.prefix_image_listing(query).await?;

        if candidates.len() < self.config.images.default_limit {
            let fallback = self.fulltext_image_search(query).await?;
            candidates.extend(fallback);
        }

        // Rank on the filename stem so the extension does not mask an
        // exact match against the query.
        let ranked = rank_by_relevance(
            candidates,
            query,
            self.config.search.fuzzy_threshold,
            |candidate| {
                candidate
                    .name
                    .rsplit_once('.')
                    .map(|(stem, _extension)| stem)
                    .unwrap_or(&candidate.name)
            },
        );

        let mut seen = HashSet::new();
        Ok(ranked
            .into_iter()
            .filter(|candidate| seen.insert(candidate.name.clone()))
            .collect())
    }

    /// Paginated `allimages` prefix listing.
    async fn prefix_image_listing(&self, query: &str) -> Result<Vec<ImageCandidate>> {
        let prefix = capitalize_first(query.trim());
        let mut candidates = Vec::new();
        let mut token: Option<String> = None;

        for _page in 0..self.config.images.max_list_pages {
            let (rows, next) = recover_transient(
                self.client
                    .all_images(&prefix, self.config.images.prefix_page_size, token.as_deref())
                    .await,
                "allimages listing",
            )?;

            candidates.extend(rows.into_iter().map(|row| ImageCandidate {
                name: format!("File:{}", row.name),
                url: row.url,
                description: String::new(),
            }));

            match next {
                Some(next_token) => token = Some(next_token),
                None => break,
            }
        }

        Ok(candidates)
    }

    /// Fulltext search restricted to the file namespace; hits are resolved
    /// to URLs individually, bounded by the configured limit.
    async fn fulltext_image_search(&self, query: &str) -> Result<Vec<ImageCandidate>> {
        let limit = self.config.images.default_limit * 2;
        let hits = recover_transient(
            self.client.search(query, &[6], limit).await,
            "file fulltext search",
        )?;

        let mut candidates = Vec::new();
        for hit in hits {
            if normalize_filename(&hit.title).is_none() {
                continue;
            }
            let url = recover_transient(self.client.file_url(&hit.title).await, "file url lookup")?;
            if let Some(url) = url {
                candidates.push(ImageCandidate {
                    name: ensure_file_prefix(&hit.title),
                    url,
                    description: strip_snippet_markup(&hit.snippet),
                });
            }
        }
        Ok(candidates)
    }

    fn to_result(&self, hit: ApiSearchHit) -> SearchResult {
        SearchResult {
            url: self.client.site().page_url(&hit.title),
            snippet: strip_snippet_markup(&hit.snippet),
            title: hit.title,
            namespace: Some(hit.ns),
        }
    }

    fn rank_and_cap(&self, results: Vec<SearchResult>, query: &str) -> Vec<SearchResult> {
        let mut ranked = rank_by_relevance(
            results,
            query,
            self.config.search.fuzzy_threshold,
            |result| result.title.as_str(),
        );
        ranked.truncate(self.config.search.max_results);
        ranked
    }

    fn validate_query(&self, query: &str) -> Result<()> {
        let trimmed = query.trim();
        if trimmed.len() < self.config.search.min_query_length {
            return Err(WikiError::InvalidQuery {
                query: query.to_string(),
                reason: format!("shorter than {} characters", self.config.search.min_query_length),
            });
        }
        if trimmed.len() > self.config.search.max_query_length {
            return Err(WikiError::InvalidQuery {
                query: query.to_string(),
                reason: format!("longer than {} characters", self.config.search.max_query_length),
            });
        }
        Ok(())
    }
}

fn parse_cursor(query: &str, cursor: Option<&str>) -> Result<usize> {
    match cursor {
        None => Ok(0),
        Some(raw) => raw.parse().map_err(|_| WikiError::InvalidQuery {
            query: query.to_string(),
            reason: format!("invalid pagination cursor '{}'", raw),
        }),
    }
}

fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn ensure_file_prefix(title: &str) -> String {
    if title.to_lowercase().starts_with("file:") {
        title.to_string()
    } else {
        format!("File:{}", title)
    }
}

/// Strip the `searchmatch` spans and any other tags from an API snippet.
fn strip_snippet_markup(snippet: &str) -> String {
    static TAG: OnceLock<Regex> = OnceLock::new();
    let tag = TAG.get_or_init(|| Regex::new(r"<[^>]+>").expect("static tag pattern"));
    collapse_whitespace(&tag.replace_all(snippet, "")).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SiteRegistry, WikiSiteId};
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("wiki_infobox_search=debug")
            .try_init();
    }

    fn orchestrator_for(server: &MockServer, config: Config) -> SearchOrchestrator {
        init_tracing();
        let mut site = SiteRegistry::builtin().get(WikiSiteId::IiWiki).unwrap().clone();
        site.base_url = server.uri();
        site.api_path = "/api.php".to_string();
        let caches = Arc::new(SearchCaches::new(&config.cache));
        SearchOrchestrator::new(site, &config, caches).unwrap()
    }

    fn search_body(titles: &[&str]) -> serde_json::Value {
        let hits: Vec<_> = titles
            .iter()
            .map(|title| {
                serde_json::json!({
                    "title": title,
                    "snippet": format!("about <span class=\"searchmatch\">{}</span>", title),
                    "ns": 0
                })
            })
            .collect();
        serde_json::json!({ "query": { "search": hits } })
    }

    fn members_body(titles: &[&str]) -> serde_json::Value {
        let rows: Vec<_> = titles
            .iter()
            .map(|title| serde_json::json!({ "title": title, "ns": 0 }))
            .collect();
        serde_json::json!({ "query": { "categorymembers": rows } })
    }

    #[tokio::test]
    async fn plain_search_ranks_and_derives_urls() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("list", "search"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(search_body(&["History of Nordania", "Nordania"])),
            )
            .mount(&server)
            .await;

        let orchestrator = orchestrator_for(&server, Config::default());
        let results = orchestrator.search_pages("nordania", None).await.unwrap();

        assert_eq!(results[0].title, "Nordania");
        assert!(results[0].url.ends_with("/wiki/Nordania"));
        assert_eq!(results[0].snippet, "about Nordania");
    }

    #[tokio::test]
    async fn short_query_rejected_without_network() {
        let server = MockServer::start().await;
        let orchestrator = orchestrator_for(&server, Config::default());
        let err = orchestrator.search_pages("x", None).await.unwrap_err();
        assert!(matches!(err, WikiError::InvalidQuery { .. }));
    }

    #[tokio::test]
    async fn category_search_filters_without_fallback_below_threshold() {
        let server = MockServer::start().await;

        let mut member_titles: Vec<String> =
            (0..195).map(|index| format!("Zone {:03}", index)).collect();
        for name in ["Nordania", "Nordania City", "Greater Nordania", "History of Nordania", "Nordanian Empire"] {
            member_titles.push(name.to_string());
        }
        let refs: Vec<&str> = member_titles.iter().map(String::as_str).collect();

        // Category member crawl (pages, then the subcategory listing which
        // returns nothing).
        Mock::given(method("GET"))
            .and(query_param("list", "categorymembers"))
            .and(query_param("cmnamespace", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(members_body(&refs)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("cmnamespace", "14"))
            .respond_with(ResponseTemplate::new(200).set_body_json(members_body(&[])))
            .mount(&server)
            .await;
        // The srsearch fallback must NOT run: 5 candidates < threshold.
        Mock::given(method("GET"))
            .and(query_param("list", "search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_body(&[])))
            .expect(0)
            .mount(&server)
            .await;

        let orchestrator = orchestrator_for(&server, Config::default());
        let results = orchestrator
            .search_pages("nordania", Some("Nations"))
            .await
            .unwrap();

        assert_eq!(results.len(), 5);
        assert_eq!(results[0].title, "Nordania");
        server.verify().await;
    }

    #[tokio::test]
    async fn category_search_escalates_above_threshold() {
        let server = MockServer::start().await;

        // Every member matches the query, far beyond the threshold.
        let member_titles: Vec<String> =
            (0..60).map(|index| format!("Nordania Province {}", index)).collect();
        let refs: Vec<&str> = member_titles.iter().map(String::as_str).collect();

        Mock::given(method("GET"))
            .and(query_param("cmnamespace", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(members_body(&refs)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("cmnamespace", "14"))
            .respond_with(ResponseTemplate::new(200).set_body_json(members_body(&[])))
            .mount(&server)
            .await;
        // Targeted fulltext search returns a mix; only known candidates
        // survive the intersection.
        Mock::given(method("GET"))
            .and(query_param("list", "search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_body(&[
                "Nordania Province 3",
                "Unrelated Page",
                "Nordania Province 7",
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let orchestrator = orchestrator_for(&server, Config::default());
        let results = orchestrator
            .search_pages("nordania", Some("Nations"))
            .await
            .unwrap();

        let titles: Vec<&str> = results.iter().map(|result| result.title.as_str()).collect();
        assert!(titles.contains(&"Nordania Province 3"));
        assert!(titles.contains(&"Nordania Province 7"));
        assert!(!titles.contains(&"Unrelated Page"));
        server.verify().await;
    }

    #[tokio::test]
    async fn image_search_ranks_dedupes_and_paginates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("list", "allimages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "query": { "allimages": [
                    { "name": "Nordania location map.png", "url": "https://img.example/map.png" },
                    { "name": "Nordania.svg", "url": "https://img.example/n.svg" },
                    { "name": "Nordania.svg", "url": "https://img.example/duplicate.svg" },
                    { "name": "Nordania census chart.png", "url": "https://img.example/chart.png" }
                ]}
            })))
            .mount(&server)
            .await;

        let mut config = Config::default();
        config.images.default_limit = 2;
        let orchestrator = orchestrator_for(&server, config);

        let first = orchestrator.search_images("nordania", Some(2), None).await.unwrap();
        assert_eq!(first.results.len(), 2);
        assert_eq!(first.results[0].name, "File:Nordania.svg");
        assert_eq!(first.results[0].url, "https://img.example/n.svg");
        assert!(first.has_more);

        let cursor = first.next_cursor.clone().unwrap();
        let second = orchestrator
            .search_images("nordania", Some(2), Some(&cursor))
            .await
            .unwrap();
        assert_eq!(second.results.len(), 1);
        assert!(!second.has_more);
        assert!(second.next_cursor.is_none());
    }

    #[tokio::test]
    async fn results_are_cached_per_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("list", "search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_body(&["Nordania"])))
            .expect(1)
            .mount(&server)
            .await;

        let orchestrator = orchestrator_for(&server, Config::default());
        let first = orchestrator.search_pages("nordania", None).await.unwrap();
        let second = orchestrator.search_pages("nordania", None).await.unwrap();
        assert_eq!(first, second);
        server.verify().await;
    }

    #[tokio::test]
    async fn api_error_propagates_from_orchestrator() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": { "code": "srsearch-missing", "info": "missing parameter" }
            })))
            .mount(&server)
            .await;

        let orchestrator = orchestrator_for(&server, Config::default());
        let err = orchestrator.search_pages("nordania", None).await.unwrap_err();
        assert!(matches!(err, WikiError::Api { .. }));
    }
}
