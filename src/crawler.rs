//! # Category Crawler Module
//!
//! ## Purpose
//! Walks a named category via paginated continuation tokens and returns the
//! flattened member list, optionally including one level of direct
//! subcategories.
//!
//! ## Input/Output Specification
//! - **Input**: Category title, subcategory toggle
//! - **Output**: Flattened [`CategoryMember`] list in API pagination order
//! - **Bounds**: Fixed page size, hard pagination ceiling, bounded
//!   subcategory count
//!
//! ## Key Features
//! - Continuation-token pagination that stops on a missing token or the
//!   hard ceiling (protection against a misbehaving or adversarial API)
//! - Sequential subcategory crawls with a politeness delay between them,
//!   deliberately trading latency for predictable load on the remote wiki
//! - Transport failures on any one page recover as an empty page instead of
//!   aborting the crawl

use crate::client::WikiClient;
use crate::config::CrawlerConfig;
use crate::errors::{recover_transient, Result};
use crate::CategoryMember;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

/// Namespace number for category pages
const CATEGORY_NAMESPACE: i64 = 14;

/// Crawls category members for one wiki site
pub struct CategoryCrawler {
    client: Arc<WikiClient>,
    config: CrawlerConfig,
}

impl CategoryCrawler {
    pub fn new(client: Arc<WikiClient>, config: CrawlerConfig) -> Self {
        Self { client, config }
    }

    /// Crawl a category, optionally including members of its direct
    /// subcategories (one level deep, bounded count).
    pub async fn crawl(&self, category: &str, include_subcategories: bool) -> Result<Vec<CategoryMember>> {
        let mut members = self.crawl_pages(category, false).await?;
        tracing::info!("category '{}': {} direct members", category, members.len());

        if include_subcategories {
            let subcategories = self.list_subcategories(category).await?;
            for subcategory in &subcategories {
                sleep(Duration::from_millis(self.config.subcategory_delay_ms)).await;
                let tagged = self.crawl_pages(&subcategory.title, true).await?;
                tracing::debug!("subcategory '{}': {} members", subcategory.title, tagged.len());
                members.extend(tagged);
            }
        }

        Ok(members)
    }

    /// Crawl all pagination pages of one category's page members.
    async fn crawl_pages(&self, category: &str, from_subcategory: bool) -> Result<Vec<CategoryMember>> {
        let namespaces = self.client.site().search_namespaces.clone();
        let mut members = Vec::new();
        let mut token: Option<String> = None;

        for _page in 0..self.config.max_pages {
            let (rows, next) = recover_transient(
                self.client
                    .category_members(category, &namespaces, self.config.page_size, token.as_deref())
                    .await,
                "category member page",
            )?;

            members.extend(rows.into_iter().map(|row| CategoryMember {
                title: row.title,
                namespace: row.ns,
                from_subcategory,
            }));

            match next {
                Some(next_token) => token = Some(next_token),
                None => break,
            }
        }

        Ok(members)
    }

    /// List direct subcategories, bounded to the configured maximum.
    async fn list_subcategories(&self, category: &str) -> Result<Vec<CategoryMember>> {
        let (rows, _token) = recover_transient(
            self.client
                .category_members(category, &[CATEGORY_NAMESPACE], self.config.page_size, None)
                .await,
            "subcategory listing",
        )?;

        Ok(rows
            .into_iter()
            .take(self.config.max_subcategories)
            .map(|row| CategoryMember {
                title: row.title,
                namespace: row.ns,
                from_subcategory: false,
            })
            .collect())
    }
}
