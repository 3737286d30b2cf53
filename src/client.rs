//! # Wiki API Client Module
//!
//! ## Purpose
//! Thin typed wrapper over one wiki backend's MediaWiki-shaped JSON API.
//! Every network call in the crate goes through this client.
//!
//! ## Input/Output Specification
//! - **Input**: Query strings, category titles, page/file titles,
//!   continuation tokens
//! - **Output**: Typed response rows plus continuation tokens
//! - **Failure modes**: transport errors, anti-bot challenge pages, and
//!   malformed shapes surface as transient [`WikiError`]s; API-reported
//!   errors (`error.code`/`error.info` in a 200 body) surface as fatal ones
//!
//! ## Key Features
//! - Identifying User-Agent and request timeout on every call
//! - HTML-where-JSON detection for anti-bot challenge pages
//! - One typed method per endpoint used by the pipeline

use crate::config::{HttpConfig, WikiSite};
use crate::errors::{Result, WikiError};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// HTTP client bound to one configured wiki backend
pub struct WikiClient {
    site: WikiSite,
    http: Client,
}

/// One hit from the fulltext search endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ApiSearchHit {
    pub title: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub ns: i64,
}

/// One row from the category members endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ApiCategoryMember {
    pub title: String,
    #[serde(default)]
    pub ns: i64,
}

/// One row from the allimages listing endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ApiImageRow {
    pub name: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct SearchQueryBody {
    #[serde(default)]
    search: Vec<ApiSearchHit>,
}

#[derive(Debug, Deserialize)]
struct CategoryQueryBody {
    #[serde(default)]
    categorymembers: Vec<ApiCategoryMember>,
}

#[derive(Debug, Deserialize)]
struct AllImagesQueryBody {
    #[serde(default)]
    allimages: Vec<ApiImageRow>,
}

#[derive(Debug, Deserialize)]
struct RevisionsQueryBody {
    #[serde(default)]
    pages: Vec<RevisionPage>,
}

#[derive(Debug, Deserialize)]
struct RevisionPage {
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    revisions: Vec<Revision>,
}

#[derive(Debug, Deserialize)]
struct Revision {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileInfoQueryBody {
    #[serde(default)]
    pages: std::collections::HashMap<String, FileInfoPage>,
}

#[derive(Debug, Deserialize)]
struct FileInfoPage {
    #[serde(default)]
    missing: Option<Value>,
    #[serde(default)]
    imageinfo: Vec<ImageInfoRow>,
}

#[derive(Debug, Deserialize)]
struct ImageInfoRow {
    url: String,
}

impl WikiClient {
    /// Build a client for one site
    pub fn new(site: WikiSite, config: &HttpConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| WikiError::Network {
                details: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self { site, http })
    }

    /// The site this client talks to
    pub fn site(&self) -> &WikiSite {
        &self.site
    }

    /// Issue one API GET with `format=json` and shared error handling.
    async fn api_get(&self, params: &[(&str, &str)]) -> Result<Value> {
        let mut query: Vec<(&str, &str)> = vec![("format", "json")];
        query.extend_from_slice(params);

        let url = self.site.api_url();
        tracing::debug!("GET {} {:?}", url, params);

        let response = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| WikiError::Network {
                details: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(WikiError::Network {
                details: format!("HTTP {} from {}", response.status(), self.site.id),
            });
        }

        let body = response.text().await.map_err(|e| WikiError::Network {
            details: e.to_string(),
        })?;

        // Anti-bot challenges come back as HTML with a 200 status
        let trimmed = body.trim_start();
        if trimmed.starts_with('<') {
            tracing::warn!("{} returned HTML where JSON was expected", self.site.id);
            return Err(WikiError::BotChallenge);
        }

        let value: Value = serde_json::from_str(trimmed).map_err(|e| WikiError::ResponseShape {
            endpoint: url,
            details: e.to_string(),
        })?;

        if let Some(error) = value.get("error") {
            let code = error.get("code").and_then(Value::as_str).unwrap_or("unknown");
            let info = error.get("info").and_then(Value::as_str).unwrap_or("");
            return Err(WikiError::Api {
                code: code.to_string(),
                info: info.to_string(),
            });
        }

        Ok(value)
    }

    fn query_body<T: for<'de> Deserialize<'de>>(&self, value: &Value, endpoint: &str) -> Result<T> {
        let query = value.get("query").cloned().unwrap_or(Value::Null);
        if query.is_null() {
            return Err(WikiError::ResponseShape {
                endpoint: endpoint.to_string(),
                details: "missing 'query' object".to_string(),
            });
        }
        serde_json::from_value(query).map_err(|e| WikiError::ResponseShape {
            endpoint: endpoint.to_string(),
            details: e.to_string(),
        })
    }

    fn continue_token(value: &Value, key: &str) -> Option<String> {
        value
            .get("continue")
            .and_then(|c| c.get(key))
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Fulltext search with snippets, restricted to the given namespaces.
    pub async fn search(&self, query: &str, namespaces: &[i64], limit: usize) -> Result<Vec<ApiSearchHit>> {
        let ns = join_namespaces(namespaces);
        let limit = limit.to_string();
        let value = self
            .api_get(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", query),
                ("srprop", "snippet"),
                ("srnamespace", &ns),
                ("srlimit", &limit),
            ])
            .await?;

        let body: SearchQueryBody = self.query_body(&value, "search")?;
        Ok(body.search)
    }

    /// One page of category members. Returns rows plus the continuation
    /// token, if the API reports more pages.
    pub async fn category_members(
        &self,
        category: &str,
        namespaces: &[i64],
        limit: usize,
        cont: Option<&str>,
    ) -> Result<(Vec<ApiCategoryMember>, Option<String>)> {
        let title = if category.to_lowercase().starts_with("category:") {
            category.to_string()
        } else {
            format!("Category:{}", category)
        };
        let ns = join_namespaces(namespaces);
        let limit = limit.to_string();

        let mut params: Vec<(&str, &str)> = vec![
            ("action", "query"),
            ("list", "categorymembers"),
            ("cmtitle", &title),
            ("cmlimit", &limit),
            ("cmnamespace", &ns),
        ];
        if let Some(token) = cont {
            params.push(("cmcontinue", token));
        }

        let value = self.api_get(&params).await?;
        let body: CategoryQueryBody = self.query_body(&value, "categorymembers")?;
        let token = Self::continue_token(&value, "cmcontinue");
        Ok((body.categorymembers, token))
    }

    /// Fetch the raw wikitext of a page. A missing page or a page with no
    /// revisions yields `None`, which is a normal outcome, not a failure.
    pub async fn page_wikitext(&self, title: &str) -> Result<Option<String>> {
        let value = self
            .api_get(&[
                ("action", "query"),
                ("prop", "revisions"),
                ("rvprop", "content"),
                ("titles", title),
                ("formatversion", "2"),
            ])
            .await?;

        let body: RevisionsQueryBody = self.query_body(&value, "revisions")?;
        let Some(page) = body.pages.into_iter().next() else {
            return Ok(None);
        };
        if page.missing {
            return Ok(None);
        }
        Ok(page.revisions.into_iter().next().and_then(|rev| rev.content))
    }

    /// Resolve a `File:` title to its hosted URL via imageinfo.
    /// A missing file yields `None`.
    pub async fn file_url(&self, file_title: &str) -> Result<Option<String>> {
        let title = if file_title.to_lowercase().starts_with("file:") {
            file_title.to_string()
        } else {
            format!("File:{}", file_title)
        };

        let value = self
            .api_get(&[
                ("action", "query"),
                ("titles", &title),
                ("prop", "imageinfo"),
                ("iiprop", "url"),
            ])
            .await?;

        let body: FileInfoQueryBody = self.query_body(&value, "imageinfo")?;
        for (_id, page) in body.pages {
            if page.missing.is_some() {
                continue;
            }
            if let Some(info) = page.imageinfo.into_iter().next() {
                return Ok(Some(info.url));
            }
        }
        Ok(None)
    }

    /// One page of the file listing for a name prefix.
    pub async fn all_images(
        &self,
        prefix: &str,
        limit: usize,
        cont: Option<&str>,
    ) -> Result<(Vec<ApiImageRow>, Option<String>)> {
        let limit = limit.to_string();
        let mut params: Vec<(&str, &str)> = vec![
            ("action", "query"),
            ("list", "allimages"),
            ("aiprefix", prefix),
            ("aiprop", "url"),
            ("ailimit", &limit),
        ];
        if let Some(token) = cont {
            params.push(("aicontinue", token));
        }

        let value = self.api_get(&params).await?;
        let body: AllImagesQueryBody = self.query_body(&value, "allimages")?;
        let token = Self::continue_token(&value, "aicontinue");
        Ok((body.allimages, token))
    }
}

fn join_namespaces(namespaces: &[i64]) -> String {
    if namespaces.is_empty() {
        "0".to_string()
    } else {
        namespaces
            .iter()
            .map(|ns| ns.to_string())
            .collect::<Vec<_>>()
            .join("|")
    }
}
