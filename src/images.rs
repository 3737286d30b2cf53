//! # Image/File Resolution Module
//!
//! ## Purpose
//! Maps candidate filenames to hosted URLs via the remote file-info API,
//! with an ordered list of naming-convention fallbacks for the flag and
//! coat-of-arms lookups where contributors never agree on one convention.
//!
//! ## Input/Output Specification
//! - **Input**: Candidate filename (with or without `File:`/`Image:`
//!   prefix), or a country name for convention-based guessing
//! - **Output**: A resolvable URL, or `None`
//! - **Network discipline**: A value without a recognized image extension
//!   returns `None` immediately with no network call; single lookups do not
//!   retry (retry/backoff belongs to the batch layer)
//!
//! ## Key Features
//! - Extension gate before any request is issued
//! - Ordered fallback guesses (`Flag_of_<Name>.svg`, `<Name>_flag.png`,
//!   underscore and title-case variants) used only when no richer source
//!   (an infobox field) produced a name
//! - Batch resolution in fixed-size concurrent chunks with an inter-batch
//!   delay and bounded retry passes using linearly increasing backoff

use crate::client::WikiClient;
use crate::config::ImageConfig;
use crate::errors::{recover_transient, Result};
use crate::utils::{strip_prefix_ci, title_case};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

/// Recognized image file extensions; anything else is rejected before any
/// network call.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "svg", "webp"];

/// Which well-known image an orchestrator is looking for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Flag,
    CoatOfArms,
}

/// Resolves filenames to hosted URLs against one wiki site
pub struct ImageResolver {
    client: Arc<WikiClient>,
    config: ImageConfig,
}

/// Strip a `File:`/`Image:` prefix and validate the extension. Returns the
/// bare filename, or `None` for values that cannot be image files.
pub fn normalize_filename(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let bare = strip_prefix_ci(trimmed, "file:")
        .or_else(|| strip_prefix_ci(trimmed, "image:"))
        .unwrap_or(trimmed)
        .trim();

    if bare.is_empty() {
        return None;
    }

    let extension = bare.rsplit('.').next()?.to_lowercase();
    if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        Some(bare.to_string())
    } else {
        None
    }
}

/// Ordered naming-convention guesses for a country's flag or coat of arms.
pub fn fallback_candidates(country_name: &str, kind: ImageKind) -> Vec<String> {
    let name = country_name.trim();
    let cased = title_case(name);
    let underscored = cased.replace(' ', "_");

    match kind {
        ImageKind::Flag => vec![
            format!("Flag_of_{}.svg", underscored),
            format!("Flag of {}.svg", cased),
            format!("Flag_of_{}.png", underscored),
            format!("{}_flag.png", underscored),
            format!("{} flag.png", cased),
            format!("{}_flag.svg", underscored),
        ],
        ImageKind::CoatOfArms => vec![
            format!("Coat_of_arms_of_{}.svg", underscored),
            format!("Coat of arms of {}.svg", cased),
            format!("Coat_of_arms_of_{}.png", underscored),
            format!("{}_coat_of_arms.png", underscored),
            format!("{} CoA.png", cased),
        ],
    }
}

impl ImageResolver {
    pub fn new(client: Arc<WikiClient>, config: ImageConfig) -> Self {
        Self { client, config }
    }

    /// Resolve one filename to a URL. Transport failures recover as `None`.
    pub async fn resolve(&self, filename: &str) -> Result<Option<String>> {
        recover_transient(self.try_resolve(filename).await, "file resolution")
    }

    /// Resolve one filename, letting transient errors propagate so the
    /// batch layer can schedule a retry.
    async fn try_resolve(&self, filename: &str) -> Result<Option<String>> {
        let Some(name) = normalize_filename(filename) else {
            tracing::debug!("'{}' has no image extension, skipping lookup", filename);
            return Ok(None);
        };
        self.client.file_url(&name).await
    }

    /// Try the ordered naming-convention guesses until one resolves. Used
    /// only when no infobox field produced a filename.
    pub async fn resolve_with_fallbacks(&self, country_name: &str, kind: ImageKind) -> Result<Option<String>> {
        for candidate in fallback_candidates(country_name, kind) {
            if let Some(url) = self.resolve(&candidate).await? {
                tracing::debug!("fallback '{}' resolved for {}", candidate, country_name);
                return Ok(Some(url));
            }
        }
        Ok(None)
    }

    /// Resolve many filenames: fixed-size concurrent batches with an
    /// inter-batch delay, then bounded retry passes over the failures with
    /// linearly increasing backoff. Items that still fail after the final
    /// pass map to `None` permanently.
    pub async fn resolve_batch(&self, filenames: &[String]) -> HashMap<String, Option<String>> {
        let mut resolved: HashMap<String, Option<String>> = HashMap::new();
        let mut pending: Vec<String> = Vec::new();
        for name in filenames {
            if !resolved.contains_key(name) && !pending.contains(name) {
                pending.push(name.clone());
            }
        }

        for attempt in 0..=self.config.retry_passes {
            if pending.is_empty() {
                break;
            }
            if attempt > 0 {
                let backoff = self.config.retry_delay_ms * u64::from(attempt);
                tracing::info!(
                    "retry pass {} for {} unresolved files ({}ms backoff)",
                    attempt,
                    pending.len(),
                    backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            let mut failed = Vec::new();
            for chunk in pending.chunks(self.config.batch_size) {
                let lookups = join_all(chunk.iter().map(|name| self.try_resolve(name))).await;
                for (name, outcome) in chunk.iter().zip(lookups) {
                    match outcome {
                        Ok(url) => {
                            resolved.insert(name.clone(), url);
                        }
                        Err(err) => {
                            tracing::warn!("resolving '{}' failed: {}", name, err);
                            failed.push(name.clone());
                        }
                    }
                }
                sleep(Duration::from_millis(self.config.batch_delay_ms)).await;
            }
            pending = failed;
        }

        for name in pending {
            resolved.insert(name, None);
        }
        resolved
    }
}
