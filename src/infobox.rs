//! # Infobox Extraction Pipeline
//!
//! ## Purpose
//! Turns one wiki page into a structured country record: fetch the raw
//! wikitext, isolate the country infobox template, parse its parameters,
//! rewrite every value into display text, and resolve the flag and coat of
//! arms to hosted URLs.
//!
//! ## Input/Output Specification
//! - **Input**: Page title
//! - **Output**: [`CountryInfobox`] / [`ParsedCountryData`], or `None` when
//!   the page is missing or carries no recognizable infobox (a normal,
//!   expected outcome, not a failure)
//! - **Field mapping**: the source data has no fixed schema, so well-known
//!   attributes are looked up through a prioritized candidate-name list;
//!   the first non-empty (and for numerics, parseable) match wins
//!
//! ## Key Features
//! - Brace-depth template isolation tolerant of nested templates
//! - Dynamic field map plus derived summary struct
//! - Flag/coat resolution preferring infobox-supplied filenames, with
//!   naming-convention guesses only when the infobox offered none

use crate::client::WikiClient;
use crate::config::ImageConfig;
use crate::errors::{recover_transient, Result};
use crate::images::{ImageKind, ImageResolver};
use crate::wikitext::{isolate_template, template_parameters, ParameterMap, WikitextRewriter};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Template name variants contributors use for country infoboxes
const INFOBOX_TEMPLATES: &[&str] = &[
    "Infobox country",
    "Infobox nation",
    "Infobox former country",
    "Country infobox",
];

/// Candidate parameter names per logical attribute, in priority order
const NAME_FIELDS: &[&str] = &["conventional_long_name", "common_name", "name"];
const POPULATION_FIELDS: &[&str] = &[
    "population_estimate",
    "population_census",
    "population_total",
    "population",
];
const GDP_FIELDS: &[&str] = &["GDP_PPP", "GDP_nominal", "gdp_ppp", "gdp_nominal", "gdp"];
const GDP_PER_CAPITA_FIELDS: &[&str] = &[
    "GDP_PPP_per_capita",
    "GDP_nominal_per_capita",
    "gdp_ppp_per_capita",
    "gdp_nominal_per_capita",
    "gdp_per_capita",
];
const CAPITAL_FIELDS: &[&str] = &["capital", "capital_city", "largest_city"];
const AREA_FIELDS: &[&str] = &["area_km2", "area_total_km2", "area"];
const GOVERNMENT_FIELDS: &[&str] = &["government_type", "government"];
const CURRENCY_FIELDS: &[&str] = &["currency", "currency_code"];
const LANGUAGE_FIELDS: &[&str] = &[
    "official_languages",
    "national_languages",
    "languages",
    "official_language",
];
const FLAG_FIELDS: &[&str] = &["image_flag", "flag", "flag_image"];
const COAT_FIELDS: &[&str] = &["image_coat", "coat_of_arms", "image_coat_of_arms"];

/// One extracted infobox: the raw span, the raw parameter map, and the
/// rewritten display value per parameter. Immutable after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountryInfobox {
    /// Page title the infobox came from
    pub name: String,
    /// Exact `{{...}}` span from the page source
    pub raw_wikitext: String,
    /// Parameter name to raw value
    pub parsed_template_data: ParameterMap,
    /// Parameter name to rewritten display value
    pub fields: HashMap<String, String>,
}

/// Derived country summary consumed by the display layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedCountryData {
    pub name: String,
    pub population: Option<u64>,
    pub gdp: Option<f64>,
    pub gdp_per_capita: Option<f64>,
    pub capital: Option<String>,
    pub area_km2: Option<f64>,
    pub government: Option<String>,
    pub currency: Option<String>,
    pub languages: Option<String>,
    pub flag: Option<String>,
    pub coat_of_arms: Option<String>,
    pub flag_url: Option<String>,
    pub coat_of_arms_url: Option<String>,
    pub infobox: CountryInfobox,
}

/// Orchestrates template isolation, parameter parsing, value rewriting and
/// image resolution for one wiki site.
pub struct InfoboxExtractor {
    client: Arc<WikiClient>,
    resolver: ImageResolver,
    rewriter: WikitextRewriter,
}

impl InfoboxExtractor {
    pub fn new(client: Arc<WikiClient>, image_config: ImageConfig) -> Self {
        let rewriter = WikitextRewriter::new(client.site().clone());
        let resolver = ImageResolver::new(Arc::clone(&client), image_config);
        Self {
            client,
            resolver,
            rewriter,
        }
    }

    /// Extract the infobox of one page. `None` when the page is missing or
    /// has no recognizable country infobox.
    pub async fn extract(&self, title: &str) -> Result<Option<CountryInfobox>> {
        let raw = recover_transient(self.client.page_wikitext(title).await, "page content fetch")?;
        let Some(raw) = raw else {
            tracing::debug!("page '{}' missing or empty", title);
            return Ok(None);
        };

        let Some(span) = isolate_template(&raw, INFOBOX_TEMPLATES) else {
            tracing::debug!("page '{}' has no country infobox", title);
            return Ok(None);
        };
        let params = template_parameters(&raw, INFOBOX_TEMPLATES).unwrap_or_default();

        let mut fields = HashMap::with_capacity(params.len());
        for (name, value) in &params {
            fields.insert(name.clone(), self.rewriter.rewrite(value));
        }

        Ok(Some(CountryInfobox {
            name: title.to_string(),
            raw_wikitext: span.to_string(),
            parsed_template_data: params,
            fields,
        }))
    }

    /// Extract and derive the country summary, resolving flag and coat of
    /// arms URLs.
    pub async fn extract_parsed(&self, title: &str) -> Result<Option<ParsedCountryData>> {
        let Some(infobox) = self.extract(title).await? else {
            return Ok(None);
        };
        let mut data = ParsedCountryData::from_infobox(infobox);

        // An infobox-supplied filename is the richer source: when present,
        // a miss stays a miss. Convention guessing runs only without one.
        data.flag_url = match &data.flag {
            Some(file) => self.resolver.resolve(file).await?,
            None => {
                self.resolver
                    .resolve_with_fallbacks(&data.name, ImageKind::Flag)
                    .await?
            }
        };
        data.coat_of_arms_url = match &data.coat_of_arms {
            Some(file) => self.resolver.resolve(file).await?,
            None => {
                self.resolver
                    .resolve_with_fallbacks(&data.name, ImageKind::CoatOfArms)
                    .await?
            }
        };

        Ok(Some(data))
    }
}

impl ParsedCountryData {
    /// Derive the summary from an extracted infobox. Pure; URL resolution
    /// happens in the pipeline.
    pub fn from_infobox(infobox: CountryInfobox) -> Self {
        let display_name = first_field(&infobox.fields, NAME_FIELDS)
            .map(|name| strip_tags(&name))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| infobox.name.clone());

        Self {
            name: display_name,
            population: first_numeric(&infobox.fields, POPULATION_FIELDS).map(|n| n.round() as u64),
            gdp: first_numeric(&infobox.fields, GDP_FIELDS),
            gdp_per_capita: first_numeric(&infobox.fields, GDP_PER_CAPITA_FIELDS),
            capital: first_field(&infobox.fields, CAPITAL_FIELDS),
            area_km2: first_numeric(&infobox.fields, AREA_FIELDS),
            government: first_field(&infobox.fields, GOVERNMENT_FIELDS),
            currency: first_field(&infobox.fields, CURRENCY_FIELDS),
            languages: first_field(&infobox.fields, LANGUAGE_FIELDS),
            flag: first_field(&infobox.fields, FLAG_FIELDS),
            coat_of_arms: first_field(&infobox.fields, COAT_FIELDS),
            flag_url: None,
            coat_of_arms_url: None,
            infobox,
        }
    }
}

/// First non-empty candidate field.
fn first_field(fields: &HashMap<String, String>, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .filter_map(|name| fields.get(*name))
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// First candidate field whose value parses as a number.
fn first_numeric(fields: &HashMap<String, String>, candidates: &[&str]) -> Option<f64> {
    candidates
        .iter()
        .filter_map(|name| fields.get(*name))
        .find_map(|value| parse_numeric(value))
}

/// Pull the leading number out of a display value: HTML remnants dropped,
/// thousands separators removed, currency signs skipped, and
/// million/billion/trillion multipliers applied.
pub fn parse_numeric(value: &str) -> Option<f64> {
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    let number = NUMBER.get_or_init(|| {
        Regex::new(r"(\d(?:[\d,]*\d)?(?:\.\d+)?)").expect("static number pattern")
    });

    let plain = strip_tags(value).replace("&nbsp;", " ");
    let caps = number.captures(&plain)?;
    let matched = caps.get(1)?;
    let parsed: f64 = matched.as_str().replace(',', "").parse().ok()?;

    let tail = plain[matched.end()..].trim_start().to_lowercase();
    let multiplier = if tail.starts_with("trillion") {
        1e12
    } else if tail.starts_with("billion") {
        1e9
    } else if tail.starts_with("million") {
        1e6
    } else {
        1.0
    };

    Some(parsed * multiplier)
}

fn strip_tags(value: &str) -> String {
    static TAG: OnceLock<Regex> = OnceLock::new();
    let tag = TAG.get_or_init(|| Regex::new(r"<[^>]+>").expect("static tag pattern"));
    tag.replace_all(value, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HttpConfig, SiteRegistry, WikiSiteId};
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn extractor_for(server: &MockServer) -> InfoboxExtractor {
        let mut site = SiteRegistry::builtin().get(WikiSiteId::IiWiki).unwrap().clone();
        site.base_url = server.uri();
        site.api_path = "/api.php".to_string();
        let client = Arc::new(WikiClient::new(site, &HttpConfig::default()).unwrap());
        InfoboxExtractor::new(client, ImageConfig::default())
    }

    fn page_body(title: &str, content: &str) -> serde_json::Value {
        serde_json::json!({
            "query": { "pages": [ { "title": title, "revisions": [ { "content": content } ] } ] }
        })
    }

    #[test]
    fn numeric_extraction() {
        assert_eq!(parse_numeric("1,200,000"), Some(1_200_000.0));
        assert_eq!(parse_numeric("US$41,000 (nominal)"), Some(41_000.0));
        assert_eq!(parse_numeric("$1.2 trillion"), Some(1.2e12));
        assert_eq!(parse_numeric("98.5 million (2020 est.)"), Some(98_500_000.0));
        assert_eq!(parse_numeric("9,984,670 km²"), Some(9_984_670.0));
        assert_eq!(parse_numeric("unknown"), None);
        assert_eq!(
            parse_numeric(r#"1,200,000<ref name="c">census</ref>"#),
            Some(1_200_000.0)
        );
    }

    #[test]
    fn summary_uses_priority_order() {
        let mut fields = HashMap::new();
        fields.insert("population".to_string(), "999".to_string());
        fields.insert("population_estimate".to_string(), "1,200,000".to_string());
        fields.insert("capital".to_string(), "Example City".to_string());
        let infobox = CountryInfobox {
            name: "Examplestan".to_string(),
            raw_wikitext: String::new(),
            parsed_template_data: ParameterMap::new(),
            fields,
        };

        let data = ParsedCountryData::from_infobox(infobox);
        assert_eq!(data.population, Some(1_200_000));
        assert_eq!(data.capital.as_deref(), Some("Example City"));
        assert_eq!(data.name, "Examplestan");
        assert!(data.gdp.is_none());
    }

    #[tokio::test]
    async fn end_to_end_extraction() {
        let server = MockServer::start().await;
        let wikitext = "{{Infobox country\n\
            | conventional_long_name = Republic of Examplestan\n\
            | capital = [[Example City]]\n\
            | population_estimate = 1,200,000\n\
            | area_km2 = {{convert|100|km2|sqmi}}\n\
            | image_flag = Flag of Examplestan.svg\n\
            }}\nHistory text.";

        Mock::given(method("GET"))
            .and(query_param("prop", "revisions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body("Examplestan", wikitext)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("prop", "imageinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "query": { "pages": { "9": { "imageinfo": [ { "url": "https://img.example/ex.svg" } ] } } }
            })))
            .mount(&server)
            .await;

        let extractor = extractor_for(&server);
        let data = extractor.extract_parsed("Examplestan").await.unwrap().unwrap();

        assert_eq!(data.name, "Republic of Examplestan");
        assert_eq!(data.population, Some(1_200_000));
        assert_eq!(data.area_km2, Some(100.0));
        assert_eq!(data.flag.as_deref(), Some("Flag of Examplestan.svg"));
        assert_eq!(data.flag_url.as_deref(), Some("https://img.example/ex.svg"));
        assert!(data
            .infobox
            .parsed_template_data
            .get("capital")
            .unwrap()
            .contains("[[Example City]]"));
        assert!(data.capital.unwrap().contains("Example City"));
    }

    #[tokio::test]
    async fn page_without_infobox_is_none_not_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(page_body("Plain", "Just an article with no infobox.")),
            )
            .mount(&server)
            .await;

        let extractor = extractor_for(&server);
        assert!(extractor.extract("Plain").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_page_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "query": { "pages": [ { "title": "Ghost", "missing": true } ] }
            })))
            .mount(&server)
            .await;

        let extractor = extractor_for(&server);
        assert!(extractor.extract("Ghost").await.unwrap().is_none());
    }
}
