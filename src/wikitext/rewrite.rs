//! # Wikitext Rewriter
//!
//! ## Purpose
//! Turns one raw template parameter value into display-safe text or simple
//! inline HTML by expanding a fixed catalog of inline templates and then
//! converting the remaining wiki markup.
//!
//! ## Input/Output Specification
//! - **Input**: One raw parameter value string
//! - **Output**: Sanitized display string; user-supplied display text is
//!   HTML-escaped before being placed inside anchor tags
//! - **Termination**: At most [`MAX_PASSES`] expansion passes with an early
//!   exit when a pass changes nothing; residual unrecognized braces after
//!   the cap are an accepted approximation, not an error
//!
//! ## Key Features
//! - Catalog: link, language, formatting, abbreviation, date, unit
//!   conversion, currency, flag, color, list, and whitespace templates
//! - Generic cleanup for unrecognized templates (collapse, salvage, delete)
//! - Wiki-link / file-link / bold-italic / `<br>` normalization after
//!   template expansion, so link targets produced by templates convert too

use crate::config::WikiSite;
use crate::utils::{collapse_whitespace, encode_title, escape_html};
use regex::{Captures, Regex};
use std::sync::OnceLock;

/// Hard cap on expansion passes. Together with fixed-point detection this
/// guarantees termination even for inputs whose expansion reintroduces `{{`.
const MAX_PASSES: usize = 3;

macro_rules! static_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).expect("static rewrite pattern"))
        }
    };
}

static_regex!(re_wp_link, r"(?i)\{\{\s*(?:wp|w|wikipedia)\s*\|\s*([^{}|]+?)\s*(?:\|\s*([^{}|]*?)\s*)?\}\}");
static_regex!(re_lang, r"(?i)\{\{\s*lang\s*\|\s*[a-zA-Z][a-zA-Z0-9-]*\s*\|\s*([^{}]*?)\s*\}\}");
static_regex!(re_native_name, r"(?i)\{\{\s*native[ _]name\s*\|\s*[a-zA-Z][a-zA-Z0-9-]*\s*\|\s*([^{}|]*)[^{}]*\}\}");
static_regex!(re_wrapper, r"(?i)\{\{\s*(?:nowrap|nobr|small(?:er)?|big|center|nobold)\s*\|\s*([^{}]*?)\s*\}\}");
static_regex!(re_abbr, r"(?i)\{\{\s*abbr\s*\|\s*([^{}|]*?)\s*(?:\|[^{}]*)?\}\}");
static_regex!(re_date, r"(?i)\{\{\s*(?:start|end)[ _]date(?:[ _]and[ _]age)?\s*\|\s*(\d{1,4})(?:\s*\|\s*(\d{1,2}))?(?:\s*\|\s*(\d{1,2}))?[^{}]*\}\}");
static_regex!(re_convert, r"(?i)\{\{\s*convert\s*\|\s*([0-9][0-9,.]*)\s*\|\s*([a-zA-Z0-9/]+)[^{}]*\}\}");
static_regex!(re_us_dollar, r"(?i)\{\{\s*US\$\s*\|\s*([0-9][0-9,.]*)[^{}]*\}\}");
static_regex!(re_currency_name, r"(?i)\{\{\s*(?:USD|US\$)\s*\}\}");
static_regex!(re_flag_icon, r"(?i)\{\{\s*flag[ _]?icon\s*\|[^{}]*\}\}");
static_regex!(re_flag, r"(?i)\{\{\s*flag(?:country|u)?\s*\|\s*([^{}|]+?)\s*(?:\|[^{}]*)?\}\}");
static_regex!(re_color, r"(?i)\{\{\s*(?:colou?r|font[ _]color)\s*\|\s*(#?[0-9a-zA-Z]+)\s*\|\s*([^{}]*?)\s*\}\}");
static_regex!(re_list, r"(?i)\{\{\s*(?:hlist|flatlist|plainlist|unbulleted[ _]list|ubl)\s*\|([^{}]*)\}\}");
static_regex!(re_nbsp, r"(?i)\{\{\s*nbsp\s*\}\}");
static_regex!(re_spaces, r"(?i)\{\{\s*spaces\s*\|\s*\d+\s*\}\}");
static_regex!(re_bullet, r"(?i)\{\{\s*(?:·|•|bull(?:et)?|dot)\s*\}\}");
static_regex!(re_break, r"(?i)\{\{\s*(?:break|br)\s*\}\}");
static_regex!(re_clear, r"(?i)\{\{\s*(?:-|clear)\s*\}\}");
static_regex!(re_generic_template, r"\{\{([^{}]*)\}\}");
static_regex!(re_category_link, r"(?i)\[\[\s*category\s*:[^\]]*\]\]");
static_regex!(re_file_link, r"(?i)\[\[\s*(?:file|image)\s*:\s*([^\]|]+?)\s*(?:\|[^\]]*)?\]\]");
static_regex!(re_piped_link, r"\[\[([^\]|]+)\|([^\]]+)\]\]");
static_regex!(re_bare_link, r"\[\[([^\]|]+)\]\]");
static_regex!(re_ref_pair, r"(?is)<ref[^>/]*>.*?</ref\s*>");
static_regex!(re_ref_selfclosed, r"(?i)<ref[^>]*/\s*>");
static_regex!(re_br_tag, r"(?i)<\s*br\s*/?\s*>");

/// Rewrites raw parameter values into display-safe text for one wiki site
/// (the site supplies the link base for internal wiki-links).
#[derive(Debug, Clone)]
pub struct WikitextRewriter {
    site: WikiSite,
}

impl WikitextRewriter {
    pub fn new(site: WikiSite) -> Self {
        Self { site }
    }

    /// Rewrite one raw parameter value.
    pub fn rewrite(&self, raw: &str) -> String {
        let mut text = raw.trim().to_string();

        let mut passes = 0;
        while text.contains("{{") && passes < MAX_PASSES {
            let expanded = expand_catalog(&text);
            passes += 1;
            if expanded == text {
                break;
            }
            text = expanded;
        }

        text = cleanup_unrecognized(&text);
        text = re_ref_pair().replace_all(&text, "").to_string();
        text = re_ref_selfclosed().replace_all(&text, "").to_string();
        text = re_category_link().replace_all(&text, "").to_string();
        text = re_file_link()
            .replace_all(&text, |caps: &Captures| caps[1].trim().to_string())
            .to_string();
        text = self.convert_wiki_links(&text);
        text = normalize_markup(&text);
        collapse_whitespace(&text).trim().to_string()
    }

    /// Convert `[[page|display]]` and `[[page]]` links into anchors. Runs
    /// after template expansion so targets produced by templates convert too.
    fn convert_wiki_links(&self, text: &str) -> String {
        let piped = re_piped_link().replace_all(text, |caps: &Captures| {
            self.anchor(caps[1].trim(), caps[2].trim())
        });
        re_bare_link()
            .replace_all(&piped, |caps: &Captures| {
                let target = caps[1].trim();
                self.anchor(target, target)
            })
            .to_string()
    }

    fn anchor(&self, target: &str, display: &str) -> String {
        format!(
            r#"<a href="{}">{}</a>"#,
            self.site.page_url(target),
            escape_html(display)
        )
    }
}

/// One full pass of the template catalog.
fn expand_catalog(text: &str) -> String {
    let mut out = text.to_string();

    out = re_wp_link()
        .replace_all(&out, |caps: &Captures| {
            let target = caps[1].trim();
            let display = caps
                .get(2)
                .map(|m| m.as_str().trim())
                .filter(|s| !s.is_empty())
                .unwrap_or(target);
            format!(
                r#"<a href="https://en.wikipedia.org/wiki/{}">{}</a>"#,
                encode_title(target),
                escape_html(display)
            )
        })
        .to_string();

    out = re_lang().replace_all(&out, "$1").to_string();
    out = re_native_name().replace_all(&out, "$1").to_string();
    out = re_wrapper().replace_all(&out, "$1").to_string();
    out = re_abbr().replace_all(&out, "$1").to_string();

    out = re_date()
        .replace_all(&out, |caps: &Captures| {
            let year = &caps[1];
            match (caps.get(2), caps.get(3)) {
                (Some(month), Some(day)) => {
                    format!(
                        "{}-{:0>2}-{:0>2}",
                        year,
                        month.as_str(),
                        day.as_str()
                    )
                }
                (Some(month), None) => format!("{}-{:0>2}", year, month.as_str()),
                _ => year.to_string(),
            }
        })
        .to_string();

    out = re_convert()
        .replace_all(&out, |caps: &Captures| {
            format!("{} {}", &caps[1], display_unit(&caps[2]))
        })
        .to_string();

    out = re_us_dollar()
        .replace_all(&out, |caps: &Captures| format!("US${}", &caps[1]))
        .to_string();
    out = re_currency_name().replace_all(&out, "US$").to_string();

    out = re_flag_icon().replace_all(&out, "").to_string();
    out = re_flag().replace_all(&out, "$1").to_string();

    out = re_color()
        .replace_all(&out, |caps: &Captures| {
            format!(
                r#"<span style="color:{}">{}</span>"#,
                &caps[1],
                escape_html(caps[2].trim())
            )
        })
        .to_string();

    out = re_list()
        .replace_all(&out, |caps: &Captures| {
            caps[1]
                .split('|')
                .map(str::trim)
                .filter(|part| !part.is_empty() && !part.contains('='))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .to_string();

    out = re_nbsp().replace_all(&out, " ").to_string();
    out = re_spaces().replace_all(&out, " ").to_string();
    out = re_bullet().replace_all(&out, " · ").to_string();
    out = re_break().replace_all(&out, "<br>").to_string();
    out = re_clear().replace_all(&out, "").to_string();

    out
}

/// Handle templates left over after the catalog: single-parameter templates
/// collapse to their parameter, zero-parameter templates are deleted, and
/// multi-parameter templates salvage the first readable segment if any.
/// Innermost-first, repeated a bounded number of times to unwrap nesting.
fn cleanup_unrecognized(text: &str) -> String {
    let mut out = text.to_string();
    for _ in 0..MAX_PASSES {
        if !out.contains("{{") {
            break;
        }
        let replaced = re_generic_template()
            .replace_all(&out, |caps: &Captures| salvage_template(&caps[1]))
            .to_string();
        if replaced == out {
            break;
        }
        out = replaced;
    }
    out
}

fn salvage_template(inner: &str) -> String {
    let parts: Vec<&str> = inner.split('|').collect();
    match parts.len() {
        0 | 1 => String::new(),
        2 => parts[1].trim().to_string(),
        _ => parts[1..]
            .iter()
            .map(|part| part.trim())
            .find(|part| {
                !part.contains('=') && part.chars().next().is_some_and(|c| c.is_alphabetic())
            })
            .map(str::to_string)
            .unwrap_or_default(),
    }
}

fn normalize_markup(text: &str) -> String {
    let mut out = text.replace("'''''", "");
    out = out.replace("'''", "");
    out = out.replace("''", "");
    re_br_tag().replace_all(&out, "<br>").to_string()
}

fn display_unit(unit: &str) -> String {
    match unit.to_lowercase().as_str() {
        "km2" | "sqkm" => "km²".to_string(),
        "sqmi" | "mi2" => "sq mi".to_string(),
        "c" => "°C".to_string(),
        "f" => "°F".to_string(),
        _ => unit.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SiteRegistry, WikiSiteId};

    fn rewriter() -> WikitextRewriter {
        let site = SiteRegistry::builtin().get(WikiSiteId::IiWiki).unwrap().clone();
        WikitextRewriter::new(site)
    }

    #[test]
    fn convert_template_renders_value_and_unit() {
        assert_eq!(rewriter().rewrite("{{convert|100|km|mi}}"), "100 km");
        assert_eq!(rewriter().rewrite("{{convert|9,984,670|km2|sqmi}}"), "9,984,670 km²");
    }

    #[test]
    fn nested_templates_resolve_within_cap() {
        let out = rewriter().rewrite("{{nowrap|{{convert|50|km|mi}}}}");
        assert_eq!(out, "50 km");
    }

    #[test]
    fn wiki_links_become_escaped_anchors() {
        let out = rewriter().rewrite("[[Example City|The <Capital>]]");
        assert_eq!(
            out,
            r#"<a href="https://iiwiki.us/wiki/Example_City">The &lt;Capital&gt;</a>"#
        );

        let bare = rewriter().rewrite("[[Example City]]");
        assert_eq!(bare, r#"<a href="https://iiwiki.us/wiki/Example_City">Example City</a>"#);
    }

    #[test]
    fn file_links_reduce_to_bare_filename() {
        let out = rewriter().rewrite("[[File:Flag of Nordania.svg|125px|border]]");
        assert_eq!(out, "Flag of Nordania.svg");
    }

    #[test]
    fn language_and_formatting_templates_unwrap() {
        assert_eq!(rewriter().rewrite("{{lang|fr|République}}"), "République");
        assert_eq!(rewriter().rewrite("{{small|minor note}}"), "minor note");
        assert_eq!(rewriter().rewrite("{{flag|Nordania}}"), "Nordania");
        assert_eq!(rewriter().rewrite("{{flagicon|Nordania}} Nordania"), "Nordania");
    }

    #[test]
    fn unrecognized_templates_degrade_gracefully() {
        // zero parameters: deleted
        assert_eq!(rewriter().rewrite("before {{mystery}} after"), "before after");
        // single parameter: collapses to the parameter
        assert_eq!(rewriter().rewrite("{{mystery|kept text}}"), "kept text");
        // multi parameter: first readable segment survives
        assert_eq!(rewriter().rewrite("{{mystery|style=bold|Readable|x=1}}"), "Readable");
    }

    #[test]
    fn bold_italic_and_br_normalize() {
        assert_eq!(rewriter().rewrite("'''Bold''' and ''italic''"), "Bold and italic");
        assert_eq!(rewriter().rewrite("one<br />two<BR>three"), "one<br>two<br>three");
    }

    #[test]
    fn refs_are_stripped() {
        assert_eq!(
            rewriter().rewrite(r#"1,200,000<ref name="census">2020 census</ref>"#),
            "1,200,000"
        );
    }

    #[test]
    fn termination_on_adversarial_input() {
        // An input that keeps a template-looking head alive through passes
        // must still terminate and may keep residual braces.
        let adversarial = "{{a|{{b|{{c|{{d|{{e|deep}}}}}}}}}}";
        let out = rewriter().rewrite(adversarial);
        // Terminates within the pass cap; deeply nested levels beyond the
        // cap may leave residual braces, which is accepted.
        assert!(out.contains("deep"));
    }

    #[test]
    fn idempotence_for_fully_resolved_input() {
        let rewriter = rewriter();
        for input in [
            "{{convert|100|km|mi}}",
            "[[Example City|City]] est. {{start date|1920|5|1}}",
            "plain '''text''' with {{lang|de|Wörter}}",
        ] {
            let once = rewriter.rewrite(input);
            let twice = rewriter.rewrite(&once);
            assert_eq!(once, twice, "not idempotent for {}", input);
        }
    }

    #[test]
    fn dates_and_currency_render() {
        assert_eq!(rewriter().rewrite("{{start date|1920|5|1}}"), "1920-05-01");
        assert_eq!(rewriter().rewrite("{{US$|41,000}} per year"), "US$41,000 per year");
    }

    #[test]
    fn list_templates_join_with_commas() {
        assert_eq!(
            rewriter().rewrite("{{hlist|Nordanian|Common Speech|class=inline}}"),
            "Nordanian, Common Speech"
        );
    }

    #[test]
    fn whitespace_collapses() {
        assert_eq!(rewriter().rewrite("a  lot\n\nof   space"), "a lot of space");
    }
}
