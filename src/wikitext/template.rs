//! # Template Isolation and Parameter Parsing
//!
//! ## Purpose
//! Locates a named `{{...}}` template invocation inside raw wikitext and
//! splits its content into a parameter map. Brace-depth counting is the only
//! correct way to find the end of a template that itself contains nested
//! `{{...}}` calls; a regex alone cannot balance arbitrary nesting.
//!
//! ## Input/Output Specification
//! - **Input**: Raw wikitext plus candidate template names (case, underscore
//!   and spacing variants are generated internally)
//! - **Output**: The exact `{{...}}` span, or the parameter map sliced from
//!   its content
//! - **Edge cases**: No match returns `None`; an unterminated template
//!   returns the remainder of the string rather than failing

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Parameter name to raw (pre-rewrite) value, keys trimmed and
/// case-sensitive. If the source repeats a key, the last value wins; that is
/// an authoring mistake upstream, not a parser concern.
pub type ParameterMap = HashMap<String, String>;

/// Build the start pattern for one template name: `{{`, optional whitespace,
/// then the name with any mix of spaces/underscores between words,
/// case-insensitively.
fn start_pattern(name: &str) -> Regex {
    let words: Vec<String> = name.split_whitespace().map(|w| regex::escape(w)).collect();
    let body = words.join(r"[ _]+");
    // The trailing word boundary keeps "Infobox country" from matching
    // "Infobox countryside".
    Regex::new(&format!(r"(?i)\{{\{{\s*{}\b", body)).expect("static template pattern")
}

/// Earliest start-pattern match across all candidate names.
/// Returns `(span_start, name_end)` byte offsets into `wikitext`.
fn find_start(wikitext: &str, template_names: &[&str]) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    for name in template_names {
        if let Some(found) = start_pattern(name).find(wikitext) {
            let candidate = (found.start(), found.end());
            best = Some(match best {
                Some(current) if current.0 <= candidate.0 => current,
                _ => candidate,
            });
        }
    }
    best
}

/// Scan forward from a `{{` counting brace depth; the span ends where depth
/// returns to zero. If the string ends first, the whole remainder is the
/// span (graceful truncation).
fn balanced_span(s: &str) -> &str {
    let bytes = s.as_bytes();
    let mut depth = 0usize;
    let mut i = 0usize;
    while i + 1 < bytes.len() {
        if bytes[i] == b'{' && bytes[i + 1] == b'{' {
            depth += 1;
            i += 2;
        } else if bytes[i] == b'}' && bytes[i + 1] == b'}' {
            depth = depth.saturating_sub(1);
            i += 2;
            if depth == 0 {
                return &s[..i];
            }
        } else {
            i += 1;
        }
    }
    s
}

/// Extract the complete `{{...}}` span of the first matching template, from
/// its opening braces through the balanced closing braces.
pub fn isolate_template<'a>(wikitext: &'a str, template_names: &[&str]) -> Option<&'a str> {
    let (start, _name_end) = find_start(wikitext, template_names)?;
    Some(balanced_span(&wikitext[start..]))
}

/// Isolate the first matching template and parse its parameters.
pub fn template_parameters(wikitext: &str, template_names: &[&str]) -> Option<ParameterMap> {
    let (start, name_end) = find_start(wikitext, template_names)?;
    let span = balanced_span(&wikitext[start..]);

    // Content runs from just after the template name to the closing braces
    // (or to the end of a truncated span).
    let content_start = name_end - start;
    let content_end = if span.ends_with("}}") && span.len() >= content_start + 2 {
        span.len() - 2
    } else {
        span.len()
    };
    let content = &span[content_start.min(content_end)..content_end];

    Some(parse_parameters(content))
}

/// Parse `| name = value` parameters out of template content.
///
/// The boundary regex forbids `=`, `|`, `{`, `[` and newlines inside the
/// captured name, which keeps `=` signs inside nested templates and links
/// from being misread as parameter separators. A value that itself contains
/// an unnested `|name=` sequence can still be mis-split; that is accepted
/// best-effort behavior, preserved deliberately rather than patched by
/// guessing author intent.
pub fn parse_parameters(content: &str) -> ParameterMap {
    static BOUNDARY: OnceLock<Regex> = OnceLock::new();
    let boundary = BOUNDARY.get_or_init(|| Regex::new(r"\|\s*([^=|{\[\n]+?)\s*=").expect("static boundary pattern"));

    let matches: Vec<(usize, usize, String)> = boundary
        .captures_iter(content)
        .map(|caps| {
            let whole = caps.get(0).expect("group 0 always present");
            let name = caps.get(1).expect("boundary has one capture");
            (whole.start(), whole.end(), name.as_str().trim().to_string())
        })
        .collect();

    let mut params = ParameterMap::new();
    for (index, (_, value_start, name)) in matches.iter().enumerate() {
        let value_end = matches
            .get(index + 1)
            .map(|next| next.0)
            .unwrap_or(content.len());
        let mut value = content[*value_start..value_end].trim();
        if let Some(stripped) = value.strip_suffix('|') {
            value = stripped.trim_end();
        }
        params.insert(name.clone(), value.to_string());
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    const INFOBOX: &[&str] = &["Infobox country"];

    #[test]
    fn isolates_simple_template() {
        let text = "intro {{Infobox country|capital=Example City|population=1,200,000}} outro";
        let span = isolate_template(text, INFOBOX).unwrap();
        assert_eq!(span, "{{Infobox country|capital=Example City|population=1,200,000}}");
    }

    #[test]
    fn balance_invariant_with_nesting() {
        let text = "x {{Infobox country|area={{convert|100|km2|sqmi}}|motto={{lang|la|{{small|Lux}}}}}} y";
        let span = isolate_template(text, INFOBOX).unwrap();
        assert_eq!(span.matches("{{").count(), span.matches("}}").count());
        assert!(span.ends_with("}}"));
        assert!(span.contains("{{convert|100|km2|sqmi}}"));
    }

    #[test]
    fn matches_case_and_underscore_variants() {
        for text in [
            "{{infobox country|capital=A}}",
            "{{Infobox_country|capital=A}}",
            "{{INFOBOX  COUNTRY|capital=A}}",
        ] {
            assert!(isolate_template(text, INFOBOX).is_some(), "failed on {}", text);
        }
        assert!(isolate_template("{{Infobox countryside|x=1}}", INFOBOX).is_none());
    }

    #[test]
    fn unterminated_template_truncates_gracefully() {
        let text = "{{Infobox country|capital=Example City|area={{convert|1|km";
        let span = isolate_template(text, INFOBOX).unwrap();
        assert_eq!(span, text);
    }

    #[test]
    fn earliest_of_multiple_names_wins() {
        let names = &["Infobox country", "Infobox nation"];
        let text = "{{Infobox nation|a=1}} {{Infobox country|b=2}}";
        let span = isolate_template(text, names).unwrap();
        assert!(span.starts_with("{{Infobox nation"));
    }

    #[test]
    fn exact_round_trip_scenario() {
        let text = "{{Infobox country|capital=Example City|population=1,200,000}}";
        let params = template_parameters(text, INFOBOX).unwrap();
        assert_eq!(params.get("capital").unwrap(), "Example City");
        assert_eq!(params.get("population").unwrap(), "1,200,000");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn nested_equals_not_treated_as_boundary() {
        let text = "{{Infobox country\n| capital = [[Example City]]\n| area_km2 = {{convert|100|km2|sqmi}}\n| population = 1,200,000\n}}";
        let params = template_parameters(text, INFOBOX).unwrap();
        assert_eq!(params.get("capital").unwrap(), "[[Example City]]");
        assert_eq!(params.get("area_km2").unwrap(), "{{convert|100|km2|sqmi}}");
        assert_eq!(params.get("population").unwrap(), "1,200,000");
    }

    #[test]
    fn multiline_values_span_to_next_boundary() {
        let content = "\n| government = Federal\nparliamentary republic\n| currency = Orin\n";
        let params = parse_parameters(content);
        assert_eq!(params.get("government").unwrap(), "Federal\nparliamentary republic");
        assert_eq!(params.get("currency").unwrap(), "Orin");
    }
}
