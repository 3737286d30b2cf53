//! # Utilities Module
//!
//! ## Purpose
//! Small text helpers shared across ranking, rewriting, and URL derivation.
//!
//! ## Input/Output Specification
//! - **Input**: Raw titles, display strings, filenames
//! - **Output**: Escaped, collapsed, or URL-safe forms

/// Escape text for safe insertion into HTML attribute or element content.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Collapse runs of whitespace (including newlines) into single spaces.
pub fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !prev_space {
                out.push(' ');
                prev_space = true;
            }
        } else {
            out.push(ch);
            prev_space = false;
        }
    }
    out
}

/// Encode a page title for use in a wiki URL path: spaces become
/// underscores, everything outside the MediaWiki-safe set is percent-encoded.
pub fn encode_title(title: &str) -> String {
    let underscored = title.trim().replace(' ', "_");
    let mut out = String::with_capacity(underscored.len());
    for byte in underscored.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'_'
            | b'-'
            | b'.'
            | b'('
            | b')'
            | b','
            | b':'
            | b'/' => out.push(byte as char),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// Strip a leading prefix case-insensitively, returning the remainder.
pub fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    if text.len() >= prefix.len() && text[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&text[prefix.len()..])
    } else {
        None
    }
}

/// Uppercase the first letter of each word, leaving the rest unchanged.
/// Used to generate filename guesses like `Flag_of_Examplestan.svg`.
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
