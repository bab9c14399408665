// src/blacklist.rs

//! Upload blacklist.
//!
//! The blacklist file is a document with one child per field class,
//! each listing glob patterns. An upload is rejected when any field of
//! its publish information matches a pattern of the corresponding
//! class. Matching is case-insensitive except for addresses.
//!
//! ```text
//! [name]
//!     pattern="Evil_*"
//! [/name]
//! [ip]
//!     pattern="192.0.2.*"
//! [/ip]
//! ```

use crate::doc::Node;
use glob::Pattern;
use tracing::warn;

#[derive(Debug, Default)]
pub struct Blacklist {
    names: Vec<Pattern>,
    titles: Vec<Pattern>,
    descriptions: Vec<Pattern>,
    authors: Vec<Pattern>,
    ips: Vec<Pattern>,
    emails: Vec<Pattern>,
}

impl Blacklist {
    /// Parse patterns from a blacklist document. Unparseable patterns
    /// are logged and skipped rather than disabling the whole list.
    pub fn read(doc: &Node) -> Self {
        Self {
            names: read_patterns(doc, "name"),
            titles: read_patterns(doc, "title"),
            descriptions: read_patterns(doc, "description"),
            authors: read_patterns(doc, "author"),
            ips: read_patterns(doc, "ip"),
            emails: read_patterns(doc, "email"),
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
            && self.titles.is_empty()
            && self.descriptions.is_empty()
            && self.authors.is_empty()
            && self.ips.is_empty()
            && self.emails.is_empty()
    }

    /// Check an upload's publish information against the list.
    pub fn is_blacklisted(
        &self,
        name: &str,
        title: &str,
        description: &str,
        author: &str,
        ip: &str,
        email: &str,
    ) -> bool {
        matches_ci(&self.names, name)
            || matches_ci(&self.titles, title)
            || matches_ci(&self.descriptions, description)
            || matches_ci(&self.authors, author)
            || matches_exact(&self.ips, ip)
            || matches_ci(&self.emails, email)
    }
}

fn read_patterns(doc: &Node, class: &str) -> Vec<Pattern> {
    let mut patterns = Vec::new();
    for section in doc.children(class) {
        for (key, value) in &section.attributes {
            if key != "pattern" {
                continue;
            }
            add_pattern(&mut patterns, &value.to_text(), class);
        }
        // Also accept one pattern per [entry] child, for longer lists.
        for entry in section.children("entry") {
            add_pattern(&mut patterns, entry.attr_str("pattern"), class);
        }
    }
    patterns
}

fn add_pattern(patterns: &mut Vec<Pattern>, text: &str, class: &str) {
    if text.is_empty() {
        return;
    }
    match Pattern::new(&text.to_lowercase()) {
        Ok(p) => patterns.push(p),
        Err(e) => warn!("ignoring bad blacklist pattern '{}' in [{}]: {}", text, class, e),
    }
}

fn matches_ci(patterns: &[Pattern], text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    let lowered = text.to_lowercase();
    patterns.iter().any(|p| p.matches(&lowered))
}

fn matches_exact(patterns: &[Pattern], text: &str) -> bool {
    !text.is_empty() && patterns.iter().any(|p| p.matches(text))
}
