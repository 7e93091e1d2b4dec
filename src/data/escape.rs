/*!
 * Protection of non-translatable substrings.
 *
 * Detection (`Escaper::escape`) only records where protected substrings are;
 * the text itself is left alone. Markers are materialised per translator or
 * exchange format with `apply_escape` and removed again with `unescape`.
 */

use log::debug;
use regex::Regex;
use std::collections::BTreeMap;

use crate::errors::JobError;

use super::tree::{DataLeaf, DataTree, EscapedString};

/// Default patterns: a sigil directly followed by a token
pub const DEFAULT_ESCAPE_PATTERNS: [&str; 3] = [r"@[\w-]+", r"%[\w-]+", r"![\w-]+"];

/// Start and end markers wrapped around protected substrings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscapeMarkers {
    /// Text inserted before a protected substring
    pub start: String,
    /// Text inserted after a protected substring
    pub end: String,
}

impl EscapeMarkers {
    /// Create markers
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Markers made of private use code points, which real text does not contain
    pub fn private_use() -> Self {
        Self::new("\u{E000}", "\u{E001}")
    }

    /// Whether the markers would change anything
    pub fn is_noop(&self) -> bool {
        self.start.is_empty() || self.end.is_empty()
    }

    fn unescape_regex(&self) -> Option<Regex> {
        if self.is_noop() {
            return None;
        }
        let pattern = format!(
            "(?s){}(.+?){}",
            regex::escape(&self.start),
            regex::escape(&self.end)
        );
        Regex::new(&pattern).ok()
    }
}

/// Detector of protected substrings
#[derive(Debug, Clone)]
pub struct Escaper {
    patterns: Vec<Regex>,
}

impl Escaper {
    /// Create an escaper from regular expressions
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, JobError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p.as_ref()).map_err(|e| {
                    JobError::InvalidData(format!("invalid escape pattern '{}': {}", p.as_ref(), e))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// An escaper that never protects anything
    pub fn disabled() -> Self {
        Self { patterns: Vec::new() }
    }

    /// Find protected substrings in `text`, keyed by byte offset
    ///
    /// When matches of different patterns overlap, the earliest one wins and
    /// on equal offsets the longest one wins.
    pub fn escape(&self, text: &str) -> BTreeMap<usize, EscapedString> {
        let mut matches: Vec<(usize, usize)> = self
            .patterns
            .iter()
            .flat_map(|pattern| pattern.find_iter(text).map(|m| (m.start(), m.end())))
            .collect();
        matches.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

        let mut escape = BTreeMap::new();
        let mut covered_until = 0;
        for (start, end) in matches {
            if start < covered_until || start == end {
                continue;
            }
            escape.insert(
                start,
                EscapedString {
                    string: text[start..end].to_string(),
                },
            );
            covered_until = end;
        }
        escape
    }

    /// Record the protected substrings of a leaf in place
    pub fn escape_leaf(&self, leaf: &mut DataLeaf) {
        if leaf.translate {
            leaf.escape = self.escape(&leaf.text);
        }
    }

    /// Record the protected substrings of every leaf of a tree
    pub fn escape_tree(&self, tree: &mut DataTree) {
        for path in tree.leaf_paths() {
            if let Some(leaf) = tree.get_mut(&path) {
                self.escape_leaf(leaf);
            }
        }
    }
}

/// Wrap every recorded substring of `text` with the given markers
///
/// Replacements run from the highest offset down so earlier offsets stay
/// valid. Entries that no longer match the text are skipped.
pub fn apply_escape(
    text: &str,
    escape: &BTreeMap<usize, EscapedString>,
    markers: &EscapeMarkers,
) -> String {
    if escape.is_empty() || markers.is_noop() {
        return text.to_string();
    }

    let mut result = text.to_string();
    for (&offset, escaped) in escape.iter().rev() {
        let end = offset + escaped.string.len();
        if result.get(offset..end) != Some(escaped.string.as_str()) {
            debug!("Escape entry at offset {} does not match the text, skipping", offset);
            continue;
        }
        let wrapped = format!("{}{}{}", markers.start, escaped.string, markers.end);
        result.replace_range(offset..end, &wrapped);
    }
    result
}

/// Remove markers, keeping the substring between them
///
/// Unbalanced markers are left as they are.
pub fn unescape(text: &str, markers: &EscapeMarkers) -> String {
    match markers.unescape_regex() {
        Some(regex) => regex.replace_all(text, "$1").into_owned(),
        None => text.to_string(),
    }
}
