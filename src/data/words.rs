/*!
 * Word counting for translatable text.
 */

use once_cell::sync::Lazy;
use regex::Regex;

/// Regex for markup tags, which never count as words
static TAG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]*>").expect("Invalid tag regex"));

/// Count the words of a text
///
/// Markup tags are removed first, then the text is split on whitespace and
/// punctuation. Apostrophes, hyphens and underscores inside a token do not
/// split it, and tokens without any alphanumeric character are ignored.
pub fn count_words(text: &str) -> usize {
    let stripped = TAG_REGEX.replace_all(text, " ");
    stripped
        .split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '-' || c == '_'))
        .filter(|token| token.chars().any(char::is_alphanumeric))
        .count()
}
