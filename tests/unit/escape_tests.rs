/*!
 * Tests for escaping of protected substrings
 */

use proptest::prelude::*;
use lingotrack::data::{apply_escape, unescape, DataLeaf, EscapeMarkers, Escaper, DEFAULT_ESCAPE_PATTERNS};

fn escaper() -> Escaper {
    Escaper::new(&DEFAULT_ESCAPE_PATTERNS).unwrap()
}

/// Test that a leaf keeps its protected substrings through marker wrapping
#[test]
fn test_escapeLeaf_withPlaceholders_shouldWrapEachOne() {
    let mut leaf = DataLeaf::new("Dear @name, you have %count new !messages.");
    escaper().escape_leaf(&mut leaf);

    let wrapped = apply_escape(&leaf.text, &leaf.escape, &EscapeMarkers::new("[[", "]]"));

    assert_eq!(wrapped, "Dear [[@name]], you have [[%count]] new [[!messages]].");
}

/// Test that a disabled escaper records nothing
#[test]
fn test_disabledEscaper_shouldRecordNothing() {
    assert!(Escaper::disabled().escape("@name %count").is_empty());
}

/// Test that invalid patterns are refused
#[test]
fn test_new_withInvalidPattern_shouldFail() {
    assert!(Escaper::new(&["(unclosed"]).is_err());
}

/// Test that brackets in the source survive a private use round trip
#[test]
fn test_escapeRoundTrip_withMarkerLikeText_shouldRestoreText() {
    let text = "see [[docs]] for @name";
    let markers = EscapeMarkers::private_use();

    let wrapped = apply_escape(text, &escaper().escape(text), &markers);

    assert_eq!(unescape(&wrapped, &markers), text);
}

/// Test that a translator dropping markers keeps its text
#[test]
fn test_unescape_withUnbalancedMarkers_shouldKeepText() {
    let markers = EscapeMarkers::new("[[", "]]");
    assert_eq!(unescape("Hallo [[@name]]", &markers), "Hallo @name");
    assert_eq!(unescape("Hallo [[@name", &markers), "Hallo [[@name");
}

proptest! {
    /// Wrapping then unwrapping gives back the original text
    #[test]
    fn test_escapeRoundTrip_shouldRestoreText(text in "[a-zA-Z0-9@%! _\\[\\]-]{0,60}") {
        let markers = EscapeMarkers::private_use();
        let escape = escaper().escape(&text);

        let wrapped = apply_escape(&text, &escape, &markers);

        prop_assert_eq!(unescape(&wrapped, &markers), text);
    }

    /// Every recorded offset points at its substring
    #[test]
    fn test_escape_offsetsShouldMatchText(text in "[a-z@% ]{0,40}") {
        for (offset, escaped) in escaper().escape(&text) {
            prop_assert_eq!(&text[offset..offset + escaped.string.len()], escaped.string.as_str());
        }
    }
}
