/*!
 * Tests for data trees and word counting
 */

use proptest::prelude::*;
use lingotrack::data::{count_words, DataLeaf, DataTree};

use crate::common::{path, tree};

/// Test that paths with digits address indexed children
#[test]
fn test_tree_withNestedPaths_shouldFlattenInOrder() {
    let data = tree(&[
        ("title", "Welcome"),
        ("body][0][text", "First paragraph"),
        ("body][1][text", "Second paragraph"),
    ]);

    let paths: Vec<String> = data.flatten().iter().map(|(p, _)| p.to_string()).collect();

    assert_eq!(paths, vec!["title", "body][0][text", "body][1][text"]);
    assert_eq!(data.word_count(), 5);
}

/// Test that leaves not meant for translation do not count
#[test]
fn test_wordCount_withNonTranslatableLeaf_shouldIgnoreIt() {
    let mut data = tree(&[("title", "Two words")]);
    data.insert(&path("sku"), DataLeaf::new("ABC 123 XYZ").non_translatable())
        .unwrap();

    assert_eq!(data.word_count(), 2);
    assert_eq!(data.translatable_leaves().len(), 1);
}

/// Test word counting of markup
#[test]
fn test_countWords_withMarkup_shouldSkipTags() {
    assert_eq!(count_words("<p>Hello <strong>big</strong> world</p>"), 3);
    assert_eq!(count_words("it's a well-known fact"), 4);
}

proptest! {
    /// Flattening and rebuilding gives an equal tree
    #[test]
    fn test_unflatten_ofFlatten_shouldRebuildTree(
        top in prop::collection::btree_map("[a-y][a-z]{0,6}", "[a-zA-Z ]{0,20}", 1..8),
        nested in prop::collection::btree_map("[a-z]{1,6}", "[a-zA-Z ]{0,20}", 0..5),
    ) {
        let mut data = DataTree::new();
        for (key, text) in &top {
            data.insert(&path(key), DataLeaf::new(text.as_str())).unwrap();
        }
        for (key, text) in &nested {
            data.insert(&path(&format!("zgroup][{}", key)), DataLeaf::new(text.as_str())).unwrap();
        }

        let flat: Vec<_> = data
            .flatten()
            .into_iter()
            .map(|(p, leaf)| (p, leaf.clone()))
            .collect();
        let rebuilt = DataTree::unflatten(flat).unwrap();

        prop_assert_eq!(rebuilt.len(), top.len() + nested.len());
        prop_assert_eq!(rebuilt, data);
    }

    /// Word counts never depend on surrounding whitespace
    #[test]
    fn test_countWords_shouldIgnorePadding(words in prop::collection::vec("[a-z]{1,8}", 0..10)) {
        let text = words.join(" ");
        let padded = format!("  {}\t\n", text);
        prop_assert_eq!(count_words(&padded), words.len());
    }
}
