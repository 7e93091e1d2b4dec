/*!
 * Translatable data model.
 *
 * - `tree`: the hierarchical `DataTree` with its path addressing
 * - `escape`: detection and marking of non-translatable substrings
 * - `words`: word counting used for progress accounting
 */

pub mod escape;
pub mod tree;
pub mod words;

// Re-export main types
pub use escape::{apply_escape, unescape, EscapeMarkers, Escaper, DEFAULT_ESCAPE_PATTERNS};
pub use tree::{
    is_html_format, DataLeaf, DataNode, DataPath, DataTree, EscapedString, LeafStatus, Segment, StatusCounts,
    PATH_DELIMITER,
};
pub use words::count_words;
