/*!
 * Hierarchical translatable data.
 *
 * A `DataTree` maps addresses (`DataPath`, an ordered list of segments) to
 * text leaves. Children keep their insertion order so flattening is stable:
 * the same tree always yields the same sequence of paths, which are used as
 * addresses in exchange files.
 */

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::errors::JobError;

use super::words::count_words;

/// Delimiter between segments in the textual form of a path
pub const PATH_DELIMITER: &str = "][";

/// One segment of a data path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Segment {
    /// Positional segment (delta of a multi-value field)
    Index(u64),
    /// Named segment
    Key(String),
}

impl Segment {
    /// Create a segment from a key, treating all-digit keys as indices
    ///
    /// Keeping a single representation per textual form is what makes
    /// `DataPath::parse(path.to_string()) == path` hold.
    pub fn key(key: impl Into<String>) -> Self {
        let key = key.into();
        if !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(index) = key.parse::<u64>() {
                if index.to_string() == key {
                    return Self::Index(index);
                }
            }
        }
        Self::Key(key)
    }

    fn validate(&self) -> Result<(), JobError> {
        match self {
            Self::Key(key) if key.is_empty() => {
                Err(JobError::InvalidData("empty path segment".to_string()))
            }
            Self::Key(key) if key.contains(PATH_DELIMITER) => Err(JobError::InvalidData(
                format!("path segment '{}' contains the delimiter", key),
            )),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{}", index),
            Self::Key(key) => write!(f, "{}", key),
        }
    }
}

impl From<&str> for Segment {
    fn from(key: &str) -> Self {
        Self::key(key)
    }
}

impl From<String> for Segment {
    fn from(key: String) -> Self {
        Self::key(key)
    }
}

impl From<u64> for Segment {
    fn from(index: u64) -> Self {
        Self::Index(index)
    }
}

impl From<usize> for Segment {
    fn from(index: usize) -> Self {
        Self::Index(index as u64)
    }
}

/// Address of a node inside a data tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataPath(Vec<Segment>);

impl DataPath {
    /// Create an empty path (the tree root)
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse the textual form `a][b][0`
    pub fn parse(path: &str) -> Result<Self, JobError> {
        if path.is_empty() {
            return Ok(Self::root());
        }
        let segments: Vec<Segment> = path.split(PATH_DELIMITER).map(Segment::key).collect();
        for segment in &segments {
            segment.validate()?;
        }
        Ok(Self(segments))
    }

    /// Path segments from the root
    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this is the root path
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A new path with one more segment
    pub fn child(&self, segment: impl Into<Segment>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }
}

impl fmt::Display for DataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|s| s.to_string()).collect();
        write!(f, "{}", parts.join(PATH_DELIMITER))
    }
}

impl<S: Into<Segment>> FromIterator<S> for DataPath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Review status of a single leaf
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeafStatus {
    /// No translation yet (or the translation was rejected)
    #[default]
    Untranslated,
    /// A translation arrived and waits for review
    NeedsReview,
    /// A reviewer approved the translation
    Translated,
    /// The translation was accepted
    Accepted,
}

impl LeafStatus {
    /// Whether a translation is present that has not been accepted yet
    pub fn is_pending_acceptance(self) -> bool {
        matches!(self, Self::NeedsReview | Self::Translated)
    }
}

impl fmt::Display for LeafStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeafStatus::Untranslated => write!(f, "untranslated"),
            LeafStatus::NeedsReview => write!(f, "needs_review"),
            LeafStatus::Translated => write!(f, "translated"),
            LeafStatus::Accepted => write!(f, "accepted"),
        }
    }
}

/// Record of a substring that must survive translation untouched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscapedString {
    /// The protected substring as found in the text
    pub string: String,
}

/// A single translatable text fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataLeaf {
    /// Source text
    pub text: String,
    /// Human readable label
    #[serde(default)]
    pub label: String,
    /// Markup format of the text (e.g. `html`); empty for plain text
    #[serde(default)]
    pub format: String,
    /// Whether the leaf is sent for translation at all
    #[serde(default = "default_true")]
    pub translate: bool,
    /// Protected substrings keyed by byte offset in `text`
    #[serde(default)]
    pub escape: BTreeMap<usize, EscapedString>,
    /// Translated text, once available
    #[serde(default)]
    pub translation: Option<String>,
    /// Review status
    #[serde(default)]
    pub status: LeafStatus,
}

fn default_true() -> bool {
    true
}

impl DataLeaf {
    /// Create a translatable plain text leaf
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            label: String::new(),
            format: String::new(),
            translate: true,
            escape: BTreeMap::new(),
            translation: None,
            status: LeafStatus::Untranslated,
        }
    }

    /// Set the label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Set the markup format
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    /// Mark the leaf as not translatable
    pub fn non_translatable(mut self) -> Self {
        self.translate = false;
        self
    }

    /// Words in the source text; zero for non-translatable leaves
    pub fn word_count(&self) -> usize {
        if !self.translate {
            return 0;
        }
        count_words(&self.text)
    }

    /// Whether the text is HTML
    pub fn is_html(&self) -> bool {
        is_html_format(&self.format)
    }
}

/// Whether a format identifier denotes HTML markup
pub fn is_html_format(format: &str) -> bool {
    matches!(
        format.to_lowercase().as_str(),
        "html" | "full_html" | "basic_html" | "restricted_html"
    )
}

/// A node of the data tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataNode {
    /// Text fragment
    Leaf(DataLeaf),
    /// Group of child nodes in insertion order
    Branch(Vec<(Segment, DataNode)>),
}

/// Per-status leaf counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    /// Leaves without translation
    pub pending: usize,
    /// Leaves waiting for review
    pub translated: usize,
    /// Leaves approved by a reviewer
    pub reviewed: usize,
    /// Accepted leaves
    pub accepted: usize,
}

impl StatusCounts {
    /// Total number of counted leaves
    pub fn total(&self) -> usize {
        self.pending + self.translated + self.reviewed + self.accepted
    }
}

/// Translatable content of one source object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataTree {
    root: Vec<(Segment, DataNode)>,
}

impl DataTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a leaf, creating intermediate branches as needed
    pub fn insert(&mut self, path: &DataPath, leaf: DataLeaf) -> Result<(), JobError> {
        let (last, parents) = path
            .segments()
            .split_last()
            .ok_or_else(|| JobError::InvalidData("cannot insert a leaf at the root".to_string()))?;

        let mut children = &mut self.root;
        for segment in parents {
            segment.validate()?;
            let position = match children.iter().position(|(s, _)| s == segment) {
                Some(position) => position,
                None => {
                    children.push((segment.clone(), DataNode::Branch(Vec::new())));
                    children.len() - 1
                }
            };
            children = match &mut children[position].1 {
                DataNode::Branch(nested) => nested,
                DataNode::Leaf(_) => {
                    return Err(JobError::InvalidData(format!(
                        "path {} passes through a leaf at '{}'",
                        path, segment
                    )));
                }
            };
        }

        last.validate()?;
        if children.iter().any(|(s, _)| s == last) {
            return Err(JobError::InvalidData(format!("duplicate leaf path {}", path)));
        }
        children.push((last.clone(), DataNode::Leaf(leaf)));
        Ok(())
    }

    /// Look up a leaf by path
    pub fn get(&self, path: &DataPath) -> Option<&DataLeaf> {
        let mut children = &self.root;
        let (last, parents) = path.segments().split_last()?;
        for segment in parents {
            match children.iter().find(|(s, _)| s == segment) {
                Some((_, DataNode::Branch(nested))) => children = nested,
                _ => return None,
            }
        }
        match children.iter().find(|(s, _)| s == last) {
            Some((_, DataNode::Leaf(leaf))) => Some(leaf),
            _ => None,
        }
    }

    /// Look up a leaf by path for modification
    pub fn get_mut(&mut self, path: &DataPath) -> Option<&mut DataLeaf> {
        let mut children = &mut self.root;
        let (last, parents) = path.segments().split_last()?;
        for segment in parents {
            match children.iter_mut().find(|(s, _)| s == segment) {
                Some((_, DataNode::Branch(nested))) => children = nested,
                _ => return None,
            }
        }
        match children.iter_mut().find(|(s, _)| s == last) {
            Some((_, DataNode::Leaf(leaf))) => Some(leaf),
            _ => None,
        }
    }

    /// All leaves depth-first in insertion order
    pub fn flatten(&self) -> Vec<(DataPath, &DataLeaf)> {
        let mut leaves = Vec::new();
        flatten_into(&self.root, &DataPath::root(), &mut leaves);
        leaves
    }

    /// Translatable leaves depth-first in insertion order
    pub fn translatable_leaves(&self) -> Vec<(DataPath, &DataLeaf)> {
        self.flatten()
            .into_iter()
            .filter(|(_, leaf)| leaf.translate)
            .collect()
    }

    /// Paths of all leaves, used where the tree is mutated while iterating
    pub fn leaf_paths(&self) -> Vec<DataPath> {
        self.flatten().into_iter().map(|(path, _)| path).collect()
    }

    /// Rebuild a tree from flattened leaves
    pub fn unflatten<I>(leaves: I) -> Result<Self, JobError>
    where
        I: IntoIterator<Item = (DataPath, DataLeaf)>,
    {
        let mut tree = Self::new();
        for (path, leaf) in leaves {
            tree.insert(&path, leaf)?;
        }
        Ok(tree)
    }

    /// Number of leaves, translatable or not
    pub fn len(&self) -> usize {
        self.flatten().len()
    }

    /// Whether the tree has no translatable leaves
    pub fn is_empty(&self) -> bool {
        self.translatable_leaves().is_empty()
    }

    /// Sum of the word counts of all translatable leaves
    pub fn word_count(&self) -> usize {
        self.flatten().iter().map(|(_, leaf)| leaf.word_count()).sum()
    }

    /// Counters of translatable leaves per status
    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for (_, leaf) in self.translatable_leaves() {
            match leaf.status {
                LeafStatus::Untranslated => counts.pending += 1,
                LeafStatus::NeedsReview => counts.translated += 1,
                LeafStatus::Translated => counts.reviewed += 1,
                LeafStatus::Accepted => counts.accepted += 1,
            }
        }
        counts
    }
}

fn flatten_into<'a>(
    children: &'a [(Segment, DataNode)],
    prefix: &DataPath,
    out: &mut Vec<(DataPath, &'a DataLeaf)>,
) {
    for (segment, node) in children {
        let path = prefix.child(segment.clone());
        match node {
            DataNode::Leaf(leaf) => out.push((path, leaf)),
            DataNode::Branch(nested) => flatten_into(nested, &path, out),
        }
    }
}
