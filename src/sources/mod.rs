/*!
 * Source plugins.
 *
 * A source plugin knows how to pull translatable text out of one kind of
 * content and how to write accepted translations back:
 * - `memory`: in-process objects, used by tests and embedders
 * - `json`: JSON documents on disk, used by the command line
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};

use crate::data::DataTree;
use crate::errors::SourceError;

pub mod json_file;
pub mod memory;

pub use json_file::JsonFileSource;
pub use memory::MemorySource;

/// Reference to a source object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceRef {
    /// Source plugin id
    pub plugin: String,
    /// Kind of object within the plugin
    pub source_type: String,
    /// Object id
    pub source_id: String,
}

impl SourceRef {
    /// Create a reference
    pub fn new(
        plugin: impl Into<String>,
        source_type: impl Into<String>,
        source_id: impl Into<String>,
    ) -> Self {
        Self {
            plugin: plugin.into(),
            source_type: source_type.into(),
            source_id: source_id.into(),
        }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.plugin, self.source_type, self.source_id)
    }
}

/// An object related to another one, proposed for translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSuggestion {
    /// The related object
    pub source: SourceRef,
    /// Why it is proposed
    pub reason: String,
}

/// Interface of source plugins
#[async_trait]
pub trait SourcePlugin: Send + Sync + Debug {
    /// Plugin id, matching `SourceRef::plugin`
    fn id(&self) -> &str;

    /// Extract the translatable data of an object
    async fn build_data_tree(&self, source: &SourceRef) -> Result<DataTree, SourceError>;

    /// Human readable label of an object
    async fn label(&self, source: &SourceRef) -> Result<String, SourceError>;

    /// Write the accepted translations of `data` back
    async fn apply_translation(
        &self,
        source: &SourceRef,
        target_language: &str,
        data: &DataTree,
    ) -> Result<(), SourceError>;

    /// Objects related to `source` that could be translated along with it
    async fn related(&self, _source: &SourceRef) -> Result<Vec<SourceSuggestion>, SourceError> {
        Ok(Vec::new())
    }
}
