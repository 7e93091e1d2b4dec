/*!
 * In-process source plugin.
 *
 * Objects are registered up front with their label and data. Relations
 * between objects are declared explicitly and show up as suggestions, and
 * every applied translation is recorded so callers can inspect it.
 */

use async_trait::async_trait;
use log::debug;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::data::{DataTree, Escaper};
use crate::errors::SourceError;

use super::{SourcePlugin, SourceRef, SourceSuggestion};

/// Plugin id of the memory source
pub const MEMORY_SOURCE_ID: &str = "memory";

#[derive(Debug, Clone)]
struct MemoryObject {
    label: String,
    data: DataTree,
    related: Vec<SourceSuggestion>,
}

/// Translations written back to the memory source
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedTranslation {
    /// Object the translation was written to
    pub source: SourceRef,
    /// Target language
    pub target_language: String,
    /// Data tree as applied
    pub data: DataTree,
}

/// Source plugin keeping objects in memory
#[derive(Debug)]
pub struct MemorySource {
    escaper: Escaper,
    objects: RwLock<HashMap<(String, String), MemoryObject>>,
    applied: RwLock<Vec<AppliedTranslation>>,
}

impl MemorySource {
    /// Create an empty source
    pub fn new(escaper: Escaper) -> Self {
        Self {
            escaper,
            objects: RwLock::new(HashMap::new()),
            applied: RwLock::new(Vec::new()),
        }
    }

    /// Register an object, replacing any previous one with the same key
    pub fn insert(&self, source_type: &str, source_id: &str, label: &str, data: DataTree) -> SourceRef {
        self.objects.write().insert(
            (source_type.to_string(), source_id.to_string()),
            MemoryObject {
                label: label.to_string(),
                data,
                related: Vec::new(),
            },
        );
        SourceRef::new(MEMORY_SOURCE_ID, source_type, source_id)
    }

    /// Declare that `to` is related to `from`
    pub fn relate(&self, from: &SourceRef, to: &SourceRef, reason: &str) -> Result<(), SourceError> {
        let mut objects = self.objects.write();
        let object = objects
            .get_mut(&(from.source_type.clone(), from.source_id.clone()))
            .ok_or_else(|| SourceError::NotFound(from.to_string()))?;
        object.related.push(SourceSuggestion {
            source: to.clone(),
            reason: reason.to_string(),
        });
        Ok(())
    }

    /// Translations applied so far, oldest first
    pub fn applied(&self) -> Vec<AppliedTranslation> {
        self.applied.read().clone()
    }

    fn object(&self, source: &SourceRef) -> Result<MemoryObject, SourceError> {
        self.objects
            .read()
            .get(&(source.source_type.clone(), source.source_id.clone()))
            .cloned()
            .ok_or_else(|| SourceError::NotFound(source.to_string()))
    }
}

#[async_trait]
impl SourcePlugin for MemorySource {
    fn id(&self) -> &str {
        MEMORY_SOURCE_ID
    }

    async fn build_data_tree(&self, source: &SourceRef) -> Result<DataTree, SourceError> {
        let mut data = self.object(source)?.data;
        self.escaper.escape_tree(&mut data);
        Ok(data)
    }

    async fn label(&self, source: &SourceRef) -> Result<String, SourceError> {
        Ok(self.object(source)?.label)
    }

    async fn apply_translation(
        &self,
        source: &SourceRef,
        target_language: &str,
        data: &DataTree,
    ) -> Result<(), SourceError> {
        self.object(source)?;
        debug!("Applying {} translation to {}", target_language, source);
        self.applied.write().push(AppliedTranslation {
            source: source.clone(),
            target_language: target_language.to_string(),
            data: data.clone(),
        });
        Ok(())
    }

    async fn related(&self, source: &SourceRef) -> Result<Vec<SourceSuggestion>, SourceError> {
        Ok(self.object(source)?.related)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataLeaf, DataPath, DEFAULT_ESCAPE_PATTERNS};

    fn source() -> MemorySource {
        MemorySource::new(Escaper::new(&DEFAULT_ESCAPE_PATTERNS).unwrap())
    }

    #[tokio::test]
    async fn test_buildDataTree_shouldEscapeLeaves() {
        let source = source();
        let mut data = DataTree::new();
        data.insert(&DataPath::parse("title").unwrap(), DataLeaf::new("Hi @name"))
            .unwrap();
        let reference = source.insert("node", "1", "Node 1", data);

        let tree = source.build_data_tree(&reference).await.unwrap();
        let leaf = tree.get(&DataPath::parse("title").unwrap()).unwrap();
        assert_eq!(leaf.escape[&3].string, "@name");
        assert_eq!(source.label(&reference).await.unwrap(), "Node 1");
    }

    #[tokio::test]
    async fn test_buildDataTree_withUnknownObject_shouldBeNotFound() {
        let result = source()
            .build_data_tree(&SourceRef::new(MEMORY_SOURCE_ID, "node", "404"))
            .await;
        assert!(matches!(result, Err(SourceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_related_shouldReturnDeclaredRelations() {
        let source = source();
        let node = source.insert("node", "1", "Node", DataTree::new());
        let media = source.insert("media", "2", "Image", DataTree::new());
        source.relate(&node, &media, "Referenced media").unwrap();

        let related = source.related(&node).await.unwrap();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].source, media);
    }
}
