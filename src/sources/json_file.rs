/*!
 * JSON document source plugin.
 *
 * The source id is the path of a JSON document. Objects become branches,
 * arrays become indexed branches and strings become leaves. Keys starting
 * with `$` carry metadata:
 * - `$label`: label of the document (top level only)
 * - `$format`: markup format of the strings in that object
 * - `$refs`: paths of related documents, relative to this one
 *
 * Translations are written to `{stem}.{target}.json` next to the source.
 */

use async_trait::async_trait;
use log::{debug, info, warn};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::data::{DataLeaf, DataPath, DataTree, Escaper, LeafStatus, Segment};
use crate::errors::SourceError;

use super::{SourcePlugin, SourceRef, SourceSuggestion};

/// Plugin id of the JSON source
pub const JSON_SOURCE_ID: &str = "json";

/// Source type used for documents
pub const JSON_SOURCE_TYPE: &str = "file";

/// Source plugin reading JSON documents
#[derive(Debug)]
pub struct JsonFileSource {
    escaper: Escaper,
}

impl JsonFileSource {
    /// Create the source
    pub fn new(escaper: Escaper) -> Self {
        Self { escaper }
    }

    /// Reference to a document
    pub fn reference(path: impl AsRef<Path>) -> SourceRef {
        SourceRef::new(
            JSON_SOURCE_ID,
            JSON_SOURCE_TYPE,
            path.as_ref().to_string_lossy().to_string(),
        )
    }

    /// Path of the translated document for `target_language`
    pub fn translation_path(source: &Path, target_language: &str) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "document".to_string());
        source.with_file_name(format!("{}.{}.json", stem, target_language))
    }

    async fn read_document(source: &SourceRef) -> Result<Map<String, Value>, SourceError> {
        let path = Path::new(&source.source_id);
        if !path.exists() {
            return Err(SourceError::NotFound(source.to_string()));
        }
        let content = tokio::fs::read_to_string(path).await?;
        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(SourceError::Parse(format!(
                "{} is not a JSON object",
                source.source_id
            ))),
            Err(e) => Err(SourceError::Parse(format!("{}: {}", source.source_id, e))),
        }
    }

    fn collect_leaves(
        value: &Value,
        path: &DataPath,
        format: &str,
        tree: &mut DataTree,
    ) -> Result<(), SourceError> {
        match value {
            Value::String(text) => {
                let label = path
                    .segments()
                    .last()
                    .map(|s| s.to_string())
                    .unwrap_or_default();
                let leaf = DataLeaf::new(text.clone())
                    .with_label(label)
                    .with_format(format);
                tree.insert(path, leaf)
                    .map_err(|e| SourceError::Parse(e.to_string()))?;
            }
            Value::Object(map) => {
                let format = map.get("$format").and_then(Value::as_str).unwrap_or(format);
                for (key, child) in map {
                    if key.starts_with('$') {
                        continue;
                    }
                    if key.is_empty() || key.contains(crate::data::PATH_DELIMITER) {
                        warn!("Skipping JSON key '{}' that cannot be addressed", key);
                        continue;
                    }
                    Self::collect_leaves(child, &path.child(Segment::key(key.clone())), format, tree)?;
                }
            }
            Value::Array(values) => {
                for (index, child) in values.iter().enumerate() {
                    Self::collect_leaves(child, &path.child(index), format, tree)?;
                }
            }
            // Numbers, booleans and null are copied through untouched
            _ => {}
        }
        Ok(())
    }

    fn replace_at(value: &mut Value, segments: &[Segment], translation: &str) -> bool {
        let Some((first, rest)) = segments.split_first() else {
            if value.is_string() {
                *value = Value::String(translation.to_string());
                return true;
            }
            return false;
        };
        let child = match (first, value) {
            (Segment::Key(key), Value::Object(map)) => map.get_mut(key),
            (Segment::Index(index), Value::Array(values)) => values.get_mut(*index as usize),
            (Segment::Index(index), Value::Object(map)) => map.get_mut(&index.to_string()),
            _ => None,
        };
        match child {
            Some(child) => Self::replace_at(child, rest, translation),
            None => false,
        }
    }
}

#[async_trait]
impl SourcePlugin for JsonFileSource {
    fn id(&self) -> &str {
        JSON_SOURCE_ID
    }

    async fn build_data_tree(&self, source: &SourceRef) -> Result<DataTree, SourceError> {
        let document = Self::read_document(source).await?;
        let mut tree = DataTree::new();
        Self::collect_leaves(&Value::Object(document), &DataPath::root(), "", &mut tree)?;
        self.escaper.escape_tree(&mut tree);
        debug!("Built data tree with {} leaves from {}", tree.len(), source.source_id);
        Ok(tree)
    }

    async fn label(&self, source: &SourceRef) -> Result<String, SourceError> {
        let document = Self::read_document(source).await?;
        if let Some(label) = document.get("$label").and_then(Value::as_str) {
            return Ok(label.to_string());
        }
        Ok(Path::new(&source.source_id)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| source.source_id.clone()))
    }

    async fn apply_translation(
        &self,
        source: &SourceRef,
        target_language: &str,
        data: &DataTree,
    ) -> Result<(), SourceError> {
        let mut document = Value::Object(Self::read_document(source).await?);

        for (path, leaf) in data.flatten() {
            if leaf.status != LeafStatus::Accepted {
                continue;
            }
            if let Some(translation) = &leaf.translation {
                if !Self::replace_at(&mut document, path.segments(), translation) {
                    warn!("Path {} no longer exists in {}", path, source.source_id);
                }
            }
        }

        let target = Self::translation_path(Path::new(&source.source_id), target_language);
        let content = serde_json::to_string_pretty(&document)
            .map_err(|e| SourceError::Parse(e.to_string()))?;
        tokio::fs::write(&target, content).await?;
        info!("Wrote translation to {}", target.display());
        Ok(())
    }

    async fn related(&self, source: &SourceRef) -> Result<Vec<SourceSuggestion>, SourceError> {
        let document = Self::read_document(source).await?;
        let Some(refs) = document.get("$refs").and_then(Value::as_array) else {
            return Ok(Vec::new());
        };
        let label = self.label(source).await?;
        let base = Path::new(&source.source_id)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Ok(refs
            .iter()
            .filter_map(Value::as_str)
            .map(|reference| SourceSuggestion {
                source: Self::reference(base.join(reference)),
                reason: format!("Referenced by {}", label),
            })
            .collect())
    }
}
