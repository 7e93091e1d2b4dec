/*!
 * Cache of supported target languages per translator.
 *
 * Asking a translator for its languages may be expensive, so the answer is
 * cached by translator id and source language until the translator binding
 * changes.
 */

use log::debug;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// Cache port for supported target languages
pub trait LanguageCache: Send + Sync + Debug {
    /// Cached languages for a translator and source language
    fn get(&self, translator: &str, source_language: &str) -> Option<Vec<String>>;

    /// Store the languages for a translator and source language
    fn set(&self, translator: &str, source_language: &str, languages: Vec<String>);

    /// Drop every entry of a translator
    fn invalidate(&self, translator: &str);
}

/// In-memory language cache
#[derive(Debug, Default, Clone)]
pub struct MemoryLanguageCache {
    entries: Arc<RwLock<HashMap<(String, String), Vec<String>>>>,
    hits: Arc<RwLock<usize>>,
    misses: Arc<RwLock<usize>>,
}

impl MemoryLanguageCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Hits and misses so far
    pub fn stats(&self) -> (usize, usize) {
        (*self.hits.read(), *self.misses.read())
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl LanguageCache for MemoryLanguageCache {
    fn get(&self, translator: &str, source_language: &str) -> Option<Vec<String>> {
        let key = (translator.to_string(), source_language.to_string());
        match self.entries.read().get(&key) {
            Some(languages) => {
                *self.hits.write() += 1;
                debug!("Language cache hit for {} ({})", translator, source_language);
                Some(languages.clone())
            }
            None => {
                *self.misses.write() += 1;
                debug!("Language cache miss for {} ({})", translator, source_language);
                None
            }
        }
    }

    fn set(&self, translator: &str, source_language: &str, languages: Vec<String>) {
        self.entries
            .write()
            .insert((translator.to_string(), source_language.to_string()), languages);
    }

    fn invalidate(&self, translator: &str) {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(id, _), _| id != translator);
        debug!(
            "Invalidated {} language cache entries of {}",
            before - entries.len(),
            translator
        );
    }
}
