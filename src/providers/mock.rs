/*!
 * Mock translator for testing.
 *
 * The mock translates every translatable leaf synchronously to
 * `"{target language}_{source text}"`. Protected substrings travel through
 * its own escape markers, so a translation run also exercises escaping.
 *
 * Behaviors:
 * - `MockTranslator::working()` - always translates
 * - `MockTranslator::unavailable()` - reports itself as unavailable
 * - `MockTranslator::rejecting()` - rejects every job
 * - `MockTranslator::failing()` - fails every request with an error
 * - `MockTranslator::refusing_abort()` - translates but refuses to abort
 */

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::data::{apply_escape, unescape, EscapeMarkers};
use crate::errors::ProviderError;
use crate::job::Job;
use crate::providers::{
    ItemTranslation, Translator, TranslatorOutcome, TranslatorPlugin, ANY_LANGUAGE,
};

/// Plugin id of the mock translator
pub const MOCK_TRANSLATOR_ID: &str = "mock";

/// Behavior mode for the mock translator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    /// Always translates
    Working,
    /// `is_available` returns false
    Unavailable,
    /// Rejects every job
    Rejecting,
    /// Always fails with an error
    Failing,
    /// Translates, but refuses to abort
    RefusingAbort,
}

/// Mock translator plugin
#[derive(Debug)]
pub struct MockTranslator {
    id: String,
    behavior: MockBehavior,
    /// Supported (source, target) pairs, `*` matches any language
    language_pairs: Vec<(String, String)>,
    /// Number of translation requests, shared between clones
    request_count: Arc<AtomicUsize>,
    markers: EscapeMarkers,
}

impl MockTranslator {
    /// Create a new mock translator with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            id: MOCK_TRANSLATOR_ID.to_string(),
            behavior,
            language_pairs: vec![(ANY_LANGUAGE.to_string(), ANY_LANGUAGE.to_string())],
            request_count: Arc::new(AtomicUsize::new(0)),
            markers: EscapeMarkers::private_use(),
        }
    }

    /// Create a working mock translator
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a mock translator that is not available
    pub fn unavailable() -> Self {
        Self::new(MockBehavior::Unavailable)
    }

    /// Create a mock translator that rejects every job
    pub fn rejecting() -> Self {
        Self::new(MockBehavior::Rejecting)
    }

    /// Create a failing mock translator
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create a mock translator that refuses to abort
    pub fn refusing_abort() -> Self {
        Self::new(MockBehavior::RefusingAbort)
    }

    /// Register the plugin under a different id
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    /// Restrict the supported language pairs
    pub fn with_language_pairs(mut self, pairs: &[(&str, &str)]) -> Self {
        self.language_pairs = pairs
            .iter()
            .map(|(source, target)| (source.to_string(), target.to_string()))
            .collect();
        self
    }

    /// Number of translation requests received
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    fn translate(&self, job: &Job) -> Vec<ItemTranslation> {
        job.items
            .iter()
            .map(|item| ItemTranslation {
                item_id: item.id,
                translations: item
                    .data
                    .translatable_leaves()
                    .into_iter()
                    .map(|(path, leaf)| {
                        let marked = apply_escape(&leaf.text, &leaf.escape, &self.markers);
                        let translated = format!("{}_{}", job.target_language, marked);
                        (path, unescape(&translated, &self.markers))
                    })
                    .collect(),
            })
            .collect()
    }
}

impl Clone for MockTranslator {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            behavior: self.behavior,
            language_pairs: self.language_pairs.clone(),
            request_count: Arc::clone(&self.request_count),
            markers: self.markers.clone(),
        }
    }
}

#[async_trait]
impl TranslatorPlugin for MockTranslator {
    fn id(&self) -> &str {
        &self.id
    }

    async fn is_available(&self, _translator: &Translator) -> bool {
        self.behavior != MockBehavior::Unavailable
    }

    async fn supported_target_languages(
        &self,
        _translator: &Translator,
        source_language: &str,
    ) -> Result<Vec<String>, ProviderError> {
        Ok(self
            .language_pairs
            .iter()
            .filter(|(source, _)| source == ANY_LANGUAGE || source == source_language)
            .map(|(_, target)| target.clone())
            .collect())
    }

    async fn request_translation(
        &self,
        job: &Job,
        _translator: &Translator,
    ) -> Result<TranslatorOutcome, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);

        match self.behavior {
            MockBehavior::Working | MockBehavior::RefusingAbort => {
                Ok(TranslatorOutcome::Translated(self.translate(job)))
            }
            MockBehavior::Rejecting => Ok(TranslatorOutcome::Rejected(format!(
                "Simulated rejection of job {}",
                job.id
            ))),
            MockBehavior::Failing => Err(ProviderError::RequestFailed(format!(
                "Simulated translator failure (request #{})",
                count + 1
            ))),
            MockBehavior::Unavailable => Err(ProviderError::ConnectionError(
                "Simulated unavailable translator".to_string(),
            )),
        }
    }

    async fn abort_translation(&self, _job: &Job, _translator: &Translator) -> Result<bool, ProviderError> {
        Ok(self.behavior != MockBehavior::RefusingAbort)
    }
}
