/*!
 * Translator plugins.
 *
 * A translator plugin does the actual translation work for a job. It is
 * used through a configured `Translator` binding that carries its own
 * settings:
 * - `file`: exports exchange files for human or external translation
 * - `mock`: deterministic local translator used by tests and demos
 * - `language_cache`: cache port for supported target languages
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::data::DataPath;
use crate::database::models::ExportRecord;
use crate::errors::ProviderError;
use crate::job::{Job, Settings};

pub mod file;
pub mod language_cache;
pub mod mock;

pub use file::FileTranslator;
pub use language_cache::{LanguageCache, MemoryLanguageCache};
pub use mock::{MockBehavior, MockTranslator};

/// Wildcard entry in a list of supported languages
pub const ANY_LANGUAGE: &str = "*";

/// Setting that accepts synchronous translations without review
pub const AUTO_ACCEPT_SETTING: &str = "auto_accept";

/// A configured binding of a translator plugin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Translator {
    /// Unique translator id
    pub id: String,
    /// Human readable name
    #[serde(default)]
    pub label: String,
    /// Id of the plugin doing the work
    pub plugin: String,
    /// Translator level settings
    #[serde(default)]
    pub settings: Settings,
}

impl Translator {
    /// Create a binding without settings
    pub fn new(id: impl Into<String>, plugin: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            plugin: plugin.into(),
            settings: Settings::new(),
        }
    }

    /// Set a translator level setting
    pub fn with_setting(mut self, key: &str, value: serde_json::Value) -> Self {
        self.settings.insert(key.to_string(), value);
        self
    }
}

/// Translations a synchronous translator produced for one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemTranslation {
    /// Job item id
    pub item_id: i64,
    /// Translated text per leaf path
    pub translations: Vec<(DataPath, String)>,
}

/// Result of handing a job to a translator
#[derive(Debug, Clone, PartialEq)]
pub enum TranslatorOutcome {
    /// The translations are available right away
    Translated(Vec<ItemTranslation>),
    /// The job was sent out; translations arrive later through an import
    Submitted {
        /// Status message for the operator
        message: String,
        /// Exchange file written for the job, if any
        export: Option<ExportRecord>,
    },
    /// The translator will not process the job
    Rejected(String),
}

/// Interface of translator plugins
#[async_trait]
pub trait TranslatorPlugin: Send + Sync + Debug {
    /// Plugin id, matching `Translator::plugin`
    fn id(&self) -> &str;

    /// Settings used when neither the job nor the translator sets a key
    fn default_settings(&self) -> Settings {
        let mut settings = Settings::new();
        settings.insert(AUTO_ACCEPT_SETTING.to_string(), serde_json::Value::Bool(false));
        settings
    }

    /// Whether the plugin can be used at all
    async fn is_available(&self, translator: &Translator) -> bool;

    /// Target languages reachable from `source_language`
    ///
    /// May contain `ANY_LANGUAGE`.
    async fn supported_target_languages(
        &self,
        translator: &Translator,
        source_language: &str,
    ) -> Result<Vec<String>, ProviderError>;

    /// Hand the job over for translation
    async fn request_translation(
        &self,
        job: &Job,
        translator: &Translator,
    ) -> Result<TranslatorOutcome, ProviderError>;

    /// Cancel a running translation; `false` when the translator refuses
    async fn abort_translation(&self, _job: &Job, _translator: &Translator) -> Result<bool, ProviderError> {
        Ok(true)
    }
}

/// Look up a setting: job first, then the translator, then plugin defaults
pub fn resolve_setting(
    job: &Job,
    translator: &Translator,
    defaults: &Settings,
    key: &str,
) -> Option<serde_json::Value> {
    job.setting(key)
        .or_else(|| translator.settings.get(key))
        .or_else(|| defaults.get(key))
        .cloned()
}

/// Boolean setting, `false` unless explicitly true
pub fn resolve_flag(job: &Job, translator: &Translator, defaults: &Settings, key: &str) -> bool {
    resolve_setting(job, translator, defaults, key)
        .and_then(|value| value.as_bool())
        .unwrap_or(false)
}

/// Whether `target_language` appears in a supported language list
pub fn supports_language(supported: &[String], target_language: &str) -> bool {
    supported
        .iter()
        .any(|language| language == ANY_LANGUAGE || language.eq_ignore_ascii_case(target_language))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolveSetting_shouldPreferJobThenTranslatorThenDefaults() {
        let mut job = Job::new("en", "de").unwrap();
        let translator = Translator::new("files", "file")
            .with_setting("export_format", json!("html"))
            .with_setting("xliff_processing", json!(false));
        let mut defaults = Settings::new();
        defaults.insert("export_format".to_string(), json!("xlf"));
        defaults.insert(AUTO_ACCEPT_SETTING.to_string(), json!(false));

        assert_eq!(
            resolve_setting(&job, &translator, &defaults, "export_format"),
            Some(json!("html"))
        );
        assert!(!resolve_flag(&job, &translator, &defaults, AUTO_ACCEPT_SETTING));

        job.settings.insert(AUTO_ACCEPT_SETTING.to_string(), json!(true));
        assert!(resolve_flag(&job, &translator, &defaults, AUTO_ACCEPT_SETTING));
        assert_eq!(resolve_setting(&job, &translator, &defaults, "missing"), None);
    }

    #[test]
    fn test_supportsLanguage_shouldHonorWildcard() {
        assert!(supports_language(&["*".to_string()], "de"));
        assert!(supports_language(&["fr".to_string(), "DE".to_string()], "de"));
        assert!(!supports_language(&["fr".to_string()], "de"));
        assert!(!supports_language(&[], "de"));
    }
}
