/*!
 * Registry of plugins and translator bindings.
 *
 * Source plugins, translator plugins and exchange formats are registered
 * once at startup under their id. Lookups of unknown ids fail with
 * `JobError::NotFound`.
 */

use log::{debug, info};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::app_config::Config;
use crate::data::Escaper;
use crate::errors::JobError;
use crate::exchange::{ExchangeFormat, HtmlFormat, XliffFormat};
use crate::providers::{FileTranslator, MockTranslator, Translator, TranslatorPlugin};
use crate::sources::{JsonFileSource, SourcePlugin};

/// Plugins and translator bindings by id
#[derive(Debug, Default)]
pub struct Registry {
    sources: RwLock<HashMap<String, Arc<dyn SourcePlugin>>>,
    translator_plugins: RwLock<HashMap<String, Arc<dyn TranslatorPlugin>>>,
    formats: RwLock<BTreeMap<String, Arc<dyn ExchangeFormat>>>,
    translators: RwLock<BTreeMap<String, Translator>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in plugins and the configured translators
    pub fn with_defaults(config: &Config) -> Result<Self, JobError> {
        let escaper = Escaper::new(&config.escape_patterns)?;
        let registry = Self::new();

        registry.register_format(Arc::new(XliffFormat::new()));
        registry.register_format(Arc::new(HtmlFormat::new()));
        registry.register_source(Arc::new(JsonFileSource::new(escaper)));
        registry.register_translator_plugin(Arc::new(FileTranslator::new(
            config.export_directory.clone(),
            registry.formats(),
        )));
        registry.register_translator_plugin(Arc::new(MockTranslator::working()));

        for translator in &config.translators {
            registry.add_translator(translator.clone())?;
        }

        info!(
            "Registered {} translators, {} exchange formats",
            registry.translators().len(),
            registry.formats().len()
        );
        Ok(registry)
    }

    /// Register a source plugin under its id
    pub fn register_source(&self, source: Arc<dyn SourcePlugin>) {
        debug!("Registering source plugin '{}'", source.id());
        self.sources.write().insert(source.id().to_string(), source);
    }

    /// Register a translator plugin under its id
    pub fn register_translator_plugin(&self, plugin: Arc<dyn TranslatorPlugin>) {
        debug!("Registering translator plugin '{}'", plugin.id());
        self.translator_plugins
            .write()
            .insert(plugin.id().to_string(), plugin);
    }

    /// Register an exchange format under its id
    pub fn register_format(&self, format: Arc<dyn ExchangeFormat>) {
        debug!("Registering exchange format '{}'", format.id());
        self.formats.write().insert(format.id().to_string(), format);
    }

    /// Add or replace a translator binding; its plugin must be registered
    pub fn add_translator(&self, translator: Translator) -> Result<(), JobError> {
        self.translator_plugin(&translator.plugin)?;
        debug!("Binding translator '{}' to plugin '{}'", translator.id, translator.plugin);
        self.translators
            .write()
            .insert(translator.id.clone(), translator);
        Ok(())
    }

    /// Remove a translator binding
    pub fn remove_translator(&self, id: &str) -> Result<Translator, JobError> {
        self.translators
            .write()
            .remove(id)
            .ok_or_else(|| JobError::NotFound(format!("translator '{}'", id)))
    }

    /// A source plugin
    pub fn source(&self, id: &str) -> Result<Arc<dyn SourcePlugin>, JobError> {
        self.sources
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| JobError::NotFound(format!("source plugin '{}'", id)))
    }

    /// All source plugins
    pub fn sources(&self) -> Vec<Arc<dyn SourcePlugin>> {
        self.sources.read().values().cloned().collect()
    }

    /// A translator plugin
    pub fn translator_plugin(&self, id: &str) -> Result<Arc<dyn TranslatorPlugin>, JobError> {
        self.translator_plugins
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| JobError::NotFound(format!("translator plugin '{}'", id)))
    }

    /// A translator binding
    pub fn translator(&self, id: &str) -> Result<Translator, JobError> {
        self.translators
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| JobError::NotFound(format!("translator '{}'", id)))
    }

    /// All translator bindings, ordered by id
    pub fn translators(&self) -> Vec<Translator> {
        self.translators.read().values().cloned().collect()
    }

    /// An exchange format
    pub fn format(&self, id: &str) -> Result<Arc<dyn ExchangeFormat>, JobError> {
        self.formats
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| JobError::NotFound(format!("exchange format '{}'", id)))
    }

    /// All exchange formats, ordered by id
    pub fn formats(&self) -> Vec<Arc<dyn ExchangeFormat>> {
        self.formats.read().values().cloned().collect()
    }
}
