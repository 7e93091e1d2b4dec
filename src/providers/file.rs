/*!
 * Exchange file translator.
 *
 * Instead of translating, this plugin writes the job to an exchange file in
 * the export directory. The translated file comes back later through an
 * import. Settings:
 * - `export_format`: id of the exchange format (`xlf` or `html`)
 * - `xliff_processing`: mask markup as XLIFF inline elements
 */

use async_trait::async_trait;
use log::{debug, info};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

use crate::database::models::ExportRecord;
use crate::errors::ProviderError;
use crate::exchange::{export_file_name, ExchangeFormat, ExportOptions};
use crate::file_utils::FileManager;
use crate::job::{Job, Settings};
use crate::providers::{
    resolve_flag, resolve_setting, Translator, TranslatorOutcome, TranslatorPlugin, ANY_LANGUAGE,
    AUTO_ACCEPT_SETTING,
};

/// Plugin id of the file translator
pub const FILE_TRANSLATOR_ID: &str = "file";

/// Setting naming the exchange format
pub const EXPORT_FORMAT_SETTING: &str = "export_format";

/// Setting enabling inline element masking
pub const XLIFF_PROCESSING_SETTING: &str = "xliff_processing";

/// Translator plugin writing exchange files
#[derive(Debug)]
pub struct FileTranslator {
    export_directory: PathBuf,
    formats: Vec<Arc<dyn ExchangeFormat>>,
}

impl FileTranslator {
    /// Create a file translator exporting into `export_directory`
    pub fn new(export_directory: impl Into<PathBuf>, formats: Vec<Arc<dyn ExchangeFormat>>) -> Self {
        Self {
            export_directory: export_directory.into(),
            formats,
        }
    }

    fn format(&self, id: &str) -> Result<&Arc<dyn ExchangeFormat>, ProviderError> {
        self.formats
            .iter()
            .find(|format| format.id() == id)
            .ok_or_else(|| ProviderError::RequestFailed(format!("Unknown export format '{}'", id)))
    }
}

#[async_trait]
impl TranslatorPlugin for FileTranslator {
    fn id(&self) -> &str {
        FILE_TRANSLATOR_ID
    }

    fn default_settings(&self) -> Settings {
        let mut settings = Settings::new();
        settings.insert(AUTO_ACCEPT_SETTING.to_string(), Value::Bool(false));
        settings.insert(EXPORT_FORMAT_SETTING.to_string(), Value::String("xlf".to_string()));
        settings.insert(XLIFF_PROCESSING_SETTING.to_string(), Value::Bool(true));
        settings
    }

    async fn is_available(&self, _translator: &Translator) -> bool {
        !self.formats.is_empty()
    }

    async fn supported_target_languages(
        &self,
        _translator: &Translator,
        _source_language: &str,
    ) -> Result<Vec<String>, ProviderError> {
        Ok(vec![ANY_LANGUAGE.to_string()])
    }

    async fn request_translation(
        &self,
        job: &Job,
        translator: &Translator,
    ) -> Result<TranslatorOutcome, ProviderError> {
        let defaults = self.default_settings();
        let format_id = resolve_setting(job, translator, &defaults, EXPORT_FORMAT_SETTING)
            .and_then(|value| value.as_str().map(str::to_string))
            .unwrap_or_else(|| "xlf".to_string());
        let format = self.format(&format_id)?;
        let options = ExportOptions {
            xliff_processing: resolve_flag(job, translator, &defaults, XLIFF_PROCESSING_SETTING),
        };

        let bytes = format
            .export(job, &options)
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        let path = FileManager::export_path(&self.export_directory, &export_file_name(job, format.id()));
        FileManager::write_bytes(&path, &bytes).map_err(|e| ProviderError::Io(format!("{:#}", e)))?;

        let location = path.to_string_lossy().to_string();
        let digest = FileManager::digest(&bytes);
        debug!("Exported job {} ({} bytes, sha256 {})", job.id, bytes.len(), digest);
        info!("Exported job {} to {}", job.id, location);

        Ok(TranslatorOutcome::Submitted {
            message: format!("Exported {} file to {}", format.label(), location),
            export: Some(ExportRecord::new(job.id, format.id(), &digest, &location)),
        })
    }
}
