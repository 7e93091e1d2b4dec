/*!
 * Job manager service.
 *
 * Every operation on a stored job goes through the manager. It loads the
 * job, applies the change under the job's lock, stores the result and
 * records a message for the operator. Failures concerning an existing job
 * are recorded as error messages before they are returned.
 */

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::data::DataPath;
use crate::database::models::JobSummary;
use crate::database::Repository;
use crate::errors::JobError;
use crate::exchange::{apply_document, ExchangeDocument, ExportOptions, ImportReport};
use crate::language_utils::language_codes_match;
use crate::providers::{
    resolve_flag, supports_language, LanguageCache, Translator, TranslatorOutcome,
    TranslatorPlugin, AUTO_ACCEPT_SETTING,
};
use crate::registry::Registry;
use crate::sources::SourceRef;
use crate::suggestions::{Suggestion, SuggestionEngine};

use super::{Job, JobItem, JobMessage, JobState, LeafUpdate, MessageSeverity, Settings};

/// What happened when a job was handed to its translator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Translations were stored right away
    Translated {
        /// Leaves that received a translation
        updated: usize,
        /// Whether the job finished because everything was accepted
        finished: bool,
    },
    /// The job was sent out and waits for an import
    Submitted {
        /// Where the exchange file was written, if any
        location: Option<String>,
        /// Whether the same content had been exported before
        reexport: bool,
    },
    /// The translator rejected the job
    Rejected(String),
}

/// Runs job operations against storage, plugins and the language cache
pub struct JobManager {
    repo: Repository,
    registry: Arc<Registry>,
    cache: Arc<dyn LanguageCache>,
    locks: Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
}

/// Exclusive access to one job, released on drop
///
/// The lock entry is removed from the map once nobody else holds or waits
/// for it.
struct JobGuard<'a> {
    job_id: i64,
    guard: Option<OwnedMutexGuard<()>>,
    locks: &'a Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
}

impl Drop for JobGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.lock();
        if locks
            .get(&self.job_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.job_id);
        }
    }
}

impl JobManager {
    /// Create a manager
    pub fn new(repo: Repository, registry: Arc<Registry>, cache: Arc<dyn LanguageCache>) -> Self {
        Self {
            repo,
            registry,
            cache,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// The plugin registry
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    // =========================================================================
    // Job creation and items
    // =========================================================================

    /// Create and store a job
    pub async fn create_job(
        &self,
        source_language: &str,
        target_language: &str,
        translator: Option<&str>,
        settings: Settings,
    ) -> Result<Job, JobError> {
        let mut job = Job::new(source_language, target_language)?;
        if let Some(translator) = translator {
            self.registry.translator(translator)?;
            job.set_translator(translator, settings)?;
        } else {
            job.settings = settings;
        }

        let job = self.save(&job).await?;
        info!(
            "Created job {} ({} -> {})",
            job.id, job.source_language, job.target_language
        );
        self.record(job.id, None, MessageSeverity::Status, "The job has been created.")
            .await;
        Ok(job)
    }

    /// Bind a translator before submission
    pub async fn set_translator(
        &self,
        job_id: i64,
        translator: &str,
        settings: Settings,
    ) -> Result<Job, JobError> {
        let _guard = self.lock_job(job_id).await;
        let result = async {
            let mut job = self.load(job_id).await?;
            let binding = self.registry.translator(translator)?;
            job.set_translator(&binding.id, settings)?;
            job.touch();
            let job = self.save(&job).await?;
            self.record(
                job_id,
                None,
                MessageSeverity::Status,
                format!("The translator {} has been selected.", binding.label),
            )
            .await;
            Ok(job)
        }
        .await;
        self.report(job_id, result).await
    }

    /// Build an item from a source object and add it to the job
    pub async fn add_item(
        &self,
        job_id: i64,
        source: SourceRef,
        allow_duplicate: bool,
    ) -> Result<JobItem, JobError> {
        let _guard = self.lock_job(job_id).await;
        let result = async {
            let mut job = self.load(job_id).await?;
            let plugin = self.registry.source(&source.plugin)?;
            let data = plugin.build_data_tree(&source).await?;
            let label = plugin.label(&source).await?;
            self.insert_item(&mut job, JobItem::new(source, label, data), allow_duplicate)
                .await
        }
        .await;
        self.report(job_id, result).await
    }

    /// Add an item built elsewhere, e.g. an accepted suggestion
    pub async fn add_existing_item(&self, job_id: i64, item: JobItem) -> Result<JobItem, JobError> {
        let _guard = self.lock_job(job_id).await;
        let result = async {
            let mut job = self.load(job_id).await?;
            self.insert_item(&mut job, item, false).await
        }
        .await;
        self.report(job_id, result).await
    }

    async fn insert_item(
        &self,
        job: &mut Job,
        item: JobItem,
        allow_duplicate: bool,
    ) -> Result<JobItem, JobError> {
        job.add_item(item, allow_duplicate)?;
        job.touch();
        let saved = self.save(job).await?;
        let item = saved
            .items
            .last()
            .cloned()
            .ok_or_else(|| JobError::Storage(format!("job {} lost its items", job.id)))?;
        self.record(
            job.id,
            Some(item.id),
            MessageSeverity::Status,
            format!("{} ({} words) has been added.", item.label, item.word_count()),
        )
        .await;
        Ok(item)
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Hand an unprocessed or rejected job to its translator
    pub async fn request_translation(&self, job_id: i64) -> Result<RequestOutcome, JobError> {
        let _guard = self.lock_job(job_id).await;
        let result = async {
            let job = self.load(job_id).await?;
            if !matches!(job.state, JobState::Unprocessed | JobState::Rejected) {
                return Err(JobError::InvalidState(format!(
                    "job {} is {} and cannot be submitted",
                    job_id, job.state
                )));
            }
            self.submit(job).await
        }
        .await;
        self.report(job_id, result).await
    }

    /// Submit an aborted job again
    pub async fn resubmit(&self, job_id: i64) -> Result<RequestOutcome, JobError> {
        let _guard = self.lock_job(job_id).await;
        let result = async {
            let job = self.load(job_id).await?;
            if job.state != JobState::Aborted {
                return Err(JobError::InvalidState(format!(
                    "job {} is {}, only aborted jobs can be resubmitted",
                    job_id, job.state
                )));
            }
            self.submit(job).await
        }
        .await;
        self.report(job_id, result).await
    }

    /// Whether the job's translator can take the job
    ///
    /// Fails with `NotAvailable` or `UnsupportedLanguagePair`.
    pub async fn can_translate(&self, job: &Job) -> Result<(), JobError> {
        self.check_translator(job).await.map(|_| ())
    }

    async fn check_translator(
        &self,
        job: &Job,
    ) -> Result<(Translator, Arc<dyn TranslatorPlugin>), JobError> {
        let translator_id = job
            .translator
            .as_deref()
            .ok_or_else(|| JobError::NotAvailable(format!("job {} has no translator", job.id)))?;
        let binding = self
            .registry
            .translator(translator_id)
            .map_err(|_| JobError::NotAvailable(format!("translator {} is not configured", translator_id)))?;
        let plugin = self
            .registry
            .translator_plugin(&binding.plugin)
            .map_err(|_| JobError::NotAvailable(format!("plugin {} is not installed", binding.plugin)))?;

        if !plugin.is_available(&binding).await {
            return Err(JobError::NotAvailable(format!("{} is not available", binding.label)));
        }

        let languages = match self.cache.get(&binding.id, &job.source_language) {
            Some(languages) => languages,
            None => {
                let languages = plugin
                    .supported_target_languages(&binding, &job.source_language)
                    .await
                    .map_err(|e| JobError::NotAvailable(format!("{}: {}", binding.label, e)))?;
                self.cache
                    .set(&binding.id, &job.source_language, languages.clone());
                languages
            }
        };

        if !supports_language(&languages, &job.target_language) {
            return Err(JobError::UnsupportedLanguagePair {
                translator: binding.label.clone(),
                source_language: job.source_language.clone(),
                target_language: job.target_language.clone(),
            });
        }
        Ok((binding, plugin))
    }

    /// Activate the job and run its translator; checks leave the job untouched
    async fn submit(&self, mut job: Job) -> Result<RequestOutcome, JobError> {
        if job.items.is_empty() {
            return Err(JobError::InvalidState(format!("job {} has no items", job.id)));
        }
        let (binding, plugin) = self.check_translator(&job).await?;

        job.transition(JobState::Active)?;
        for item in &mut job.items {
            item.activate();
        }
        info!("Submitting job {} to {}", job.id, binding.label);

        let outcome = match plugin.request_translation(&job, &binding).await {
            Ok(outcome) => outcome,
            Err(e) => {
                job.transition(JobState::Rejected)?;
                self.save(&job).await?;
                return Err(JobError::Provider(e));
            }
        };

        match outcome {
            TranslatorOutcome::Translated(translations) => {
                let job_id = job.id;
                let mut updated = 0;
                for translation in translations {
                    let Ok(item) = job.item_mut(translation.item_id) else {
                        self.record(
                            job_id,
                            None,
                            MessageSeverity::Warning,
                            format!("The translator returned unknown item {}.", translation.item_id),
                        )
                        .await;
                        continue;
                    };
                    for (path, text) in &translation.translations {
                        match item.set_translation(path, text) {
                            Ok(LeafUpdate::Updated) => updated += 1,
                            Ok(_) => {}
                            Err(e) => {
                                let item_id = item.id;
                                self.record(job_id, Some(item_id), MessageSeverity::Warning, e.to_string())
                                    .await
                            }
                        }
                    }
                }

                let defaults = plugin.default_settings();
                if resolve_flag(&job, &binding, &defaults, AUTO_ACCEPT_SETTING) {
                    for item in &mut job.items {
                        item.accept_translation()?;
                    }
                }
                let finished = job.all_accepted();
                if finished {
                    self.finish(&mut job).await?;
                }
                self.save(&job).await?;
                self.record(
                    job.id,
                    None,
                    MessageSeverity::Status,
                    format!("The translation job has been submitted, {} leaves translated.", updated),
                )
                .await;
                Ok(RequestOutcome::Translated { updated, finished })
            }
            TranslatorOutcome::Submitted { message, export } => {
                job.busy = true;
                let mut reexport = false;
                let mut location = None;
                if let Some(export) = &export {
                    reexport = self
                        .repo
                        .latest_export(job.id)
                        .await?
                        .is_some_and(|previous| previous.digest == export.digest);
                    location = Some(export.location.clone());
                }
                self.save(&job).await?;
                if let Some(export) = &export {
                    self.repo.record_export(export).await?;
                }
                let message = if reexport {
                    format!("{} (unchanged re-export)", message)
                } else {
                    message
                };
                self.record(job.id, None, MessageSeverity::Status, message).await;
                Ok(RequestOutcome::Submitted { location, reexport })
            }
            TranslatorOutcome::Rejected(reason) => {
                job.transition(JobState::Rejected)?;
                self.save(&job).await?;
                self.record(
                    job.id,
                    None,
                    MessageSeverity::Error,
                    format!("The translation job has been rejected: {}", reason),
                )
                .await;
                Ok(RequestOutcome::Rejected(reason))
            }
        }
    }

    // =========================================================================
    // Abort and reject
    // =========================================================================

    /// Abort the job and every item that has nothing accepted yet
    ///
    /// Items with accepted leaves keep their state; a warning is recorded for
    /// each of them.
    pub async fn abort_job(&self, job_id: i64) -> Result<Job, JobError> {
        let _guard = self.lock_job(job_id).await;
        let result = async {
            let mut job = self.load(job_id).await?;
            if !job.state.can_transition_to(JobState::Aborted) {
                return Err(JobError::InvalidState(format!(
                    "job {} is {} and cannot be aborted",
                    job_id, job.state
                )));
            }

            if job.state == JobState::Active {
                if let Ok((binding, plugin)) = self.plugin_of(&job) {
                    match plugin.abort_translation(&job, &binding).await {
                        Ok(true) => {}
                        Ok(false) => return Err(JobError::AbortRefused(job_id)),
                        Err(e) => return Err(JobError::Provider(e)),
                    }
                }
            }

            let mut refused = Vec::new();
            for item in &mut job.items {
                if let Err(e) = item.abort() {
                    refused.push((item.id, e));
                }
            }
            for (item_id, e) in refused {
                self.record(job_id, Some(item_id), MessageSeverity::Warning, e.to_string())
                    .await;
            }

            job.transition(JobState::Aborted)?;
            job.busy = false;
            let job = self.save(&job).await?;
            self.record(job_id, None, MessageSeverity::Status, "The translation job has been aborted.")
                .await;
            Ok(job)
        }
        .await;
        self.report(job_id, result).await
    }

    /// Mark an active job as rejected by its translator
    pub async fn reject_job(&self, job_id: i64, reason: &str) -> Result<Job, JobError> {
        let _guard = self.lock_job(job_id).await;
        let result = async {
            let mut job = self.load(job_id).await?;
            job.transition(JobState::Rejected)?;
            job.busy = false;
            let job = self.save(&job).await?;
            self.record(
                job_id,
                None,
                MessageSeverity::Error,
                format!("The translation job has been rejected: {}", reason),
            )
            .await;
            Ok(job)
        }
        .await;
        self.report(job_id, result).await
    }

    fn plugin_of(&self, job: &Job) -> Result<(Translator, Arc<dyn TranslatorPlugin>), JobError> {
        let id = job
            .translator
            .as_deref()
            .ok_or_else(|| JobError::NotAvailable(format!("job {} has no translator", job.id)))?;
        let binding = self.registry.translator(id)?;
        let plugin = self.registry.translator_plugin(&binding.plugin)?;
        Ok((binding, plugin))
    }

    // =========================================================================
    // Review
    // =========================================================================

    /// Store a translation written by a person; it waits for review
    pub async fn submit_translation(
        &self,
        job_id: i64,
        item_id: i64,
        path: &DataPath,
        text: &str,
    ) -> Result<JobItem, JobError> {
        self.update_item(job_id, item_id, |item| item.submit_translation(path, text))
            .await
    }

    /// Mark a translated leaf as reviewed
    pub async fn review_leaf(&self, job_id: i64, item_id: i64, path: &DataPath) -> Result<JobItem, JobError> {
        self.update_item(job_id, item_id, |item| item.review_leaf(path)).await
    }

    /// Send a leaf back for translation
    pub async fn reject_leaf(
        &self,
        job_id: i64,
        item_id: i64,
        path: &DataPath,
        reason: &str,
    ) -> Result<JobItem, JobError> {
        let item = self
            .update_item(job_id, item_id, |item| item.reject_leaf(path))
            .await?;
        self.record(
            job_id,
            Some(item_id),
            MessageSeverity::Warning,
            format!("The translation of {} has been rejected: {}", path, reason),
        )
        .await;
        Ok(item)
    }

    async fn update_item<F>(&self, job_id: i64, item_id: i64, update: F) -> Result<JobItem, JobError>
    where
        F: FnOnce(&mut JobItem) -> Result<(), JobError>,
    {
        let _guard = self.lock_job(job_id).await;
        let result = async {
            let mut job = self.load(job_id).await?;
            ensure_active(&job)?;
            update(job.item_mut(item_id)?)?;
            job.touch();
            let job = self.save(&job).await?;
            job.item(item_id)
                .cloned()
                .ok_or_else(|| JobError::NotFound(format!("job item {} in job {}", item_id, job_id)))
        }
        .await;
        self.report(job_id, result).await
    }

    /// Accept the translations of one item; finishes the job when it was the last
    pub async fn accept_item(&self, job_id: i64, item_id: i64) -> Result<Job, JobError> {
        let _guard = self.lock_job(job_id).await;
        let result = async {
            let mut job = self.load(job_id).await?;
            ensure_active(&job)?;
            let accepted = job.item_mut(item_id)?.accept_translation()?;
            self.record(
                job_id,
                Some(item_id),
                MessageSeverity::Status,
                format!("{} translations have been accepted.", accepted),
            )
            .await;
            if job.all_accepted() {
                self.finish(&mut job).await?;
            }
            job.touch();
            self.save(&job).await
        }
        .await;
        self.report(job_id, result).await
    }

    /// Accept every item of the job
    pub async fn accept_job(&self, job_id: i64) -> Result<Job, JobError> {
        let _guard = self.lock_job(job_id).await;
        let result = async {
            let mut job = self.load(job_id).await?;
            ensure_active(&job)?;
            let mut accepted = 0;
            for item in &mut job.items {
                accepted += item.accept_translation()?;
            }
            self.record(
                job_id,
                None,
                MessageSeverity::Status,
                format!("{} translations have been accepted.", accepted),
            )
            .await;
            if job.all_accepted() {
                self.finish(&mut job).await?;
            } else {
                self.record(
                    job_id,
                    None,
                    MessageSeverity::Warning,
                    "Some leaves have no translation yet, the job stays active.",
                )
                .await;
            }
            job.touch();
            self.save(&job).await
        }
        .await;
        self.report(job_id, result).await
    }

    /// Finish the job and write the accepted translations back to the sources
    async fn finish(&self, job: &mut Job) -> Result<(), JobError> {
        job.transition(JobState::Finished)?;
        job.busy = false;

        for item in &job.items {
            let applied = match self.registry.source(&item.source.plugin) {
                Ok(plugin) => plugin
                    .apply_translation(&item.source, &job.target_language, &item.data)
                    .await
                    .map_err(JobError::from),
                Err(e) => Err(e),
            };
            if let Err(e) = applied {
                self.record(
                    job.id,
                    Some(item.id),
                    MessageSeverity::Error,
                    format!("Failed to save the translation of {}: {}", item.label, e),
                )
                .await;
            }
        }

        self.record(job.id, None, MessageSeverity::Status, "The translation job has been finished.")
            .await;
        Ok(())
    }

    // =========================================================================
    // Exchange files
    // =========================================================================

    /// Render the job with an exchange format
    pub async fn export(
        &self,
        job_id: i64,
        format: &str,
        options: &ExportOptions,
    ) -> Result<Vec<u8>, JobError> {
        let result = async {
            let job = self.load(job_id).await?;
            let format = self.registry.format(format)?;
            let bytes = format.export(&job, options)?;
            debug!("Exported job {} as {} ({} bytes)", job_id, format.id(), bytes.len());
            Ok(bytes)
        }
        .await;
        self.report(job_id, result).await
    }

    /// Parse an exchange file and resolve the job it belongs to
    ///
    /// With `expected_job_id`, the file must address that job. Nothing is
    /// applied yet.
    pub async fn validate_import(
        &self,
        expected_job_id: Option<i64>,
        format: &str,
        bytes: &[u8],
    ) -> Result<(Job, ExchangeDocument), JobError> {
        let expected = match expected_job_id {
            Some(id) => Some(self.load(id).await?),
            None => None,
        };

        let result = self.resolve_document(expected, format, bytes).await;
        match expected_job_id {
            Some(job_id) => self.report(job_id, result).await,
            None => result,
        }
    }

    async fn resolve_document(
        &self,
        expected: Option<Job>,
        format: &str,
        bytes: &[u8],
    ) -> Result<(Job, ExchangeDocument), JobError> {
        let document = self.registry.format(format)?.parse(bytes)?;
        let file_job_id = document.header.job_id;

        let job = match expected {
            Some(job) if job.id != file_job_id => {
                return Err(JobError::JobMismatch {
                    file_job_id,
                    expected_job_id: Some(job.id),
                });
            }
            Some(job) => job,
            None => self
                .repo
                .load_job(file_job_id)
                .await?
                .ok_or(JobError::JobMismatch {
                    file_job_id,
                    expected_job_id: None,
                })?,
        };

        let header = &document.header;
        if !language_codes_match(&header.source_language, &job.source_language)
            || !language_codes_match(&header.target_language, &job.target_language)
        {
            return Err(JobError::MalformedFile(format!(
                "the file translates {} -> {}, job {} is {} -> {}",
                header.source_language,
                header.target_language,
                job.id,
                job.source_language,
                job.target_language
            )));
        }
        Ok((job, document))
    }

    /// Import an exchange file into the job it addresses
    ///
    /// Problems with single units are recorded as messages and reported;
    /// the other units are still imported.
    pub async fn import(
        &self,
        expected_job_id: Option<i64>,
        format: &str,
        bytes: &[u8],
    ) -> Result<ImportReport, JobError> {
        let (job, document) = self.validate_import(expected_job_id, format, bytes).await?;
        let job_id = job.id;

        let _guard = self.lock_job(job_id).await;
        let result = async {
            let mut job = self.load(job_id).await?;
            ensure_active(&job)?;

            let report = apply_document(&mut job, &document);
            for issue in &report.violations {
                self.record(job_id, issue.item_id, MessageSeverity::Error, issue.error.to_string())
                    .await;
            }
            job.busy = false;
            job.touch();
            self.record(
                job_id,
                None,
                MessageSeverity::Status,
                format!("The translation has been imported: {}.", report),
            )
            .await;
            if job.all_accepted() {
                self.finish(&mut job).await?;
            }
            self.save(&job).await?;
            Ok(report)
        }
        .await;
        self.report(job_id, result).await
    }

    // =========================================================================
    // Deletion
    // =========================================================================

    /// Delete a job with its items, messages and exports
    pub async fn delete_job(&self, job_id: i64) -> Result<(), JobError> {
        let _guard = self.lock_job(job_id).await;
        let job = self.load(job_id).await?;
        if job.busy {
            let error = JobError::ResourceBusy(format!("job {} is waiting for its translator", job_id));
            return self.report(job_id, Err(error)).await;
        }

        self.repo.delete_job(job_id).await?;
        info!("Deleted job {}", job_id);
        Ok(())
    }

    /// Add or replace a translator binding
    pub fn add_translator(&self, translator: Translator) -> Result<(), JobError> {
        let id = translator.id.clone();
        self.registry.add_translator(translator)?;
        self.cache.invalidate(&id);
        Ok(())
    }

    /// Remove a translator binding unless one of its jobs is busy
    pub async fn remove_translator(&self, translator: &str) -> Result<Translator, JobError> {
        self.registry.translator(translator)?;

        let busy = self.repo.busy_jobs_for_translator(translator).await?;
        if !busy.is_empty() {
            for job_id in &busy {
                self.record(
                    *job_id,
                    None,
                    MessageSeverity::Warning,
                    format!("The translator {} cannot be removed while this job is busy.", translator),
                )
                .await;
            }
            return Err(JobError::ResourceBusy(format!(
                "translator {} is used by busy jobs {:?}",
                translator, busy
            )));
        }

        let removed = self.registry.remove_translator(translator)?;
        self.cache.invalidate(translator);
        info!("Removed translator {}", translator);
        Ok(removed)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// A stored job
    pub async fn get_job(&self, job_id: i64) -> Result<Job, JobError> {
        self.load(job_id).await
    }

    /// Summaries of all jobs
    pub async fn list_jobs(&self) -> Result<Vec<JobSummary>, JobError> {
        Ok(self.repo.list_jobs().await?)
    }

    /// Messages of a job, oldest first
    pub async fn messages(&self, job_id: i64) -> Result<Vec<JobMessage>, JobError> {
        Ok(self.repo.messages(job_id).await?)
    }

    /// Related content that could be added to the job
    pub async fn suggestions(&self, job_id: i64) -> Result<Vec<Suggestion>, JobError> {
        let job = self.load(job_id).await?;
        let engine = SuggestionEngine::new(Arc::clone(&self.registry));
        let suggestions = engine.get_suggestions(&job).await;
        Ok(SuggestionEngine::clean_suggestions(suggestions, &job))
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn lock_job(&self, job_id: i64) -> JobGuard<'_> {
        let lock = Arc::clone(self.locks.lock().entry(job_id).or_default());
        JobGuard {
            job_id,
            guard: Some(lock.lock_owned().await),
            locks: &self.locks,
        }
    }

    async fn load(&self, job_id: i64) -> Result<Job, JobError> {
        self.repo
            .load_job(job_id)
            .await?
            .ok_or_else(|| JobError::NotFound(format!("job {}", job_id)))
    }

    async fn save(&self, job: &Job) -> Result<Job, JobError> {
        Ok(self.repo.save_job(job).await?)
    }

    /// Store a message; storage failures are only logged
    async fn record(
        &self,
        job_id: i64,
        item_id: Option<i64>,
        severity: MessageSeverity,
        message: impl Into<String>,
    ) {
        let message = JobMessage::new(job_id, item_id, severity, message);
        match severity {
            MessageSeverity::Error => error!("Job {}: {}", job_id, message.message),
            MessageSeverity::Warning => warn!("Job {}: {}", job_id, message.message),
            MessageSeverity::Status => info!("Job {}: {}", job_id, message.message),
            MessageSeverity::Debug => debug!("Job {}: {}", job_id, message.message),
        }
        if let Err(e) = self.repo.add_message(&message).await {
            warn!("Failed to store message for job {}: {:#}", job_id, e);
        }
    }

    /// Record the error of a failed operation on the job
    async fn report<T>(&self, job_id: i64, result: Result<T, JobError>) -> Result<T, JobError> {
        if let Err(e) = &result {
            let job_missing = matches!(e, JobError::NotFound(what) if *what == format!("job {}", job_id));
            if !job_missing {
                self.record(job_id, error_item(e), MessageSeverity::Error, e.to_string())
                    .await;
            }
        }
        result
    }
}

impl std::fmt::Debug for JobManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobManager")
            .field("registry", &self.registry)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

fn ensure_active(job: &Job) -> Result<(), JobError> {
    if job.state != JobState::Active {
        return Err(JobError::InvalidState(format!(
            "job {} is {}, not active",
            job.id, job.state
        )));
    }
    Ok(())
}

fn error_item(error: &JobError) -> Option<i64> {
    match error {
        JobError::AlreadyAccepted { item_id, .. } | JobError::IntegrityViolation { item_id, .. } => {
            Some(*item_id)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataLeaf, DataTree, Escaper};
    use crate::errors::ErrorKind;
    use crate::providers::{MemoryLanguageCache, MockTranslator};
    use crate::sources::MemorySource;

    fn manager_with(translator: MockTranslator) -> (JobManager, SourceRef) {
        let memory = MemorySource::new(Escaper::disabled());
        let mut data = DataTree::new();
        data.insert(&DataPath::parse("title").unwrap(), DataLeaf::new("Hello World"))
            .unwrap();
        let source = memory.insert("page", "1", "Home", data);

        let registry = Registry::new();
        registry.register_source(Arc::new(memory));
        registry.register_translator_plugin(Arc::new(translator));
        registry.add_translator(Translator::new("machine", "mock")).unwrap();

        let manager = JobManager::new(
            Repository::new_in_memory().unwrap(),
            Arc::new(registry),
            Arc::new(MemoryLanguageCache::new()),
        );
        (manager, source)
    }

    #[tokio::test]
    async fn test_requestTranslation_withMock_shouldTranslateLeaves() {
        let (manager, source) = manager_with(MockTranslator::working());
        let job = manager
            .create_job("en", "de", Some("machine"), Settings::new())
            .await
            .unwrap();
        manager.add_item(job.id, source, false).await.unwrap();

        let outcome = manager.request_translation(job.id).await.unwrap();

        assert_eq!(outcome, RequestOutcome::Translated { updated: 1, finished: false });
        let job = manager.get_job(job.id).await.unwrap();
        assert_eq!(job.state, JobState::Active);
        let leaf = job.items[0].data.get(&DataPath::parse("title").unwrap()).unwrap();
        assert_eq!(leaf.translation.as_deref(), Some("de_Hello World"));
    }

    #[tokio::test]
    async fn test_requestTranslation_withUnsupportedPair_shouldStayUnprocessed() {
        let (manager, source) =
            manager_with(MockTranslator::working().with_language_pairs(&[("en", "fr")]));
        let job = manager
            .create_job("en", "de", Some("machine"), Settings::new())
            .await
            .unwrap();
        manager.add_item(job.id, source, false).await.unwrap();

        let error = manager.request_translation(job.id).await.unwrap_err();

        assert_eq!(error.kind(), ErrorKind::UnsupportedLanguagePair);
        let job = manager.get_job(job.id).await.unwrap();
        assert_eq!(job.state, JobState::Unprocessed);
        let messages = manager.messages(job.id).await.unwrap();
        assert_eq!(messages.last().unwrap().severity, MessageSeverity::Error);
    }

    #[tokio::test]
    async fn test_requestTranslation_withoutTranslator_shouldBeNotAvailable() {
        let (manager, source) = manager_with(MockTranslator::working());
        let job = manager.create_job("en", "de", None, Settings::new()).await.unwrap();
        manager.add_item(job.id, source, false).await.unwrap();

        let error = manager.request_translation(job.id).await.unwrap_err();

        assert_eq!(error.kind(), ErrorKind::NotAvailable);
    }

    #[tokio::test]
    async fn test_addItem_twice_shouldRejectDuplicate() {
        let (manager, source) = manager_with(MockTranslator::working());
        let job = manager.create_job("en", "de", None, Settings::new()).await.unwrap();

        manager.add_item(job.id, source.clone(), false).await.unwrap();
        let error = manager.add_item(job.id, source, false).await.unwrap_err();

        assert_eq!(error.kind(), ErrorKind::DuplicateItem);
    }

    #[tokio::test]
    async fn test_autoAccept_shouldFinishJob() {
        let (manager, source) = manager_with(MockTranslator::working());
        let mut settings = Settings::new();
        settings.insert(AUTO_ACCEPT_SETTING.to_string(), serde_json::Value::Bool(true));
        let job = manager
            .create_job("en", "de", Some("machine"), settings)
            .await
            .unwrap();
        manager.add_item(job.id, source, false).await.unwrap();

        let outcome = manager.request_translation(job.id).await.unwrap();

        assert_eq!(outcome, RequestOutcome::Translated { updated: 1, finished: true });
        assert_eq!(manager.get_job(job.id).await.unwrap().state, JobState::Finished);
    }

    #[tokio::test]
    async fn test_rejectingTranslator_shouldRejectJob() {
        let (manager, source) = manager_with(MockTranslator::rejecting());
        let job = manager
            .create_job("en", "de", Some("machine"), Settings::new())
            .await
            .unwrap();
        manager.add_item(job.id, source, false).await.unwrap();

        let outcome = manager.request_translation(job.id).await.unwrap();

        assert!(matches!(outcome, RequestOutcome::Rejected(_)));
        assert_eq!(manager.get_job(job.id).await.unwrap().state, JobState::Rejected);
    }

    #[tokio::test]
    async fn test_abortJob_withRefusingTranslator_shouldFail() {
        let (manager, source) = manager_with(MockTranslator::refusing_abort());
        let job = manager
            .create_job("en", "de", Some("machine"), Settings::new())
            .await
            .unwrap();
        manager.add_item(job.id, source, false).await.unwrap();
        manager.request_translation(job.id).await.unwrap();

        let error = manager.abort_job(job.id).await.unwrap_err();

        assert_eq!(error.kind(), ErrorKind::AbortRefused);
        assert_eq!(manager.get_job(job.id).await.unwrap().state, JobState::Active);
    }

    #[tokio::test]
    async fn test_deleteJob_shouldRemoveJob() {
        let (manager, _) = manager_with(MockTranslator::working());
        let job = manager.create_job("en", "de", None, Settings::new()).await.unwrap();

        manager.delete_job(job.id).await.unwrap();

        assert_eq!(manager.get_job(job.id).await.unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_lockJob_shouldForgetReleasedLocks() {
        let (manager, source) = manager_with(MockTranslator::working());
        let job = manager.create_job("en", "de", Some("machine"), Settings::new()).await.unwrap();
        manager.add_item(job.id, source, false).await.unwrap();
        manager.request_translation(job.id).await.unwrap();
        assert!(manager.locks.lock().is_empty());

        let first = manager.lock_job(job.id).await;
        let second = manager.lock_job(job.id + 1).await;
        assert_eq!(manager.locks.lock().len(), 2);

        drop(first);
        assert_eq!(manager.locks.lock().len(), 1);
        drop(second);
        assert!(manager.locks.lock().is_empty());
    }
}
