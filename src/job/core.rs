/*!
 * The job aggregate: a translation request for one language pair.
 */

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::data::StatusCounts;
use crate::errors::JobError;
use crate::language_utils;
use crate::sources::SourceRef;

use super::item::JobItem;
use super::state::{JobItemState, JobState};

/// Opaque settings interpreted by the bound translator
pub type Settings = BTreeMap<String, serde_json::Value>;

/// A translation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Job id, 0 until stored
    pub id: i64,
    /// Source language code
    pub source_language: String,
    /// Target language code
    pub target_language: String,
    /// Bound translator id
    pub translator: Option<String>,
    /// Job level translator settings
    pub settings: Settings,
    /// Current state
    pub state: JobState,
    /// Whether a transfer to or from the translator is in flight
    pub busy: bool,
    /// Creation time (RFC 3339)
    pub created_at: String,
    /// Last change (RFC 3339)
    pub changed_at: String,
    /// Items in insertion order
    pub items: Vec<JobItem>,
}

impl Job {
    /// Create an unsaved job
    ///
    /// Both languages must be known codes and must differ.
    pub fn new(source_language: &str, target_language: &str) -> Result<Self, JobError> {
        let source_language = normalize_language(source_language)?;
        let target_language = normalize_language(target_language)?;
        if source_language == target_language {
            return Err(JobError::InvalidLanguage(format!(
                "source and target language are both '{}'",
                source_language
            )));
        }

        let now = chrono::Utc::now().to_rfc3339();
        Ok(Self {
            id: 0,
            source_language,
            target_language,
            translator: None,
            settings: Settings::new(),
            state: JobState::Unprocessed,
            busy: false,
            created_at: now.clone(),
            changed_at: now,
            items: Vec::new(),
        })
    }

    /// Sum of the item word counts
    pub fn word_count(&self) -> usize {
        self.items.iter().map(JobItem::word_count).sum()
    }

    /// Sum of the item leaf counters
    pub fn counts(&self) -> StatusCounts {
        self.items.iter().fold(StatusCounts::default(), |mut total, item| {
            let counts = item.counts();
            total.pending += counts.pending;
            total.translated += counts.translated;
            total.reviewed += counts.reviewed;
            total.accepted += counts.accepted;
            total
        })
    }

    /// Find an item by id
    pub fn item(&self, item_id: i64) -> Option<&JobItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    /// Find an item by id for modification
    pub fn item_mut(&mut self, item_id: i64) -> Result<&mut JobItem, JobError> {
        let job_id = self.id;
        self.items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or_else(|| JobError::NotFound(format!("job item {} in job {}", item_id, job_id)))
    }

    /// Whether an item for the same source object exists
    pub fn contains_source(&self, source: &SourceRef) -> bool {
        self.items.iter().any(|item| &item.source == source)
    }

    /// Append an item
    ///
    /// Items can only be added while the job is not being translated, and a
    /// second item for the same source object needs `allow_duplicate`.
    pub fn add_item(&mut self, mut item: JobItem, allow_duplicate: bool) -> Result<(), JobError> {
        if !self.state.is_submittable() {
            return Err(JobError::InvalidState(format!(
                "cannot add items to job {} in state {}",
                self.id, self.state
            )));
        }
        if !allow_duplicate && self.contains_source(&item.source) {
            return Err(JobError::DuplicateItem(item.source.to_string()));
        }
        if item.data.is_empty() {
            return Err(JobError::EmptySource(item.source.to_string()));
        }
        item.job_id = self.id;
        item.state = JobItemState::Inactive;
        self.items.push(item);
        Ok(())
    }

    /// Bind a translator
    pub fn set_translator(&mut self, translator: &str, settings: Settings) -> Result<(), JobError> {
        if !self.state.is_submittable() {
            return Err(JobError::InvalidState(format!(
                "cannot change the translator of job {} in state {}",
                self.id, self.state
            )));
        }
        self.translator = Some(translator.to_string());
        self.settings = settings;
        Ok(())
    }

    /// A job level setting
    pub fn setting(&self, key: &str) -> Option<&serde_json::Value> {
        self.settings.get(key)
    }

    /// Move to `next` if the lifecycle allows it
    pub fn transition(&mut self, next: JobState) -> Result<(), JobError> {
        if !self.state.can_transition_to(next) {
            return Err(JobError::InvalidState(format!(
                "job {} cannot move from {} to {}",
                self.id, self.state, next
            )));
        }
        if next == JobState::Active && self.translator.is_none() {
            return Err(JobError::NotAvailable(format!("job {} has no translator", self.id)));
        }
        if next == JobState::Finished && !self.all_accepted() {
            return Err(JobError::InvalidState(format!(
                "job {} has items that are not accepted",
                self.id
            )));
        }
        debug!("Job {} state {} -> {}", self.id, self.state, next);
        self.state = next;
        self.touch();
        Ok(())
    }

    /// Whether the job has items and all of them are accepted
    pub fn all_accepted(&self) -> bool {
        !self.items.is_empty() && self.items.iter().all(JobItem::is_accepted)
    }

    /// Update the change time
    pub fn touch(&mut self) {
        self.changed_at = chrono::Utc::now().to_rfc3339();
    }
}

fn normalize_language(code: &str) -> Result<String, JobError> {
    language_utils::normalize_to_part1_or_part2t(code)
        .map_err(|e| JobError::InvalidLanguage(e.to_string()))
}
