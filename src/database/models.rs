/*!
 * Database entity models.
 *
 * These structures map directly to database rows. Jobs and items are
 * converted to and from their domain types at the repository boundary.
 */

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::DataTree;
use crate::job::{Job, JobItem, JobItemState, JobState, Settings};
use crate::sources::SourceRef;

/// Row of the `jobs` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: i64,
    pub source_language: String,
    pub target_language: String,
    pub translator: Option<String>,
    /// Settings as a JSON object
    pub settings: String,
    pub state: String,
    pub busy: bool,
    pub created_at: String,
    pub changed_at: String,
}

impl JobRecord {
    /// Row for a job, without its items
    pub fn from_job(job: &Job) -> Result<Self> {
        Ok(Self {
            id: job.id,
            source_language: job.source_language.clone(),
            target_language: job.target_language.clone(),
            translator: job.translator.clone(),
            settings: serde_json::to_string(&job.settings).context("Failed to encode job settings")?,
            state: job.state.to_string(),
            busy: job.busy,
            created_at: job.created_at.clone(),
            changed_at: job.changed_at.clone(),
        })
    }

    /// Rebuild the job from its row and item rows
    pub fn into_job(self, items: Vec<JobItemRecord>) -> Result<Job> {
        let settings: Settings = serde_json::from_str(&self.settings)
            .with_context(|| format!("Invalid settings for job {}", self.id))?;
        let state: JobState = self
            .state
            .parse()
            .with_context(|| format!("Invalid state for job {}", self.id))?;
        let items = items
            .into_iter()
            .map(JobItemRecord::into_item)
            .collect::<Result<Vec<_>>>()?;

        Ok(Job {
            id: self.id,
            source_language: self.source_language,
            target_language: self.target_language,
            translator: self.translator,
            settings,
            state,
            busy: self.busy,
            created_at: self.created_at,
            changed_at: self.changed_at,
            items,
        })
    }
}

/// Row of the `job_items` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobItemRecord {
    pub id: i64,
    pub job_id: i64,
    /// Insertion order within the job
    pub position: i64,
    pub plugin: String,
    pub source_type: String,
    pub source_id: String,
    pub label: String,
    /// Data tree as JSON
    pub data: String,
    pub state: String,
    pub word_count: i64,
    pub count_pending: i64,
    pub count_translated: i64,
    pub count_reviewed: i64,
    pub count_accepted: i64,
}

impl JobItemRecord {
    /// Row for an item at `position`, with derived counters filled in
    pub fn from_item(item: &JobItem, job_id: i64, position: usize) -> Result<Self> {
        let counts = item.counts();
        Ok(Self {
            id: item.id,
            job_id,
            position: position as i64,
            plugin: item.source.plugin.clone(),
            source_type: item.source.source_type.clone(),
            source_id: item.source.source_id.clone(),
            label: item.label.clone(),
            data: serde_json::to_string(&item.data)
                .with_context(|| format!("Failed to encode data of job item {}", item.id))?,
            state: item.state.to_string(),
            word_count: item.word_count() as i64,
            count_pending: counts.pending as i64,
            count_translated: counts.translated as i64,
            count_reviewed: counts.reviewed as i64,
            count_accepted: counts.accepted as i64,
        })
    }

    /// Rebuild the item
    pub fn into_item(self) -> Result<JobItem> {
        let data: DataTree = serde_json::from_str(&self.data)
            .with_context(|| format!("Invalid data for job item {}", self.id))?;
        let state: JobItemState = self
            .state
            .parse()
            .with_context(|| format!("Invalid state for job item {}", self.id))?;

        Ok(JobItem {
            id: self.id,
            job_id: self.job_id,
            source: SourceRef::new(self.plugin, self.source_type, self.source_id),
            label: self.label,
            data,
            state,
        })
    }
}

/// Row of the `job_exports` table: one exchange file handed out for a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRecord {
    /// Unique export id
    pub export_id: String,
    pub job_id: i64,
    /// Exchange format id
    pub format: String,
    /// SHA-256 of the file content, hex encoded
    pub digest: String,
    /// Where the file was written
    pub location: String,
    pub created_at: String,
}

impl ExportRecord {
    /// Create a record with a fresh export id
    pub fn new(job_id: i64, format: &str, digest: &str, location: &str) -> Self {
        Self {
            export_id: uuid::Uuid::new_v4().to_string(),
            job_id,
            format: format.to_string(),
            digest: digest.to_string(),
            location: location.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Summary row used for job listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: i64,
    pub source_language: String,
    pub target_language: String,
    pub translator: Option<String>,
    pub state: JobState,
    pub busy: bool,
    pub item_count: i64,
    pub word_count: i64,
    pub leaf_count: i64,
    pub count_accepted: i64,
    pub changed_at: String,
}

impl JobSummary {
    /// Share of accepted leaves, in percent
    pub fn progress_percentage(&self) -> f64 {
        if self.leaf_count == 0 {
            return 0.0;
        }
        (self.count_accepted as f64 / self.leaf_count as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataLeaf, DataPath};

    fn job() -> Job {
        let mut data = DataTree::new();
        data.insert(&DataPath::parse("title").unwrap(), DataLeaf::new("Hello World"))
            .unwrap();
        let mut job = Job::new("en", "de").unwrap();
        job.id = 7;
        job.settings
            .insert("export_format".to_string(), serde_json::json!("html"));
        job.add_item(JobItem::new(SourceRef::new("memory", "page", "1"), "Page", data), false)
            .unwrap();
        job.items[0].id = 70;
        job
    }

    #[test]
    fn test_jobRecord_roundTrip_shouldRestoreJob() {
        let job = job();
        let record = JobRecord::from_job(&job).unwrap();
        let items = vec![JobItemRecord::from_item(&job.items[0], job.id, 0).unwrap()];

        let restored = record.into_job(items).unwrap();

        assert_eq!(restored, job);
    }

    #[test]
    fn test_jobItemRecord_shouldDenormaliseCounters() {
        let job = job();
        let record = JobItemRecord::from_item(&job.items[0], job.id, 3).unwrap();

        assert_eq!(record.position, 3);
        assert_eq!(record.word_count, 2);
        assert_eq!(record.count_pending, 1);
        assert_eq!(record.count_accepted, 0);
        assert_eq!(record.state, "inactive");
    }

    #[test]
    fn test_intoItem_withInvalidState_shouldFail() {
        let job = job();
        let mut record = JobItemRecord::from_item(&job.items[0], job.id, 0).unwrap();
        record.state = "bogus".to_string();
        assert!(record.into_item().is_err());
    }

    #[test]
    fn test_exportRecord_new_shouldUseUniqueIds() {
        let first = ExportRecord::new(1, "xlf", "abc", "/tmp/a.xlf");
        let second = ExportRecord::new(1, "xlf", "abc", "/tmp/a.xlf");
        assert_ne!(first.export_id, second.export_id);
        assert_eq!(first.digest, second.digest);
    }
}
