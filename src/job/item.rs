/*!
 * Job items: one source object inside a job.
 *
 * The item state is derived from the statuses of its leaves, except for the
 * `Inactive` and `Aborted` states which are set explicitly by the job.
 */

use log::debug;
use serde::{Deserialize, Serialize};

use crate::data::{DataLeaf, DataPath, DataTree, LeafStatus, StatusCounts};
use crate::errors::JobError;
use crate::sources::SourceRef;

use super::state::JobItemState;

/// Outcome of offering a translation to a single leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafUpdate {
    /// The translation was stored and waits for review
    Updated,
    /// The same translation was already stored
    Unchanged,
    /// The leaf is accepted and was left alone
    SkippedAccepted,
    /// The offered translation was empty
    SkippedEmpty,
}

/// One translatable source object inside a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobItem {
    /// Item id, 0 until stored
    pub id: i64,
    /// Owning job, 0 until added to a stored job
    pub job_id: i64,
    /// Reference to the source object
    pub source: SourceRef,
    /// Label of the source object
    pub label: String,
    /// Translatable content
    pub data: DataTree,
    /// Current state
    pub state: JobItemState,
}

impl JobItem {
    /// Create an unsaved, inactive item
    pub fn new(source: SourceRef, label: impl Into<String>, data: DataTree) -> Self {
        Self {
            id: 0,
            job_id: 0,
            source,
            label: label.into(),
            data,
            state: JobItemState::Inactive,
        }
    }

    /// Words in all translatable leaves
    pub fn word_count(&self) -> usize {
        self.data.word_count()
    }

    /// Leaf counters per status
    pub fn counts(&self) -> StatusCounts {
        self.data.status_counts()
    }

    /// Whether every leaf is accepted
    pub fn is_accepted(&self) -> bool {
        self.state == JobItemState::Accepted
    }

    /// Whether any leaf is accepted
    pub fn has_accepted_leaves(&self) -> bool {
        self.counts().accepted > 0
    }

    /// Put the item into work, e.g. when its job is submitted
    pub fn activate(&mut self) {
        self.state = Self::derive_state(&self.counts());
    }

    /// Recompute the state from the leaf statuses
    pub fn refresh_state(&mut self) {
        if matches!(self.state, JobItemState::Inactive | JobItemState::Aborted) {
            return;
        }
        let derived = Self::derive_state(&self.counts());
        if derived != self.state {
            debug!("Job item {} state {} -> {}", self.id, self.state, derived);
            self.state = derived;
        }
    }

    fn derive_state(counts: &StatusCounts) -> JobItemState {
        if counts.total() > 0 && counts.accepted == counts.total() {
            JobItemState::Accepted
        } else if counts.translated > 0 {
            JobItemState::NeedsReview
        } else if counts.reviewed > 0 && counts.pending == 0 {
            JobItemState::Reviewed
        } else {
            JobItemState::Active
        }
    }

    /// Abort the item
    ///
    /// Fails with `AlreadyAccepted`, leaving the item unchanged, when any leaf
    /// is accepted.
    pub fn abort(&mut self) -> Result<(), JobError> {
        if self.has_accepted_leaves() {
            return Err(JobError::AlreadyAccepted {
                item_id: self.id,
                path: None,
            });
        }
        self.state = JobItemState::Aborted;
        Ok(())
    }

    /// Accept every translated leaf
    ///
    /// Returns the number of newly accepted leaves; calling it again is a
    /// no-op.
    pub fn accept_translation(&mut self) -> Result<usize, JobError> {
        self.ensure_open()?;
        let mut accepted = 0;
        for path in self.data.leaf_paths() {
            if let Some(leaf) = self.data.get_mut(&path) {
                if leaf.translate && leaf.status.is_pending_acceptance() && leaf.translation.is_some() {
                    leaf.status = LeafStatus::Accepted;
                    accepted += 1;
                }
            }
        }
        self.refresh_state();
        Ok(accepted)
    }

    /// Offer a translation for one leaf
    ///
    /// Accepted leaves are never touched. A different translation replaces
    /// the stored one and puts the leaf back into review.
    pub fn set_translation(&mut self, path: &DataPath, text: &str) -> Result<LeafUpdate, JobError> {
        self.ensure_open()?;
        let item_id = self.id;
        let leaf = Self::translatable_leaf(&mut self.data, item_id, path)?;

        let update = if leaf.status == LeafStatus::Accepted {
            LeafUpdate::SkippedAccepted
        } else if text.trim().is_empty() {
            LeafUpdate::SkippedEmpty
        } else if leaf.status != LeafStatus::Untranslated
            && leaf.translation.as_deref() == Some(text)
        {
            LeafUpdate::Unchanged
        } else {
            leaf.translation = Some(text.to_string());
            leaf.status = LeafStatus::NeedsReview;
            LeafUpdate::Updated
        };

        self.refresh_state();
        Ok(update)
    }

    /// Store a human translation for one leaf
    pub fn submit_translation(&mut self, path: &DataPath, text: &str) -> Result<(), JobError> {
        match self.set_translation(path, text)? {
            LeafUpdate::SkippedAccepted => Err(JobError::AlreadyAccepted {
                item_id: self.id,
                path: Some(path.to_string()),
            }),
            LeafUpdate::SkippedEmpty => Err(JobError::InvalidState(format!(
                "empty translation for {} in job item {}",
                path, self.id
            ))),
            LeafUpdate::Updated | LeafUpdate::Unchanged => Ok(()),
        }
    }

    /// Approve a translation that waits for review
    pub fn review_leaf(&mut self, path: &DataPath) -> Result<(), JobError> {
        self.ensure_open()?;
        let item_id = self.id;
        let leaf = Self::translatable_leaf(&mut self.data, item_id, path)?;
        if leaf.status != LeafStatus::NeedsReview {
            return Err(JobError::InvalidState(format!(
                "leaf {} of job item {} is {}, not waiting for review",
                path, item_id, leaf.status
            )));
        }
        leaf.status = LeafStatus::Translated;
        self.refresh_state();
        Ok(())
    }

    /// Reject a translation, reopening the item
    pub fn reject_leaf(&mut self, path: &DataPath) -> Result<(), JobError> {
        self.ensure_open()?;
        let item_id = self.id;
        let leaf = Self::translatable_leaf(&mut self.data, item_id, path)?;
        match leaf.status {
            LeafStatus::Accepted => {
                return Err(JobError::AlreadyAccepted {
                    item_id,
                    path: Some(path.to_string()),
                });
            }
            LeafStatus::Untranslated => {
                return Err(JobError::InvalidState(format!(
                    "leaf {} of job item {} has no translation to reject",
                    path, item_id
                )));
            }
            LeafStatus::NeedsReview | LeafStatus::Translated => {
                leaf.translation = None;
                leaf.status = LeafStatus::Untranslated;
            }
        }
        self.refresh_state();
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), JobError> {
        match self.state {
            JobItemState::Inactive | JobItemState::Aborted => Err(JobError::InvalidState(format!(
                "job item {} is {}",
                self.id, self.state
            ))),
            _ => Ok(()),
        }
    }

    fn translatable_leaf<'a>(
        data: &'a mut DataTree,
        item_id: i64,
        path: &DataPath,
    ) -> Result<&'a mut DataLeaf, JobError> {
        match data.get_mut(path) {
            Some(leaf) if leaf.translate => Ok(leaf),
            _ => Err(JobError::NotFound(format!(
                "translatable leaf {} in job item {}",
                path, item_id
            ))),
        }
    }
}
