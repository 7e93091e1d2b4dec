/*!
 * Job and job item states.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::JobError;

/// Lifecycle state of a job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Created, not yet submitted to a translator
    #[default]
    Unprocessed,
    /// Submitted and being translated or reviewed
    Active,
    /// The translator declined the request
    Rejected,
    /// Aborted by the user
    Aborted,
    /// Every item has been accepted
    Finished,
}

impl JobState {
    /// Whether `next` can follow this state
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Unprocessed, Active)
                | (Rejected, Active)
                | (Aborted, Active)
                | (Active, Finished)
                | (Active, Rejected)
                | (Unprocessed, Aborted)
                | (Active, Aborted)
        )
    }

    /// Whether the job can still be edited before submission
    pub fn is_submittable(self) -> bool {
        matches!(self, JobState::Unprocessed | JobState::Rejected | JobState::Aborted)
    }

    /// Whether the job is in a state no operation leaves, except resubmission
    pub fn is_closed(self) -> bool {
        matches!(self, JobState::Finished | JobState::Aborted | JobState::Rejected)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Unprocessed => write!(f, "unprocessed"),
            JobState::Active => write!(f, "active"),
            JobState::Rejected => write!(f, "rejected"),
            JobState::Aborted => write!(f, "aborted"),
            JobState::Finished => write!(f, "finished"),
        }
    }
}

impl std::str::FromStr for JobState {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unprocessed" => Ok(JobState::Unprocessed),
            "active" => Ok(JobState::Active),
            "rejected" => Ok(JobState::Rejected),
            "aborted" => Ok(JobState::Aborted),
            "finished" => Ok(JobState::Finished),
            _ => Err(JobError::InvalidData(format!("Invalid job state: {}", s))),
        }
    }
}

/// Lifecycle state of a job item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobItemState {
    /// Part of a job that was not submitted yet
    #[default]
    Inactive,
    /// Waiting for translations
    Active,
    /// At least one translation waits for review
    NeedsReview,
    /// Every delivered translation has been reviewed
    Reviewed,
    /// Every leaf is accepted
    Accepted,
    /// Aborted together with its job
    Aborted,
}

impl fmt::Display for JobItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobItemState::Inactive => write!(f, "inactive"),
            JobItemState::Active => write!(f, "active"),
            JobItemState::NeedsReview => write!(f, "needs_review"),
            JobItemState::Reviewed => write!(f, "reviewed"),
            JobItemState::Accepted => write!(f, "accepted"),
            JobItemState::Aborted => write!(f, "aborted"),
        }
    }
}

impl std::str::FromStr for JobItemState {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inactive" => Ok(JobItemState::Inactive),
            "active" => Ok(JobItemState::Active),
            "needs_review" => Ok(JobItemState::NeedsReview),
            "reviewed" => Ok(JobItemState::Reviewed),
            "accepted" => Ok(JobItemState::Accepted),
            "aborted" => Ok(JobItemState::Aborted),
            _ => Err(JobError::InvalidData(format!("Invalid job item state: {}", s))),
        }
    }
}
