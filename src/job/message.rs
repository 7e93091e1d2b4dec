/*!
 * Operator visible messages attached to a job.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::JobError;

/// Severity of a job message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSeverity {
    /// Normal progress information
    Status,
    /// Something was skipped or needs attention
    Warning,
    /// An operation failed
    Error,
    /// Diagnostic detail
    Debug,
}

impl fmt::Display for MessageSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageSeverity::Status => write!(f, "status"),
            MessageSeverity::Warning => write!(f, "warning"),
            MessageSeverity::Error => write!(f, "error"),
            MessageSeverity::Debug => write!(f, "debug"),
        }
    }
}

impl std::str::FromStr for MessageSeverity {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "status" => Ok(MessageSeverity::Status),
            "warning" => Ok(MessageSeverity::Warning),
            "error" => Ok(MessageSeverity::Error),
            "debug" => Ok(MessageSeverity::Debug),
            _ => Err(JobError::InvalidData(format!("Invalid message severity: {}", s))),
        }
    }
}

/// A message recorded against a job, optionally scoped to one item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMessage {
    /// Message id, 0 until stored
    pub id: i64,
    /// Owning job
    pub job_id: i64,
    /// Item the message concerns
    pub item_id: Option<i64>,
    /// Severity
    pub severity: MessageSeverity,
    /// Message text
    pub message: String,
    /// Creation time (RFC 3339)
    pub created_at: String,
}

impl JobMessage {
    /// Create an unsaved message stamped with the current time
    pub fn new(
        job_id: i64,
        item_id: Option<i64>,
        severity: MessageSeverity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            job_id,
            item_id,
            severity,
            message: message.into(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
