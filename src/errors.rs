/*!
 * Error types for the lingotrack engine.
 *
 * This module contains custom error types for the different parts of the
 * engine, using the thiserror crate for ergonomic error definitions:
 * - `JobError`: failures of job, job item and exchange operations
 * - `ProviderError`: failures inside a translator plugin
 * - `SourceError`: failures inside a source plugin
 * - `AppError`: command line level wrapper
 */

use thiserror::Error;

/// Errors that can occur inside a translator plugin
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The translation request could not be completed
    #[error("Translation request failed: {0}")]
    RequestFailed(String),

    /// Error establishing or maintaining a connection to a remote service
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The remote service refused to process the job
    #[error("Translation request rejected: {0}")]
    Rejected(String),

    /// Error while writing or reading exchange files
    #[error("I/O error: {0}")]
    Io(String),
}

/// Errors that can occur inside a source plugin
#[derive(Error, Debug)]
pub enum SourceError {
    /// The referenced source object does not exist
    #[error("Source not found: {0}")]
    NotFound(String),

    /// Error while reading or writing the source object
    #[error("Source I/O error: {0}")]
    Io(String),

    /// The source object could not be converted into translatable data
    #[error("Source parse error: {0}")]
    Parse(String),
}

impl From<std::io::Error> for SourceError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

/// Stable discriminant of a `JobError`, used to match failure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotAvailable,
    UnsupportedLanguagePair,
    AlreadyAccepted,
    ResourceBusy,
    JobMismatch,
    NotFound,
    IntegrityViolation,
    EmptySource,
    InvalidState,
    InvalidData,
    InvalidLanguage,
    DuplicateItem,
    MalformedFile,
    AbortRefused,
    Source,
    Provider,
    Storage,
}

/// Errors that can occur while managing jobs and exchanging files
#[derive(Error, Debug)]
pub enum JobError {
    /// The translator is missing, unknown to the plugin or not usable
    #[error("Translator not available: {0}")]
    NotAvailable(String),

    /// The translator cannot translate between the requested languages
    #[error("{translator} can not translate from {source_language} to {target_language}")]
    UnsupportedLanguagePair {
        /// Translator id
        translator: String,
        /// Job source language
        source_language: String,
        /// Job target language
        target_language: String,
    },

    /// The operation conflicts with an already accepted translation
    #[error("Job item {item_id} already has accepted translations{}", path_suffix(.path))]
    AlreadyAccepted {
        /// Job item id
        item_id: i64,
        /// Leaf path, if a single leaf was targeted
        path: Option<String>,
    },

    /// The resource is mid-transfer to or from a translator
    #[error("Resource is busy: {0}")]
    ResourceBusy(String),

    /// An exchange file addresses a different or unknown job
    #[error("The imported file job id {file_job_id} does not match {}", expected_job(.expected_job_id))]
    JobMismatch {
        /// Job id recorded in the file header
        file_job_id: i64,
        /// Job the caller imported into, if any
        expected_job_id: Option<i64>,
    },

    /// A job, item, plugin or leaf could not be found
    #[error("Not found: {0}")]
    NotFound(String),

    /// The structure of an imported translation differs from its source
    #[error("Failed to validate semantic integrity of {path} in job item {item_id} (expected {expected} elements, found {found})")]
    IntegrityViolation {
        /// Job item id
        item_id: i64,
        /// Leaf path
        path: String,
        /// Structural elements in the source leaf
        expected: usize,
        /// Structural elements in the imported translation
        found: usize,
    },

    /// A source object produced no translatable text
    #[error("Source {0} has no translatable data")]
    EmptySource(String),

    /// The operation is not allowed in the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A path, pattern or stored value could not be understood
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A language code is unknown or the pair is degenerate
    #[error("Invalid language: {0}")]
    InvalidLanguage(String),

    /// The same source object is already part of the job
    #[error("Source {0} is already part of the job")]
    DuplicateItem(String),

    /// An exchange file was rejected before any content was applied
    #[error("Failed to validate file, import aborted: {0}")]
    MalformedFile(String),

    /// The translator declined to abort the job
    #[error("Translator refused to abort job {0}")]
    AbortRefused(i64),

    /// Error from a source plugin
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Error from a translator plugin
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from the persistence layer
    #[error("Storage error: {0}")]
    Storage(String),
}

impl JobError {
    /// Failure kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotAvailable(_) => ErrorKind::NotAvailable,
            Self::UnsupportedLanguagePair { .. } => ErrorKind::UnsupportedLanguagePair,
            Self::AlreadyAccepted { .. } => ErrorKind::AlreadyAccepted,
            Self::ResourceBusy(_) => ErrorKind::ResourceBusy,
            Self::JobMismatch { .. } => ErrorKind::JobMismatch,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::IntegrityViolation { .. } => ErrorKind::IntegrityViolation,
            Self::EmptySource(_) => ErrorKind::EmptySource,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::InvalidData(_) => ErrorKind::InvalidData,
            Self::InvalidLanguage(_) => ErrorKind::InvalidLanguage,
            Self::DuplicateItem(_) => ErrorKind::DuplicateItem,
            Self::MalformedFile(_) => ErrorKind::MalformedFile,
            Self::AbortRefused(_) => ErrorKind::AbortRefused,
            Self::Source(_) => ErrorKind::Source,
            Self::Provider(_) => ErrorKind::Provider,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }
}

fn path_suffix(path: &Option<String>) -> String {
    path.as_ref().map(|p| format!(" ({})", p)).unwrap_or_default()
}

fn expected_job(expected: &Option<i64>) -> String {
    match expected {
        Some(id) => format!("the job id {}", id),
        None => "any open job".to_string(),
    }
}

impl From<anyhow::Error> for JobError {
    fn from(error: anyhow::Error) -> Self {
        Self::Storage(format!("{:#}", error))
    }
}

impl From<serde_json::Error> for JobError {
    fn from(error: serde_json::Error) -> Self {
        Self::Storage(error.to_string())
    }
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error in the configuration file
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from the job engine
    #[error("Job error: {0}")]
    Job(#[from] JobError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
