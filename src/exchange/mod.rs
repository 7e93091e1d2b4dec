/*!
 * Exchange file formats.
 *
 * An exchange format serializes the translatable leaves of a job into a
 * document handed to an external translator, and parses the document that
 * comes back. Units are addressed by `{item id}][{leaf path}`, so reordering
 * units in a file does not change where translations land.
 *
 * - `xliff`: XLIFF 1.2 interchange documents
 * - `html`: simple HTML documents with one block per leaf
 * - `inline`: markup handling and structural counting shared by both
 */

use log::{debug, warn};
use std::fmt::{self, Debug};

use crate::data::{DataPath, PATH_DELIMITER};
use crate::errors::JobError;
use crate::job::{Job, JobItem, LeafUpdate};

pub mod html;
pub mod inline;
pub mod xliff;

pub use html::HtmlFormat;
pub use inline::structural_count;
pub use xliff::XliffFormat;

/// Options for rendering an export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    /// Mask markup as inline elements where the format supports it
    pub xliff_processing: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            xliff_processing: true,
        }
    }
}

/// Header of an exchange document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeHeader {
    /// Job the document was exported from
    pub job_id: i64,
    /// Source language of the job
    pub source_language: String,
    /// Target language of the job
    pub target_language: String,
    /// Exported leaves per item, in job order
    pub item_leaf_counts: Vec<(i64, usize)>,
}

/// One translated unit of an exchange document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeUnit {
    /// Item the unit belongs to
    pub item_id: i64,
    /// Path of the leaf within the item
    pub path: DataPath,
    /// Translated text with markers and inline elements removed
    pub target: String,
    /// Structural element count recorded at export time
    pub recorded_count: Option<usize>,
}

/// A parsed exchange document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeDocument {
    /// Document header
    pub header: ExchangeHeader,
    /// Units in document order
    pub units: Vec<ExchangeUnit>,
}

/// Interface of exchange formats
pub trait ExchangeFormat: Send + Sync + Debug {
    /// Format id, also used as the file extension
    fn id(&self) -> &str;

    /// Human readable name
    fn label(&self) -> &str;

    /// Render every translatable leaf of the job
    ///
    /// The output depends only on the job data, so exporting an unchanged
    /// job twice yields identical bytes.
    fn export(&self, job: &Job, options: &ExportOptions) -> Result<Vec<u8>, JobError>;

    /// Parse a document; fails with `MalformedFile` without partial results
    fn parse(&self, bytes: &[u8]) -> Result<ExchangeDocument, JobError>;
}

/// Address of a leaf in exchange documents
pub fn unit_id(item_id: i64, path: &DataPath) -> String {
    format!("{}{}{}", item_id, PATH_DELIMITER, path)
}

/// Split a unit address into item id and leaf path
pub fn parse_unit_id(id: &str) -> Result<(i64, DataPath), JobError> {
    let (item, path) = id
        .split_once(PATH_DELIMITER)
        .ok_or_else(|| JobError::MalformedFile(format!("invalid unit id '{}'", id)))?;
    let item_id = item
        .trim()
        .parse::<i64>()
        .map_err(|_| JobError::MalformedFile(format!("invalid item id in unit '{}'", id)))?;
    let path = DataPath::parse(path)
        .map_err(|e| JobError::MalformedFile(format!("invalid path in unit '{}': {}", id, e)))?;
    Ok((item_id, path))
}

/// File name of an export, e.g. `JobID12_en_de.xlf`
pub fn export_file_name(job: &Job, extension: &str) -> String {
    format!(
        "JobID{}_{}_{}.{}",
        job.id, job.source_language, job.target_language, extension
    )
}

pub(crate) fn malformed(error: impl fmt::Display) -> JobError {
    JobError::MalformedFile(error.to_string())
}

/// A problem with a single unit or item found during import
#[derive(Debug)]
pub struct ImportIssue {
    /// Item concerned, when known
    pub item_id: Option<i64>,
    /// What went wrong
    pub error: JobError,
}

/// Summary of an import
#[derive(Debug, Default)]
pub struct ImportReport {
    /// Leaves that received a new translation
    pub updated: usize,
    /// Leaves that already had the same translation
    pub unchanged: usize,
    /// Accepted leaves that were left alone
    pub skipped_accepted: usize,
    /// Units without translation
    pub skipped_empty: usize,
    /// Units or items that could not be imported
    pub violations: Vec<ImportIssue>,
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} updated, {} unchanged, {} accepted skipped, {} empty, {} rejected",
            self.updated,
            self.unchanged,
            self.skipped_accepted,
            self.skipped_empty,
            self.violations.len()
        )
    }
}

/// Apply the units of a validated document to a job
///
/// Problems with single units are collected in the report and never stop
/// the remaining units from being imported.
pub fn apply_document(job: &mut Job, document: &ExchangeDocument) -> ImportReport {
    let mut report = ImportReport::default();

    for (item_id, count) in &document.header.item_leaf_counts {
        match job.item(*item_id) {
            None => report.violations.push(ImportIssue {
                item_id: Some(*item_id),
                error: JobError::NotFound(format!("job item {} in job {}", item_id, job.id)),
            }),
            Some(item) => {
                let current = item.data.translatable_leaves().len();
                if current != *count {
                    warn!(
                        "Job item {} has {} translatable leaves, the file has {}",
                        item_id, current, count
                    );
                    report.violations.push(ImportIssue {
                        item_id: Some(*item_id),
                        error: JobError::IntegrityViolation {
                            item_id: *item_id,
                            path: "*".to_string(),
                            expected: current,
                            found: *count,
                        },
                    });
                }
            }
        }
    }

    for unit in &document.units {
        let item = match job.item_mut(unit.item_id) {
            Ok(item) => item,
            Err(error) => {
                report.violations.push(ImportIssue {
                    item_id: Some(unit.item_id),
                    error,
                });
                continue;
            }
        };
        match import_unit(item, unit) {
            Ok(LeafUpdate::Updated) => report.updated += 1,
            Ok(LeafUpdate::Unchanged) => report.unchanged += 1,
            Ok(LeafUpdate::SkippedAccepted) => report.skipped_accepted += 1,
            Ok(LeafUpdate::SkippedEmpty) => report.skipped_empty += 1,
            Err(error) => report.violations.push(ImportIssue {
                item_id: Some(unit.item_id),
                error,
            }),
        }
    }

    debug!("Applied exchange document to job {}: {}", job.id, report);
    report
}

fn import_unit(item: &mut JobItem, unit: &ExchangeUnit) -> Result<LeafUpdate, JobError> {
    let leaf = item
        .data
        .get(&unit.path)
        .filter(|leaf| leaf.translate)
        .ok_or_else(|| {
            JobError::NotFound(format!("leaf {} in job item {}", unit.path, item.id))
        })?;

    if unit.target.trim().is_empty() {
        return Ok(LeafUpdate::SkippedEmpty);
    }

    let expected = structural_count(&leaf.text);
    let found = structural_count(&unit.target);
    let recorded_mismatch = unit.recorded_count.is_some_and(|recorded| recorded != expected);
    if found != expected || recorded_mismatch {
        return Err(JobError::IntegrityViolation {
            item_id: item.id,
            path: unit.path.to_string(),
            expected: unit.recorded_count.unwrap_or(expected),
            found,
        });
    }

    item.set_translation(&unit.path, &unit.target)
}
