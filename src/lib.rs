/*!
 * # lingotrack - translation job management
 *
 * A Rust library that tracks the translation of structured content through
 * human and machine translators.
 *
 * ## Features
 *
 * - Translation jobs with a strict lifecycle (unprocessed, active, rejected,
 *   aborted, finished) and per-item review states
 * - Hierarchical data trees of translatable leaves with protected
 *   (escaped) substrings
 * - XLIFF 1.2 and HTML exchange files with per-leaf integrity checks
 * - Pluggable content sources and translators
 * - Suggestions of related content for a job
 * - SQLite persistence of jobs, messages and exports
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `data`: Data trees, escaping and word counting
 * - `job`: Jobs, job items, messages and the `JobManager` service
 * - `exchange`: XLIFF and HTML exchange formats and import checks
 * - `providers`: Translator plugins:
 *   - `providers::file`: exchange file translator
 *   - `providers::mock`: deterministic local translator
 *   - `providers::language_cache`: supported language cache
 * - `sources`: Source plugins for in-memory and JSON file content
 * - `database`: SQLite storage
 * - `registry`: Plugin and translator registry
 * - `suggestions`: Related content suggestions
 * - `file_utils`: File system operations
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod data;
pub mod database;
pub mod errors;
pub mod exchange;
pub mod file_utils;
pub mod job;
pub mod language_utils;
pub mod providers;
pub mod registry;
pub mod sources;
pub mod suggestions;

// Re-export main types for easier usage
pub use app_config::Config;
pub use data::{DataLeaf, DataPath, DataTree, Escaper};
pub use errors::{AppError, ErrorKind, JobError, ProviderError, SourceError};
pub use exchange::{ExchangeFormat, HtmlFormat, ImportReport, XliffFormat};
pub use job::{Job, JobItem, JobItemState, JobManager, JobState, RequestOutcome};
pub use language_utils::{get_language_name, language_codes_match, normalize_to_part2t};
pub use registry::Registry;
pub use suggestions::{Suggestion, SuggestionEngine};
