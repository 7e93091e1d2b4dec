/*!
 * Database module for persistent storage of jobs.
 *
 * This module provides SQLite-based persistence for:
 * - Jobs and their items, including the data trees
 * - Job messages
 * - Records of exchange files handed out to translators
 */

pub mod connection;
pub mod models;
pub mod repository;
pub mod schema;

// Re-export main types
pub use connection::{DatabaseConnection, DatabaseStats};
pub use models::{ExportRecord, JobSummary};
pub use repository::Repository;
