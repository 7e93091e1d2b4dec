/*!
 * Repository layer for database operations.
 *
 * This module provides a high-level API for all database operations,
 * abstracting away the SQL details and providing type-safe access.
 */

use anyhow::{Context, Result};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};

use crate::job::{Job, JobMessage, JobState, MessageSeverity};

use super::connection::DatabaseConnection;
use super::models::{ExportRecord, JobItemRecord, JobRecord, JobSummary};

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    /// Database connection
    db: DatabaseConnection,
}

impl Repository {
    /// Create a new repository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with the default database location
    pub fn new_default() -> Result<Self> {
        let db = DatabaseConnection::new_default()?;
        Ok(Self::new(db))
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let db = DatabaseConnection::new_in_memory()?;
        Ok(Self::new(db))
    }

    /// The underlying connection
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    // =========================================================================
    // Job Operations
    // =========================================================================

    /// Insert or update a job and all of its items in one transaction
    ///
    /// Returns the job with database ids assigned to it and its items.
    pub async fn save_job(&self, job: &Job) -> Result<Job> {
        let mut job = job.clone();

        self.db
            .transaction_async(move |tx| {
                let record = JobRecord::from_job(&job)?;
                if job.id == 0 {
                    tx.execute(
                        r#"
                        INSERT INTO jobs (
                            source_language, target_language, translator, settings,
                            state, busy, created_at, changed_at
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                        "#,
                        params![
                            record.source_language,
                            record.target_language,
                            record.translator,
                            record.settings,
                            record.state,
                            record.busy,
                            record.created_at,
                            record.changed_at,
                        ],
                    )?;
                    job.id = tx.last_insert_rowid();
                    debug!("Created job {}", job.id);
                } else {
                    let updated = tx.execute(
                        r#"
                        UPDATE jobs SET
                            source_language = ?2, target_language = ?3, translator = ?4,
                            settings = ?5, state = ?6, busy = ?7, changed_at = ?8
                        WHERE id = ?1
                        "#,
                        params![
                            record.id,
                            record.source_language,
                            record.target_language,
                            record.translator,
                            record.settings,
                            record.state,
                            record.busy,
                            record.changed_at,
                        ],
                    )?;
                    if updated == 0 {
                        anyhow::bail!("Job {} does not exist", job.id);
                    }
                }

                let job_id = job.id;
                for (position, item) in job.items.iter_mut().enumerate() {
                    let record = JobItemRecord::from_item(item, job_id, position)?;
                    if item.id == 0 {
                        tx.execute(
                            r#"
                            INSERT INTO job_items (
                                job_id, position, plugin, source_type, source_id, label, data,
                                state, word_count, count_pending, count_translated,
                                count_reviewed, count_accepted
                            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                            "#,
                            params![
                                record.job_id,
                                record.position,
                                record.plugin,
                                record.source_type,
                                record.source_id,
                                record.label,
                                record.data,
                                record.state,
                                record.word_count,
                                record.count_pending,
                                record.count_translated,
                                record.count_reviewed,
                                record.count_accepted,
                            ],
                        )?;
                        item.id = tx.last_insert_rowid();
                    } else {
                        tx.execute(
                            r#"
                            UPDATE job_items SET
                                position = ?3, label = ?4, data = ?5, state = ?6,
                                word_count = ?7, count_pending = ?8, count_translated = ?9,
                                count_reviewed = ?10, count_accepted = ?11
                            WHERE id = ?1 AND job_id = ?2
                            "#,
                            params![
                                record.id,
                                record.job_id,
                                record.position,
                                record.label,
                                record.data,
                                record.state,
                                record.word_count,
                                record.count_pending,
                                record.count_translated,
                                record.count_reviewed,
                                record.count_accepted,
                            ],
                        )?;
                    }
                    item.job_id = job_id;
                }

                Ok(job)
            })
            .await
    }

    /// Load a job with its items
    pub async fn load_job(&self, job_id: i64) -> Result<Option<Job>> {
        self.db
            .execute_async(move |conn| Self::load_job_sync(conn, job_id))
            .await
    }

    /// Load a job (synchronous version for use within transactions)
    fn load_job_sync(conn: &Connection, job_id: i64) -> Result<Option<Job>> {
        let record = conn
            .query_row(
                r#"
                SELECT id, source_language, target_language, translator, settings,
                       state, busy, created_at, changed_at
                FROM jobs WHERE id = ?1
                "#,
                [job_id],
                |row| {
                    Ok(JobRecord {
                        id: row.get(0)?,
                        source_language: row.get(1)?,
                        target_language: row.get(2)?,
                        translator: row.get(3)?,
                        settings: row.get(4)?,
                        state: row.get(5)?,
                        busy: row.get(6)?,
                        created_at: row.get(7)?,
                        changed_at: row.get(8)?,
                    })
                },
            )
            .optional()?;

        let Some(record) = record else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            r#"
            SELECT id, job_id, position, plugin, source_type, source_id, label, data,
                   state, word_count, count_pending, count_translated,
                   count_reviewed, count_accepted
            FROM job_items WHERE job_id = ?1
            ORDER BY position, id
            "#,
        )?;
        let items = stmt
            .query_map([job_id], |row| {
                Ok(JobItemRecord {
                    id: row.get(0)?,
                    job_id: row.get(1)?,
                    position: row.get(2)?,
                    plugin: row.get(3)?,
                    source_type: row.get(4)?,
                    source_id: row.get(5)?,
                    label: row.get(6)?,
                    data: row.get(7)?,
                    state: row.get(8)?,
                    word_count: row.get(9)?,
                    count_pending: row.get(10)?,
                    count_translated: row.get(11)?,
                    count_reviewed: row.get(12)?,
                    count_accepted: row.get(13)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Some(record.into_job(items)?))
    }

    /// Summaries of all jobs, newest first
    pub async fn list_jobs(&self) -> Result<Vec<JobSummary>> {
        self.db
            .execute_async(|conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT j.id, j.source_language, j.target_language, j.translator, j.state,
                           j.busy, COUNT(i.id), COALESCE(SUM(i.word_count), 0),
                           COALESCE(SUM(i.count_pending + i.count_translated
                                         + i.count_reviewed + i.count_accepted), 0),
                           COALESCE(SUM(i.count_accepted), 0), j.changed_at
                    FROM jobs j
                    LEFT JOIN job_items i ON i.job_id = j.id
                    GROUP BY j.id
                    ORDER BY j.id DESC
                    "#,
                )?;

                let jobs = stmt
                    .query_map([], |row| {
                        Ok(JobSummary {
                            id: row.get(0)?,
                            source_language: row.get(1)?,
                            target_language: row.get(2)?,
                            translator: row.get(3)?,
                            state: row
                                .get::<_, String>(4)?
                                .parse()
                                .unwrap_or(JobState::Unprocessed),
                            busy: row.get(5)?,
                            item_count: row.get(6)?,
                            word_count: row.get(7)?,
                            leaf_count: row.get(8)?,
                            count_accepted: row.get(9)?,
                            changed_at: row.get(10)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;

                Ok(jobs)
            })
            .await
    }

    /// Delete a job; items, messages and exports go with it
    pub async fn delete_job(&self, job_id: i64) -> Result<bool> {
        self.db
            .execute_async(move |conn| {
                let deleted = conn.execute("DELETE FROM jobs WHERE id = ?1", [job_id])?;
                Ok(deleted > 0)
            })
            .await
    }

    /// Ids of busy jobs bound to a translator
    pub async fn busy_jobs_for_translator(&self, translator: &str) -> Result<Vec<i64>> {
        let translator = translator.to_string();

        self.db
            .execute_async(move |conn| {
                let mut stmt =
                    conn.prepare("SELECT id FROM jobs WHERE translator = ?1 AND busy = 1 ORDER BY id")?;
                let ids = stmt
                    .query_map([translator], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<i64>, _>>()?;
                Ok(ids)
            })
            .await
    }

    // =========================================================================
    // Message Operations
    // =========================================================================

    /// Append a message to a job
    pub async fn add_message(&self, message: &JobMessage) -> Result<i64> {
        let message = message.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO job_messages (job_id, item_id, severity, message, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    "#,
                    params![
                        message.job_id,
                        message.item_id,
                        message.severity.to_string(),
                        message.message,
                        message.created_at,
                    ],
                )
                .with_context(|| format!("Failed to store message for job {}", message.job_id))?;
                Ok(conn.last_insert_rowid())
            })
            .await
    }

    /// Messages of a job in insertion order
    pub async fn messages(&self, job_id: i64) -> Result<Vec<JobMessage>> {
        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT id, job_id, item_id, severity, message, created_at
                    FROM job_messages WHERE job_id = ?1
                    ORDER BY id
                    "#,
                )?;

                let messages = stmt
                    .query_map([job_id], |row| {
                        Ok(JobMessage {
                            id: row.get(0)?,
                            job_id: row.get(1)?,
                            item_id: row.get(2)?,
                            severity: row
                                .get::<_, String>(3)?
                                .parse()
                                .unwrap_or(MessageSeverity::Status),
                            message: row.get(4)?,
                            created_at: row.get(5)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;

                Ok(messages)
            })
            .await
    }

    // =========================================================================
    // Export Operations
    // =========================================================================

    /// Record an exchange file handed out for a job
    pub async fn record_export(&self, export: &ExportRecord) -> Result<()> {
        let export = export.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO job_exports (export_id, job_id, format, digest, location, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    "#,
                    params![
                        export.export_id,
                        export.job_id,
                        export.format,
                        export.digest,
                        export.location,
                        export.created_at,
                    ],
                )?;
                Ok(())
            })
            .await
    }

    /// Most recent export of a job
    pub async fn latest_export(&self, job_id: i64) -> Result<Option<ExportRecord>> {
        self.db
            .execute_async(move |conn| {
                let export = conn
                    .query_row(
                        r#"
                        SELECT export_id, job_id, format, digest, location, created_at
                        FROM job_exports WHERE job_id = ?1
                        ORDER BY rowid DESC
                        LIMIT 1
                        "#,
                        [job_id],
                        |row| {
                            Ok(ExportRecord {
                                export_id: row.get(0)?,
                                job_id: row.get(1)?,
                                format: row.get(2)?,
                                digest: row.get(3)?,
                                location: row.get(4)?,
                                created_at: row.get(5)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(export)
            })
            .await
    }
}
