/*!
 * Table layout of the job store and its upgrade path.
 *
 * Every schema change is a numbered [`Migration`]. Opening a database runs
 * the migrations it has not seen yet, each in its own transaction, and
 * records the reached version in `schema_version`.
 */

use anyhow::{Context, Result};
use log::{debug, info};
use rusqlite::{Connection, OptionalExtension};

/// Version reached after all known migrations ran
pub const SCHEMA_VERSION: i32 = 1;

struct Migration {
    version: i32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "jobs, items, messages and exports",
    sql: r#"
        CREATE TABLE jobs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_language TEXT NOT NULL,
            target_language TEXT NOT NULL,
            translator TEXT,
            settings TEXT NOT NULL DEFAULT '{}',
            state TEXT NOT NULL DEFAULT 'unprocessed',
            busy INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            changed_at TEXT NOT NULL
        );
        CREATE INDEX idx_jobs_state ON jobs(state);
        CREATE INDEX idx_jobs_translator ON jobs(translator);

        CREATE TABLE job_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id INTEGER NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            plugin TEXT NOT NULL,
            source_type TEXT NOT NULL,
            source_id TEXT NOT NULL,
            label TEXT NOT NULL,
            data TEXT NOT NULL,
            state TEXT NOT NULL DEFAULT 'inactive',
            word_count INTEGER NOT NULL DEFAULT 0,
            count_pending INTEGER NOT NULL DEFAULT 0,
            count_translated INTEGER NOT NULL DEFAULT 0,
            count_reviewed INTEGER NOT NULL DEFAULT 0,
            count_accepted INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX idx_job_items_job ON job_items(job_id, position);
        CREATE INDEX idx_job_items_source ON job_items(plugin, source_type, source_id);

        CREATE TABLE job_messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id INTEGER NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
            item_id INTEGER,
            severity TEXT NOT NULL,
            message TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX idx_job_messages_job ON job_messages(job_id);

        CREATE TABLE job_exports (
            export_id TEXT PRIMARY KEY,
            job_id INTEGER NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
            format TEXT NOT NULL,
            digest TEXT NOT NULL,
            location TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX idx_job_exports_job ON job_exports(job_id);
    "#,
}];

/// Brings a freshly opened connection up to [`SCHEMA_VERSION`]
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    // Per connection, so it has to be repeated on every open
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        );",
    )?;

    let version = stored_version(conn)?;
    if version >= SCHEMA_VERSION {
        debug!("Job database schema at v{}", version);
        return Ok(());
    }
    migrate_schema(conn, version)
}

/// Applies every migration newer than `from_version`
pub fn migrate_schema(conn: &Connection, from_version: i32) -> Result<()> {
    for migration in MIGRATIONS.iter().filter(|m| m.version > from_version) {
        info!(
            "Applying job database migration v{}: {}",
            migration.version, migration.description
        );
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(migration.sql)
            .with_context(|| format!("Migration v{} failed", migration.version))?;
        tx.execute(
            "INSERT INTO schema_version (id, version, updated_at) VALUES (1, ?1, datetime('now'))
             ON CONFLICT(id) DO UPDATE SET version = excluded.version, updated_at = excluded.updated_at",
            [migration.version],
        )?;
        tx.commit()?;
    }
    Ok(())
}

fn stored_version(conn: &Connection) -> Result<i32> {
    let version = conn
        .query_row("SELECT version FROM schema_version WHERE id = 1", [], |row| row.get(0))
        .optional()
        .context("Cannot read job database schema version")?;
    Ok(version.unwrap_or(0))
}
