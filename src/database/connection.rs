/*!
 * SQLite handle shared by every repository call.
 *
 * Jobs, items, messages and export records live in one database file. The
 * handle is cheap to clone; all clones share one `rusqlite::Connection`
 * and queue on its mutex. Async callers are moved onto the blocking pool.
 */

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use rusqlite::{Connection, Transaction};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use super::schema;

const DATA_DIR_NAME: &str = "lingotrack";
const DATABASE_FILE_NAME: &str = "lingotrack.db";
const IN_MEMORY: &str = ":memory:";

/// Milliseconds SQLite waits on a lock held by another process
const BUSY_TIMEOUT_MS: u64 = 5_000;

/// Shared handle on the job store
#[derive(Clone)]
pub struct DatabaseConnection {
    location: PathBuf,
    inner: Arc<Mutex<Connection>>,
}

impl fmt::Debug for DatabaseConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConnection")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl DatabaseConnection {
    /// Opens the store under the user's local data directory
    pub fn new_default() -> Result<Self> {
        Self::new(Self::default_database_path()?)
    }

    /// Opens (or creates) the store at `path`, creating missing directories
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let location = path.as_ref().to_path_buf();
        if let Some(dir) = location.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create directory {}", dir.display()))?;
        }

        info!("Using job database {}", location.display());
        let conn = Connection::open(&location)
            .with_context(|| format!("Cannot open job database {}", location.display()))?;
        conn.busy_timeout(std::time::Duration::from_millis(BUSY_TIMEOUT_MS))?;

        Self::prepare(conn, location)
    }

    /// Throwaway store used by tests and dry runs
    pub fn new_in_memory() -> Result<Self> {
        debug!("Opening in-memory job database");
        let conn = Connection::open_in_memory().context("Cannot open in-memory job database")?;
        Self::prepare(conn, PathBuf::from(IN_MEMORY))
    }

    fn prepare(conn: Connection, location: PathBuf) -> Result<Self> {
        schema::initialize_schema(&conn)?;
        Ok(Self {
            location,
            inner: Arc::new(Mutex::new(conn)),
        })
    }

    /// `<local data dir>/lingotrack/lingotrack.db`, falling back to `~/.local/share`
    pub fn default_database_path() -> Result<PathBuf> {
        let base = dirs::data_local_dir()
            .or_else(dirs::data_dir)
            .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("share")))
            .ok_or_else(|| anyhow!("No data directory available for the job database"))?;
        Ok(base.join(DATA_DIR_NAME).join(DATABASE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.location
    }

    fn is_in_memory(&self) -> bool {
        self.location.as_os_str() == IN_MEMORY
    }

    fn acquire(inner: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
        inner
            .lock()
            .map_err(|_| anyhow!("Job database handle poisoned by an earlier panic"))
    }

    fn commit<T>(conn: &mut Connection, f: impl FnOnce(&Transaction) -> Result<T>) -> Result<T> {
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit().context("Commit of job database transaction failed")?;
        Ok(value)
    }

    /// Runs `f` on the calling thread. Prefer [`Self::execute_async`] inside tokio tasks.
    pub fn execute<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = Self::acquire(&self.inner)?;
        f(&conn)
    }

    pub async fn execute_async<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let conn = Self::acquire(&inner)?;
            f(&conn)
        })
        .await
        .context("Job database query aborted")?
    }

    /// Runs `f` inside a transaction; any error rolls everything back
    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction) -> Result<T>,
    {
        let mut conn = Self::acquire(&self.inner)?;
        Self::commit(&mut conn, f)
    }

    pub async fn transaction_async<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut conn = Self::acquire(&inner)?;
            Self::commit(&mut conn, f)
        })
        .await
        .context("Job database transaction aborted")?
    }

    /// Row counts of every job table plus the file size on disk
    pub fn stats(&self) -> Result<DatabaseStats> {
        let [job_count, item_count, message_count, export_count] = self.execute(|conn| {
            let mut counts = [0i64; 4];
            for (slot, table) in counts
                .iter_mut()
                .zip(["jobs", "job_items", "job_messages", "job_exports"])
            {
                *slot = conn
                    .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
                    .with_context(|| format!("Cannot count rows of {}", table))?;
            }
            Ok(counts)
        })?;

        let file_size_bytes = if self.is_in_memory() {
            0
        } else {
            std::fs::metadata(&self.location).map(|m| m.len()).unwrap_or(0)
        };

        Ok(DatabaseStats {
            job_count,
            item_count,
            message_count,
            export_count,
            file_size_bytes,
        })
    }
}

/// Snapshot returned by [`DatabaseConnection::stats`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseStats {
    pub job_count: i64,
    pub item_count: i64,
    pub message_count: i64,
    pub export_count: i64,
    pub file_size_bytes: u64,
}

impl fmt::Display for DatabaseStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Jobs:      {}", self.job_count)?;
        writeln!(f, "Items:     {}", self.item_count)?;
        writeln!(f, "Messages:  {}", self.message_count)?;
        writeln!(f, "Exports:   {}", self.export_count)?;
        write!(f, "File size: {} KB", self.file_size_bytes / 1024)
    }
}
