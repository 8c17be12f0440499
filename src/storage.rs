// Scoped key-value storage backends

use eyre::{Context, Result, eyre};
use fs2::FileExt;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// String-keyed, string-valued persistent storage
///
/// The task list reads and writes a single fixed key; backends only need
/// whole-value get and set semantics.
pub trait KeyValueStore {
    /// Value stored under `key`, or `None` if nothing has been written
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`; removing a missing key is not an error
    fn remove(&mut self, key: &str) -> Result<()>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

/// Which backend a data directory uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Sqlite,
    File,
}

/// Open the configured backend rooted at `dir`, creating the directory
pub fn open_backend(backend: Backend, dir: &Path) -> Result<Box<dyn KeyValueStore>> {
    fs::create_dir_all(dir).context("Failed to create data directory")?;
    Ok(match backend {
        Backend::Sqlite => Box::new(SqliteStorage::open(dir.join("todolist.db"))?),
        Backend::File => Box::new(FileStorage::open(dir)?),
    })
}

// ============================================================================
// In-memory
// ============================================================================

/// Volatile storage, used by tests and throwaway sessions
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

// ============================================================================
// SQLite
// ============================================================================

/// Key-value table in a SQLite database
pub struct SqliteStorage {
    db: Connection,
}

impl SqliteStorage {
    /// Open or create the database file at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = Connection::open(path.as_ref()).context("Failed to open SQLite database")?;
        Self::with_connection(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        Self::with_connection(db)
    }

    fn with_connection(db: Connection) -> Result<Self> {
        debug!("Creating key-value schema");
        db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(Self { db })
    }
}

impl KeyValueStore for SqliteStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .db
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.db.execute(
            "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![key, value, crate::now_ms()],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.db.execute("DELETE FROM kv WHERE key = ?1", [key])?;
        Ok(())
    }
}

// ============================================================================
// JSON files
// ============================================================================

/// One `<key>.json` file per key inside a directory
///
/// Writes go to a temp file that is renamed over the target while an
/// exclusive lock on `<key>.lock` is held.
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).context("Failed to create storage directory")?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn value_path(&self, key: &str) -> Result<PathBuf> {
        Self::validate_key(key)?;
        Ok(self.base_path.join(format!("{}.json", key)))
    }

    fn validate_key(key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(eyre!("Storage key cannot be empty"));
        }
        if key.len() > 64 {
            return Err(eyre!("Storage key too long: {} (max 64 chars)", key));
        }
        if !key.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
            return Err(eyre!("Invalid storage key: {} (must be alphanumeric with _/-)", key));
        }
        Ok(())
    }

    fn lock(&self, key: &str) -> Result<fs::File> {
        let lock_path = self.base_path.join(format!("{}.lock", key));
        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .context("Failed to open lock file")?;
        file.lock_exclusive().context("Failed to acquire file lock")?;
        Ok(file)
    }
}

impl KeyValueStore for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.value_path(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Some(content))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.value_path(key)?;
        let _lock = self.lock(key)?;

        let tmp_path = path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp_path).context("Failed to create temp file")?;
        file.write_all(value.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, &path).context("Failed to replace value file")?;

        // Lock is released when `_lock` is dropped
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let path = self.value_path(key)?;
        let _lock = self.lock(key)?;
        if path.exists() {
            fs::remove_file(&path).context("Failed to remove value file")?;
        }
        Ok(())
    }
}
