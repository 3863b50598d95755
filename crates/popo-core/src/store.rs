//! Persistence gateway for the tracker document.
//!
//! The document is always written whole. [`FileStore`] keeps it as
//! pretty-printed JSON under `<data_dir>/data/db.json`; [`MemoryStore`] keeps
//! it in memory for tests and throwaway sessions.

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::StorageBackend;
use crate::error::{PopoError, Result};
use crate::lock::StoreLock;
use crate::migrate::migrate;
use crate::model::Document;

const DB_FILE: &str = "db.json";
const LOCK_FILE: &str = "db.lock";
const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Whole-document load and save.
pub trait DocumentStore {
    /// Load the current document, migrating older shapes and repairing the
    /// current-user pointer.
    ///
    /// # Errors
    ///
    /// Fails if the stored bytes cannot be read or decoded.
    fn load(&mut self) -> Result<Document>;

    /// Replace the stored document.
    ///
    /// # Errors
    ///
    /// Fails if the document cannot be written. The previous document stays
    /// in place.
    fn save(&mut self, document: &Document) -> Result<()>;
}

/// JSON file store under a data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    data_dir: PathBuf,
    lock_timeout: Duration,
}

impl FileStore {
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            lock_timeout: LOCK_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("data").join(DB_FILE)
    }

    fn lock_path(&self) -> PathBuf {
        self.data_dir.join("data").join(LOCK_FILE)
    }

    fn read_raw(&self) -> Result<Option<Value>> {
        let path = self.db_path();
        let lock = StoreLock::shared(&self.lock_path(), self.lock_timeout)?;
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        drop(lock);

        let raw: Value = serde_json::from_slice(&bytes)
            .map_err(|err| PopoError::Format(format!("{}: {err}", path.display())))?;
        Ok(Some(raw))
    }
}

impl DocumentStore for FileStore {
    fn load(&mut self) -> Result<Document> {
        let Some(raw) = self.read_raw()? else {
            let document = Document::default();
            tracing::info!(path = %self.db_path().display(), "creating first-run document");
            self.save(&document)?;
            return Ok(document);
        };

        let mut document = migrate(&raw)?;
        let repaired = document.repair_current_user();
        if repaired || serde_json::to_value(&document)? != raw {
            tracing::debug!(
                path = %self.db_path().display(),
                repaired,
                "stored document was upgraded; saving back"
            );
            self.save(&document)?;
        }

        tracing::debug!(users = document.users.len(), "loaded document");
        Ok(document)
    }

    fn save(&mut self, document: &Document) -> Result<()> {
        let path = self.db_path();
        let lock = StoreLock::exclusive(&self.lock_path(), self.lock_timeout)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_vec_pretty(document)?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, body)?;
        fs::rename(&tmp_path, &path)?;
        drop(lock);

        tracing::debug!(path = %path.display(), users = document.users.len(), "saved document");
        Ok(())
    }
}

/// In-memory store. Starts empty and behaves like a first run.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    document: Option<Document>,
    saves: usize,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store already holding `document`, as if it had been saved before.
    #[must_use]
    pub const fn with_document(document: Document) -> Self {
        Self {
            document: Some(document),
            saves: 0,
        }
    }

    /// The last saved document.
    #[must_use]
    pub const fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    /// How many times [`DocumentStore::save`] has been called.
    #[must_use]
    pub const fn saves(&self) -> usize {
        self.saves
    }
}

impl DocumentStore for MemoryStore {
    fn load(&mut self) -> Result<Document> {
        let mut document = self.document.clone().unwrap_or_default();
        if document.repair_current_user() || self.document.is_none() {
            self.save(&document)?;
        }
        Ok(document)
    }

    fn save(&mut self, document: &Document) -> Result<()> {
        self.document = Some(document.clone());
        self.saves += 1;
        Ok(())
    }
}

/// The store selected by configuration.
#[derive(Debug, Clone)]
pub enum ConfiguredStore {
    File(FileStore),
    Memory(MemoryStore),
}

impl ConfiguredStore {
    #[must_use]
    pub fn open(backend: StorageBackend, data_dir: &Path) -> Self {
        match backend {
            StorageBackend::File => Self::File(FileStore::new(data_dir)),
            StorageBackend::Memory => Self::Memory(MemoryStore::new()),
        }
    }
}

impl DocumentStore for ConfiguredStore {
    fn load(&mut self) -> Result<Document> {
        match self {
            Self::File(store) => store.load(),
            Self::Memory(store) => store.load(),
        }
    }

    fn save(&mut self, document: &Document) -> Result<()> {
        match self {
            Self::File(store) => store.save(document),
            Self::Memory(store) => store.save(document),
        }
    }
}
