//! Per-session and library index lifecycle (distilled spec §5, §6).
//!
//! Grounded on `original_source/l88_backend/services/document_service.py`
//! (`VectorStore.load(index_dir)` / `.save(index_dir)` pairing a FAISS store
//! with a BM25 store under the same directory) and on SPEC_FULL.md §5's
//! "per-session `RwLock` guards a `SessionIndexes{dense,sparse}` bundle"
//! detail — one lock acquisition covers both indexes for a session so a
//! concurrent ingest and query can't observe a torn cross-index read.

use crate::config::RagConfig;
use crate::error::Result;
use crate::storage::{DenseIndex, SparseIndex};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A session's (or the library's) dense+sparse index pair, loaded and saved
/// together so they never drift out of alignment.
pub struct SessionIndexes {
    pub dense: DenseIndex,
    pub sparse: SparseIndex,
}

impl SessionIndexes {
    fn load(dir: &Path, dimension: usize) -> Result<Self> {
        Ok(Self {
            dense: DenseIndex::load(dir, dimension)?,
            sparse: SparseIndex::load(dir)?,
        })
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        self.dense.save(dir)?;
        self.sparse.save(dir)?;
        Ok(())
    }
}

/// Owns the on-disk layout in distilled spec §6 and the in-memory
/// `RwLock<SessionIndexes>` per session (shared for search, exclusive for
/// ingest/delete — SPEC_FULL.md §5).
pub struct IndexStore {
    root: PathBuf,
    dimension: usize,
    sessions: RwLock<HashMap<String, Arc<RwLock<SessionIndexes>>>>,
    library: Arc<RwLock<SessionIndexes>>,
}

impl IndexStore {
    pub fn open(config: &RagConfig) -> Result<Self> {
        let library = SessionIndexes::load(&Self::library_index_dir(&config.data_dir), config.embedding.dimension)?;
        Ok(Self {
            root: config.data_dir.clone(),
            dimension: config.embedding.dimension,
            sessions: RwLock::new(HashMap::new()),
            library: Arc::new(RwLock::new(library)),
        })
    }

    pub fn session_docs_dir(&self, session_id: &str) -> PathBuf {
        self.root.join("sessions").join(session_id).join("docs")
    }

    pub fn session_index_dir(&self, session_id: &str) -> PathBuf {
        self.root.join("sessions").join(session_id).join("index")
    }

    pub fn library_docs_dir(&self) -> PathBuf {
        self.root.join("library").join("docs")
    }

    fn library_index_dir(root: &Path) -> PathBuf {
        root.join("library").join("index")
    }

    /// Returns the cached handle for a session, lazily loading it from disk
    /// on first access (corruption at load time degrades to an empty index
    /// per distilled §7 item 3 — `DenseIndex`/`SparseIndex::load` already
    /// implement that at the file level).
    pub fn session(&self, session_id: &str) -> Result<Arc<RwLock<SessionIndexes>>> {
        if let Some(existing) = self.sessions.read().get(session_id) {
            return Ok(existing.clone());
        }
        let mut sessions = self.sessions.write();
        if let Some(existing) = sessions.get(session_id) {
            return Ok(existing.clone());
        }
        let loaded = SessionIndexes::load(&self.session_index_dir(session_id), self.dimension)?;
        let handle = Arc::new(RwLock::new(loaded));
        sessions.insert(session_id.to_string(), handle.clone());
        Ok(handle)
    }

    pub fn library(&self) -> Arc<RwLock<SessionIndexes>> {
        self.library.clone()
    }

    /// Replaces a session's in-memory handle wholesale (used after a
    /// delete-triggered rebuild, so in-flight readers holding the old `Arc`
    /// finish against a consistent snapshot rather than being mutated
    /// underneath them).
    pub fn replace_session(&self, session_id: &str, indexes: SessionIndexes) {
        self.sessions
            .write()
            .insert(session_id.to_string(), Arc::new(RwLock::new(indexes)));
    }

    pub fn library_index_path(&self) -> PathBuf {
        Self::library_index_dir(&self.root)
    }

    pub fn replace_library(&self, indexes: SessionIndexes) {
        *self.library.write() = indexes;
    }
}
