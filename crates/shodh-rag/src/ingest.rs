//! Ingestor (C7): parse -> chunk -> embed -> DenseIndex.add + SparseIndex.add
//! -> persist, and the rebuild-on-delete policy. Grounded on
//! `original_source/l88_backend/services/document_service.py`
//! (`ingest_document`/`delete_document`/`_rebuild_session_index`) and
//! `library_service.py` for the library-ingestion variant (no BM25, no
//! cache invalidation — the library isn't session-scoped).

use crate::config::RagConfig;
use crate::embeddings::EmbeddingModel;
use crate::error::{RagError, Result};
use crate::indexes::{IndexStore, SessionIndexes};
use crate::pipeline::PipelineResponse;
use crate::processing::chunker::Chunker;
use crate::processing::parser::Parser;
use crate::cache::QueryCache;
use crate::session::SessionStore;
use crate::types::{DocumentMeta, Source};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

pub struct Ingestor {
    parser: Parser,
    chunker: Chunker,
    embedder: Arc<dyn EmbeddingModel>,
    indexes: Arc<IndexStore>,
    sessions: Arc<SessionStore>,
    cache: Arc<QueryCache<PipelineResponse>>,
}

impl Ingestor {
    pub fn new(
        config: &RagConfig,
        embedder: Arc<dyn EmbeddingModel>,
        indexes: Arc<IndexStore>,
        sessions: Arc<SessionStore>,
        cache: Arc<QueryCache<PipelineResponse>>,
    ) -> Self {
        Self {
            parser: Parser::new(),
            chunker: Chunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap),
            embedder,
            indexes,
            sessions,
            cache,
        }
    }

    /// Ingests a PDF for a session (`Some(session_id)`) or the shared
    /// library (`None`). Steps 1-6 of distilled spec §4.7; step 7 (cache
    /// invalidation / session_type transition) only applies to sessions.
    pub fn ingest(
        &self,
        session_id: Option<&str>,
        filepath: &Path,
        filename: &str,
    ) -> Result<DocumentMeta> {
        if !filename.to_lowercase().ends_with(".pdf") {
            return Err(RagError::Validation(format!(
                "only PDF files are accepted, got: {filename}"
            )));
        }

        let doc_id = Uuid::new_v4().to_string();
        let source = match session_id {
            Some(_) => Source::Session,
            None => Source::Library,
        };

        let docs_dir = match session_id {
            Some(sid) => self.indexes.session_docs_dir(sid),
            None => self.indexes.library_docs_dir(),
        };
        std::fs::create_dir_all(&docs_dir)?;
        let stored_path = docs_dir.join(format!("{doc_id}.pdf"));
        std::fs::copy(filepath, &stored_path)?;

        let pages = self.parser.parse(&stored_path, filename)?;
        let page_count = pages.len() as u32;
        let drafts = self.chunker.chunk_pages(&pages);
        let chunk_count = drafts.len() as u32;
        let chunks: Vec<_> = drafts
            .into_iter()
            .map(|d| d.into_chunk(&doc_id, source))
            .collect();

        if !chunks.is_empty() {
            let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
            let vectors = self
                .embedder
                .embed(&texts, false)
                .map_err(|e| RagError::Transient(format!("embedding failed: {e}")))?;

            match session_id {
                Some(sid) => {
                    let handle = self.indexes.session(sid)?;
                    let mut guard = handle.write();
                    guard.dense.add(chunks.clone(), vectors);
                    guard.sparse.add(chunks);
                    guard.save(&self.indexes.session_index_dir(sid))?;
                }
                None => {
                    let handle = self.indexes.library();
                    let mut guard = handle.write();
                    guard.dense.add(chunks, vectors);
                    guard.save(&self.indexes.library_index_path())?;
                }
            }
        }

        let doc = DocumentMeta {
            id: doc_id,
            session_id: session_id.map(|s| s.to_string()),
            filename: filename.to_string(),
            source,
            page_count,
            chunk_count,
            selected: true,
            uploaded_at: chrono::Utc::now(),
        };

        match session_id {
            Some(sid) => {
                self.sessions.insert_document(sid, doc.clone());
                self.cache.invalidate(sid);
            }
            None => self.sessions.insert_library_document(doc.clone()),
        }

        Ok(doc)
    }

    /// Removes a document record + raw file, then rebuilds the owning
    /// index from scratch (distilled spec §4.7 `delete`: the DenseIndex
    /// doesn't support tombstoning, and a rebuild preserves the
    /// `chunk_idx`-contiguity invariant that in-place deletion would break).
    pub fn delete(&self, session_id: Option<&str>, doc_id: &str) -> Result<()> {
        let docs_dir = match session_id {
            Some(sid) => self.indexes.session_docs_dir(sid),
            None => self.indexes.library_docs_dir(),
        };
        let path = docs_dir.join(format!("{doc_id}.pdf"));
        if path.exists() {
            std::fs::remove_file(&path)?;
        }

        match session_id {
            Some(sid) => {
                self.sessions.remove_document(sid, doc_id);
                self.rebuild_session(sid)?;
                self.cache.invalidate(sid);
            }
            None => {
                self.sessions.remove_library_document(doc_id);
                self.rebuild_library()?;
            }
        }
        Ok(())
    }

    fn rebuild_session(&self, session_id: &str) -> Result<()> {
        let remaining = self.sessions.list_documents(session_id);
        let docs_dir = self.indexes.session_docs_dir(session_id);
        let mut rebuilt = SessionIndexes {
            dense: crate::storage::DenseIndex::new(self.embedder.dimension()),
            sparse: crate::storage::SparseIndex::new(),
        };

        for doc in &remaining {
            let filepath = docs_dir.join(format!("{}.pdf", doc.id));
            if !filepath.exists() {
                continue;
            }
            let pages = self.parser.parse(&filepath, &doc.filename)?;
            let drafts = self.chunker.chunk_pages(&pages);
            let chunks: Vec<_> = drafts
                .into_iter()
                .map(|d| d.into_chunk(&doc.id, Source::Session))
                .collect();
            if chunks.is_empty() {
                continue;
            }
            let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
            let vectors = self
                .embedder
                .embed(&texts, false)
                .map_err(|e| RagError::Transient(format!("embedding failed: {e}")))?;
            rebuilt.dense.add(chunks.clone(), vectors);
            rebuilt.sparse.add(chunks);
        }

        rebuilt.save(&self.indexes.session_index_dir(session_id))?;
        self.indexes.replace_session(session_id, rebuilt);
        Ok(())
    }

    fn rebuild_library(&self) -> Result<()> {
        let remaining = self.sessions.list_library_documents();
        let docs_dir = self.indexes.library_docs_dir();
        let mut rebuilt = SessionIndexes {
            dense: crate::storage::DenseIndex::new(self.embedder.dimension()),
            sparse: crate::storage::SparseIndex::new(),
        };

        for doc in &remaining {
            let filepath = docs_dir.join(format!("{}.pdf", doc.id));
            if !filepath.exists() {
                continue;
            }
            let pages = self.parser.parse(&filepath, &doc.filename)?;
            let drafts = self.chunker.chunk_pages(&pages);
            let chunks: Vec<_> = drafts
                .into_iter()
                .map(|d| d.into_chunk(&doc.id, Source::Library))
                .collect();
            if chunks.is_empty() {
                continue;
            }
            let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
            let vectors = self
                .embedder
                .embed(&texts, false)
                .map_err(|e| RagError::Transient(format!("embedding failed: {e}")))?;
            rebuilt.dense.add(chunks, vectors);
        }

        let dir = self.indexes.library_index_path();
        rebuilt.save(&dir)?;
        self.indexes.replace_library(rebuilt);
        Ok(())
    }
}
