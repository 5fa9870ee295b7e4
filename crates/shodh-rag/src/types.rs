//! Core data model. See SPEC_FULL.md §3.

use serde::{Deserialize, Serialize};

/// Tag distinguishing a chunk's origin index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Session,
    Library,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Session => "session",
            Source::Library => "library",
        }
    }
}

/// The central retrieval unit. `score`/`bm25_score`/`rerank_score` are
/// transient — populated only on chunks returned from a retrieval call, not
/// meaningful (and left `None`) on chunks read straight from an index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub doc_id: String,
    pub filename: String,
    /// 1-indexed page number.
    pub page: u32,
    /// Monotonically increasing per-document index, starting at 0.
    pub chunk_idx: u32,
    pub source: Source,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bm25_score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
}

impl Chunk {
    /// `(doc_id, chunk_idx)` — the global dedup/identity key across sources.
    pub fn key(&self) -> (String, u32) {
        (self.doc_id.clone(), self.chunk_idx)
    }

    /// Strip transient retrieval fields, as stored in a persisted index.
    pub fn without_scores(mut self) -> Self {
        self.score = None;
        self.bm25_score = None;
        self.rerank_score = None;
        self
    }
}

/// A page of extracted text, as produced by the Parser and consumed by the Chunker.
#[derive(Debug, Clone)]
pub struct Page {
    pub text: String,
    pub page: u32,
    pub filename: String,
}

/// The Chunker's raw output, before the Ingestor stamps a `doc_id` and
/// `source` onto it (distilled spec §4.7 step 3).
#[derive(Debug, Clone)]
pub struct ChunkDraft {
    pub text: String,
    pub page: u32,
    pub filename: String,
    pub chunk_idx: u32,
}

impl ChunkDraft {
    pub fn into_chunk(self, doc_id: &str, source: Source) -> Chunk {
        Chunk {
            text: self.text,
            doc_id: doc_id.to_string(),
            filename: self.filename,
            page: self.page,
            chunk_idx: self.chunk_idx,
            source,
            score: None,
            bm25_score: None,
            rerank_score: None,
        }
    }
}

/// Document metadata record (distilled spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub id: String,
    /// `None` means library-owned.
    pub session_id: Option<String>,
    pub filename: String,
    pub source: Source,
    pub page_count: u32,
    pub chunk_count: u32,
    pub selected: bool,
    pub uploaded_at: chrono::DateTime<chrono::Utc>,
}

/// Session type: transitions `general -> rag` on first ingested session
/// document, `rag -> general` when the last one is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    General,
    Rag,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub session_type: SessionType,
    pub web_mode: bool,
}

/// A citation surfaced to the caller, back-mapped from a retrieved chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub doc_id: String,
    pub filename: String,
    pub page: u32,
    pub source: Source,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_key_matches_doc_and_idx() {
        let c = Chunk {
            text: "x".into(),
            doc_id: "d1".into(),
            filename: "a.pdf".into(),
            page: 1,
            chunk_idx: 3,
            source: Source::Session,
            score: Some(0.5),
            bm25_score: None,
            rerank_score: None,
        };
        assert_eq!(c.key(), ("d1".to_string(), 3));
    }
}
