//! Exact inner-product dense index (C2). Vectors are assumed unit-L2-norm
//! (the Embedder's contract), so inner product equals cosine similarity.
//! Grounded on `original_source/l88_backend/retrieval/vectorstore.py`
//! (`VectorStore` wrapping `faiss.IndexFlatIP`); persistence format chosen
//! per DESIGN.md (serde_json, not a binary format, matching the teacher's
//! serde_json-first persistence convention).
//!
//! No deletions on the index itself — document removal is a full rebuild
//! (see `crate::ingest`).

use crate::error::{RagError, Result};
use crate::types::Chunk;
use std::path::Path;

const VEC_FILE: &str = "index.vec";
const META_FILE: &str = "metadata.json";

pub struct DenseIndex {
    dimension: usize,
    vectors: Vec<Vec<f32>>,
    metadata: Vec<Chunk>,
}

impl DenseIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
            metadata: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn count(&self) -> usize {
        self.vectors.len()
    }

    /// The full aligned metadata list, in insertion order. Used by the
    /// Summarizer, which reads document text directly rather than through
    /// `search`.
    pub fn all_chunks(&self) -> &[Chunk] {
        &self.metadata
    }

    /// Appends in order; positional alignment between `vectors` and
    /// `metadata` is an invariant maintained by construction.
    pub fn add(&mut self, chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) {
        debug_assert_eq!(chunks.len(), vectors.len());
        self.vectors.extend(vectors);
        self.metadata
            .extend(chunks.into_iter().map(Chunk::without_scores));
    }

    /// Returns at most `min(k, count())` chunks, strictly sorted by
    /// descending inner product, each annotated with `score`.
    pub fn search(&self, query_vector: &[f32], k: usize) -> Vec<Chunk> {
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, dot(v, query_vector)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored
            .into_iter()
            .take(k)
            .map(|(i, score)| {
                let mut c = self.metadata[i].clone();
                c.score = Some(score);
                c
            })
            .collect()
    }

    /// Atomic persist: both files are written to `.tmp` siblings and only
    /// renamed into place once both writes succeed, so a crash never leaves
    /// vectors persisted without matching metadata (or vice versa).
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let vec_path = dir.join(VEC_FILE);
        let meta_path = dir.join(META_FILE);
        let vec_tmp = dir.join(format!("{VEC_FILE}.tmp"));
        let meta_tmp = dir.join(format!("{META_FILE}.tmp"));

        let vec_json = serde_json::to_string(&self.vectors)?;
        std::fs::write(&vec_tmp, vec_json)?;
        let meta_json = serde_json::to_string(&self.metadata)?;
        std::fs::write(&meta_tmp, meta_json)?;

        std::fs::rename(&vec_tmp, &vec_path)?;
        std::fs::rename(&meta_tmp, &meta_path)?;
        Ok(())
    }

    /// If the index file is absent, returns an empty index with the given
    /// dimension rather than erroring.
    pub fn load(dir: &Path, dimension: usize) -> Result<Self> {
        let vec_path = dir.join(VEC_FILE);
        if !vec_path.exists() {
            return Ok(Self::new(dimension));
        }
        let meta_path = dir.join(META_FILE);

        let vectors: Vec<Vec<f32>> = match std::fs::read_to_string(&vec_path) {
            Ok(s) => serde_json::from_str(&s)
                .map_err(|e| RagError::Corruption(format!("dense index vectors: {e}")))?,
            Err(e) => return Err(RagError::Corruption(format!("dense index vectors: {e}"))),
        };
        let metadata: Vec<Chunk> = if meta_path.exists() {
            let s = std::fs::read_to_string(&meta_path)?;
            serde_json::from_str(&s)
                .map_err(|e| RagError::Corruption(format!("dense index metadata: {e}")))?
        } else {
            Vec::new()
        };

        Ok(Self {
            dimension,
            vectors,
            metadata,
        })
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Source;

    fn chunk(doc_id: &str, idx: u32) -> Chunk {
        Chunk {
            text: format!("chunk {idx}"),
            doc_id: doc_id.to_string(),
            filename: "a.pdf".into(),
            page: 1,
            chunk_idx: idx,
            source: Source::Session,
            score: None,
            bm25_score: None,
            rerank_score: None,
        }
    }

    #[test]
    fn search_returns_descending_by_inner_product() {
        let mut idx = DenseIndex::new(2);
        idx.add(
            vec![chunk("d1", 0), chunk("d1", 1)],
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
        );
        let hits = idx.search(&[0.9, 0.1], 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk_idx, 0);
        assert!(hits[0].score.unwrap() > hits[1].score.unwrap());
    }

    #[test]
    fn k_is_capped_at_count() {
        let mut idx = DenseIndex::new(2);
        idx.add(vec![chunk("d1", 0)], vec![vec![1.0, 0.0]]);
        assert_eq!(idx.search(&[1.0, 0.0], 10).len(), 1);
    }

    #[test]
    fn save_then_load_round_trips_search() {
        let dir = tempfile::tempdir().unwrap();
        let mut idx = DenseIndex::new(2);
        idx.add(
            vec![chunk("d1", 0), chunk("d1", 1)],
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
        );
        idx.save(dir.path()).unwrap();

        let loaded = DenseIndex::load(dir.path(), 2).unwrap();
        assert_eq!(loaded.count(), 2);
        let before = idx.search(&[0.7, 0.3], 2);
        let after = loaded.search(&[0.7, 0.3], 2);
        assert_eq!(
            before.iter().map(|c| c.chunk_idx).collect::<Vec<_>>(),
            after.iter().map(|c| c.chunk_idx).collect::<Vec<_>>()
        );
    }

    #[test]
    fn load_absent_file_returns_empty_index_with_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let idx = DenseIndex::load(dir.path(), 768).unwrap();
        assert_eq!(idx.count(), 0);
        assert_eq!(idx.dimension(), 768);
    }
}
