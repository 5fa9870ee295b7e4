//! Retrieval node (distilled §4.9 "Retrieval"). No LLM call. Grounded on
//! `original_source/l88_backend/graph/nodes/retrieval.py`: dedup/filter/
//! fusion order, `(doc_id, chunk_idx)` as the union key.

use crate::embeddings::EmbeddingModel;
use crate::error::Result;
use crate::indexes::IndexStore;
use crate::pipeline::state::{PipelineState, QueryType};
use crate::reranking::Reranker;
use crate::types::{Chunk, Source};
use std::collections::{HashMap, HashSet};

pub struct RetrievalDeps<'a> {
    pub embedder: &'a dyn EmbeddingModel,
    pub indexes: &'a IndexStore,
    pub reranker: &'a Reranker,
    pub retrieve_top_k: usize,
    pub rerank_top_n: usize,
    pub bm25_weight_simple: f32,
    pub bm25_weight_other: f32,
    pub confidence_threshold: f32,
}

/// For each rewritten query: embed, search (session dense+sparse, or
/// library-only under `web_mode`), fuse with a query-type-dependent weight
/// map. Union across queries with first-occurrence-wins dedup, filter
/// session chunks to `selected_doc_ids` (library chunks always survive),
/// then rerank the merged set with the *original* query.
pub fn retrieve(state: &mut PipelineState, deps: &RetrievalDeps) -> Result<()> {
    let queries: Vec<String> = if state.rewritten_queries.is_empty() {
        vec![state.query.clone()]
    } else {
        state.rewritten_queries.clone()
    };

    let (w_dense, w_bm25) = match state.query_type {
        Some(QueryType::Simple) | None => (1.0 - deps.bm25_weight_simple, deps.bm25_weight_simple),
        Some(_) => (1.0 - deps.bm25_weight_other, deps.bm25_weight_other),
    };

    let mut seen: HashSet<(String, u32)> = HashSet::new();
    let mut merged: Vec<Chunk> = Vec::new();

    for q in &queries {
        let query_vector = deps
            .embedder
            .embed(&[q.as_str()], true)
            .map_err(|e| crate::error::RagError::Transient(format!("embedding failed: {e}")))?
            .into_iter()
            .next()
            .unwrap_or_default();

        let fused = if state.web_mode {
            fuse_library_only(deps, &query_vector)
        } else {
            fuse_session(deps, &state.session_id, &query_vector, q, w_dense, w_bm25)?
        };

        for chunk in fused {
            let key = chunk.key();
            if seen.insert(key) {
                merged.push(chunk);
            }
        }
    }

    let selected: HashSet<&String> = state.selected_doc_ids.iter().collect();
    merged.retain(|c| c.source == Source::Library || selected.contains(&c.doc_id));

    let (reranked, top_score) = deps
        .reranker
        .rerank(&state.query, merged, deps.rerank_top_n)
        .map_err(|e| crate::error::RagError::Transient(format!("reranking failed: {e}")))?;

    state.found = !reranked.is_empty();
    state.confident = top_score >= deps.confidence_threshold;
    state.chunks = reranked;
    Ok(())
}

fn fuse_library_only(deps: &RetrievalDeps, query_vector: &[f32]) -> Vec<Chunk> {
    let handle = deps.indexes.library();
    let guard = handle.read();
    if guard.dense.count() == 0 {
        return Vec::new();
    }
    guard.dense.search(query_vector, deps.retrieve_top_k)
}

fn fuse_session(
    deps: &RetrievalDeps,
    session_id: &str,
    query_vector: &[f32],
    query_text: &str,
    w_dense: f32,
    w_bm25: f32,
) -> Result<Vec<Chunk>> {
    let handle = deps.indexes.session(session_id)?;
    let guard = handle.read();

    let dense_hits = if guard.dense.count() > 0 {
        guard.dense.search(query_vector, deps.retrieve_top_k)
    } else {
        Vec::new()
    };
    let sparse_hits = if guard.sparse.count() > 0 {
        guard.sparse.search(query_text, deps.retrieve_top_k)
    } else {
        Vec::new()
    };

    Ok(fuse_hits(dense_hits, sparse_hits, w_dense, w_bm25))
}

/// Linear score fusion over the union of a dense-search and a sparse-search
/// result set, keyed by `(doc_id, chunk_idx)`. A key present on only one
/// side is scored at weight 1.0 for that side (distilled §4.9 Retrieval:
/// "If only one index produced results for this key, use that side with
/// weight 1.0").
fn fuse_hits(dense_hits: Vec<Chunk>, sparse_hits: Vec<Chunk>, w_dense: f32, w_bm25: f32) -> Vec<Chunk> {
    let dense_by_key: HashMap<(String, u32), f32> = dense_hits
        .iter()
        .map(|c| (c.key(), c.score.unwrap_or(0.0)))
        .collect();
    let bm25_by_key: HashMap<(String, u32), f32> = sparse_hits
        .iter()
        .map(|c| (c.key(), c.bm25_score.unwrap_or(0.0)))
        .collect();

    let mut base: HashMap<(String, u32), Chunk> = HashMap::new();
    for c in dense_hits.into_iter().chain(sparse_hits.into_iter()) {
        base.entry(c.key()).or_insert_with(|| c.without_scores());
    }

    base.into_iter()
        .map(|(key, mut chunk)| {
            let dense = dense_by_key.get(&key).copied();
            let bm25 = bm25_by_key.get(&key).copied();
            let fused_score = match (dense, bm25) {
                (Some(d), Some(b)) => w_dense * d + w_bm25 * b,
                (Some(d), None) => d,
                (None, Some(b)) => b,
                (None, None) => 0.0,
            };
            chunk.score = Some(fused_score);
            chunk.bm25_score = bm25;
            chunk
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(doc_id: &str, idx: u32, dense: Option<f32>, bm25: Option<f32>) -> Chunk {
        Chunk {
            text: format!("chunk {idx}"),
            doc_id: doc_id.into(),
            filename: "a.pdf".into(),
            page: 1,
            chunk_idx: idx,
            source: Source::Session,
            score: dense,
            bm25_score: bm25,
            rerank_score: None,
        }
    }

    /// distilled §8 scenario 6: for query_type=simple a BM25-only chunk
    /// (bm25=1.0) fuses to 0.6 and outranks a dense-only chunk (dense=1.0)
    /// which fuses to 0.4.
    #[test]
    fn hybrid_fusion_weights_match_simple_query_type_and_ranks_bm25_first() {
        let w_dense = 1.0 - 0.6_f32;
        let w_bm25 = 0.6_f32;

        let dense_hits = vec![chunk("d1", 1, Some(1.0), None)];
        let sparse_hits = vec![chunk("d1", 0, None, Some(1.0))];

        let mut fused = fuse_hits(dense_hits, sparse_hits, w_dense, w_bm25);
        fused.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());

        assert_eq!(fused[0].chunk_idx, 0);
        assert_eq!(fused[0].score, Some(0.6));
        assert_eq!(fused[1].chunk_idx, 1);
        assert_eq!(fused[1].score, Some(0.4));
    }

    #[test]
    fn key_present_on_both_sides_uses_weighted_sum() {
        let dense_hits = vec![chunk("d1", 0, Some(0.5), None)];
        let sparse_hits = vec![chunk("d1", 0, None, Some(2.0))];
        let fused = fuse_hits(dense_hits, sparse_hits, 0.8, 0.2);
        assert_eq!(fused.len(), 1);
        let expected = 0.8 * 0.5 + 0.2 * 2.0;
        assert!((fused[0].score.unwrap() - expected).abs() < 1e-6);
    }

    #[test]
    fn dedup_by_doc_id_and_chunk_idx_keeps_one_entry_across_sources() {
        let dense_hits = vec![chunk("d1", 0, Some(1.0), None), chunk("d1", 1, Some(0.2), None)];
        let sparse_hits = vec![chunk("d1", 0, None, Some(0.9))];
        let fused = fuse_hits(dense_hits, sparse_hits, 0.4, 0.6);
        assert_eq!(fused.len(), 2);
    }
}
