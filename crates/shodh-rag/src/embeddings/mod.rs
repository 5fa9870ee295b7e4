//! Embedder (C1). `bge.rs` is a generalization of the teacher's `e5.rs`
//! (same `ort::Session` + tokenizer + LRU-cache structure), using the
//! `tokenizers` crate (as the teacher's reranker already does) rather than
//! the E5-specific hand-rolled SentencePiece tokenizer, since the target
//! model family here is a generic BERT-style bi-encoder.

pub mod bge;

use anyhow::Result;

/// `embed(texts, is_query)` per distilled spec §4.1: deterministic,
/// unit-L2-norm output, fixed dimension for the corpus's lifetime.
pub trait EmbeddingModel: Send + Sync {
    fn embed(&self, texts: &[&str], is_query: bool) -> Result<Vec<Vec<f32>>>;
    fn dimension(&self) -> usize;
}
