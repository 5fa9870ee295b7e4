//! Reranker (C4). `cross_encoder.rs` is the teacher's ONNX cross-encoder,
//! kept as-is; this module adapts its `(id, text)` interface to the
//! distilled spec's `rerank(query, chunks, top_n) -> (chunks, top_score)`
//! contract, annotating each surviving chunk with `rerank_score`.

pub mod cross_encoder;

use crate::types::Chunk;
use anyhow::Result;
use cross_encoder::CrossEncoderReranker;

pub struct Reranker {
    inner: CrossEncoderReranker,
}

impl Reranker {
    pub fn new(model_dir: &std::path::Path) -> Result<Self> {
        Ok(Self {
            inner: CrossEncoderReranker::new(model_dir)?,
        })
    }

    /// Empty input returns empty result and score 0.0.
    pub fn rerank(
        &self,
        query: &str,
        chunks: Vec<Chunk>,
        top_n: usize,
    ) -> Result<(Vec<Chunk>, f32)> {
        if chunks.is_empty() {
            return Ok((Vec::new(), 0.0));
        }

        let ids_and_text: Vec<(String, String)> = chunks
            .iter()
            .enumerate()
            .map(|(i, c)| (i.to_string(), c.text.clone()))
            .collect();

        let scored = self.inner.rerank_batch(query, &ids_and_text, top_n)?;

        let mut reranked: Vec<Chunk> = scored
            .iter()
            .map(|(id, score)| {
                let idx: usize = id.parse().expect("ids are indices we generated above");
                let mut c = chunks[idx].clone();
                c.rerank_score = Some(*score);
                c
            })
            .collect();

        reranked.sort_by(|a, b| {
            b.rerank_score
                .unwrap_or(f32::MIN)
                .partial_cmp(&a.rerank_score.unwrap_or(f32::MIN))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let top_score = reranked.first().and_then(|c| c.rerank_score).unwrap_or(0.0);
        Ok((reranked, top_score))
    }
}
