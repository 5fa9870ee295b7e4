//! BM25 sparse index (C3). Grounded on
//! `original_source/l88_backend/retrieval/bm25store.py` (`BM25Store` wrapping
//! `rank_bm25.BM25Okapi`): same tokenizer, stopword list, and rebuild-on-add
//! strategy, reimplemented directly (Okapi BM25, k1=1.5, b=0.75 — `rank_bm25`'s
//! defaults) rather than depending on an unfamiliar crate's BM25 surface.

use crate::error::{RagError, Result};
use crate::types::Chunk;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;

const CHUNKS_FILE: &str = "bm25_chunks.json";
const MODEL_FILE: &str = "bm25.json";

const K1: f32 = 1.5;
const B: f32 = 0.75;

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "the", "is", "it", "its", "in", "on", "at", "to", "for", "of", "and", "or",
        "but", "with", "by", "from", "as", "this", "that", "these", "those", "be", "was", "were",
        "are", "has", "have", "had", "will", "would", "can", "could", "may", "might", "shall",
        "should", "do", "does", "did", "not", "so", "if", "then", "than", "into", "through",
        "about", "up", "out", "which", "who", "what", "how", "when", "where", "their", "they",
        "he", "she", "we", "you", "i", "also", "such", "other", "used", "using", "use",
    ]
    .into_iter()
    .collect()
});

static SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\s,;:.!?()\[\]{}/\\|@#$%^&*+=<>"']"#).unwrap());

/// Lowercase; split on whitespace and punctuation (hyphens/underscores
/// preserved); drop stopwords and single-character tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    SPLIT_RE
        .split(&lower)
        .filter(|t| !t.is_empty() && t.len() > 1 && !STOPWORDS.contains(t))
        .map(|t| t.to_string())
        .collect()
}

#[derive(Default, serde::Serialize, serde::Deserialize)]
struct Bm25Model {
    /// Tokenized corpus, one entry per chunk, positionally aligned with `chunks`.
    doc_tokens: Vec<Vec<String>>,
}

#[derive(Default)]
pub struct SparseIndex {
    model: Bm25Model,
    metadata: Vec<Chunk>,
}

impl SparseIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.metadata.len()
    }

    /// Appends chunks and rebuilds the corpus statistics (mirrors the
    /// reference's full-rebuild-on-add strategy).
    pub fn add(&mut self, chunks: Vec<Chunk>) {
        for c in chunks {
            self.model.doc_tokens.push(tokenize(&c.text));
            self.metadata.push(c.without_scores());
        }
    }

    /// A query tokenizing to the empty set after stopword filtering yields
    /// an empty result.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<Chunk> {
        if self.metadata.is_empty() {
            return Vec::new();
        }
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let n = self.model.doc_tokens.len() as f32;
        let avgdl: f32 = self
            .model
            .doc_tokens
            .iter()
            .map(|d| d.len() as f32)
            .sum::<f32>()
            / n;

        let mut df: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
        for doc in &self.model.doc_tokens {
            let unique: HashSet<&str> = doc.iter().map(|s| s.as_str()).collect();
            for t in unique {
                *df.entry(t).or_insert(0) += 1;
            }
        }
        let idf = |term: &str| -> f32 {
            let df_t = *df.get(term).unwrap_or(&0) as f32;
            ((n - df_t + 0.5) / (df_t + 0.5) + 1.0).ln()
        };

        let mut scored: Vec<(usize, f32)> = self
            .model
            .doc_tokens
            .iter()
            .enumerate()
            .map(|(i, doc)| {
                let dl = doc.len() as f32;
                let mut tf: std::collections::HashMap<&str, usize> =
                    std::collections::HashMap::new();
                for t in doc {
                    *tf.entry(t.as_str()).or_insert(0) += 1;
                }
                let score: f32 = query_tokens
                    .iter()
                    .map(|q| {
                        let f = *tf.get(q.as_str()).unwrap_or(&0) as f32;
                        if f == 0.0 {
                            return 0.0;
                        }
                        idf(q) * (f * (K1 + 1.0)) / (f + K1 * (1.0 - B + B * dl / avgdl))
                    })
                    .sum();
                (i, score)
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored
            .into_iter()
            .take(top_k)
            .map(|(i, score)| {
                let mut c = self.metadata[i].clone();
                c.bm25_score = Some(score);
                c
            })
            .collect()
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let model_path = dir.join(MODEL_FILE);
        let chunks_path = dir.join(CHUNKS_FILE);
        let model_tmp = dir.join(format!("{MODEL_FILE}.tmp"));
        let chunks_tmp = dir.join(format!("{CHUNKS_FILE}.tmp"));

        std::fs::write(&model_tmp, serde_json::to_string(&self.model)?)?;
        std::fs::write(&chunks_tmp, serde_json::to_string(&self.metadata)?)?;

        std::fs::rename(&model_tmp, &model_path)?;
        std::fs::rename(&chunks_tmp, &chunks_path)?;
        Ok(())
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let model_path = dir.join(MODEL_FILE);
        if !model_path.exists() {
            return Ok(Self::new());
        }
        let chunks_path = dir.join(CHUNKS_FILE);

        let model: Bm25Model = match std::fs::read_to_string(&model_path) {
            Ok(s) => serde_json::from_str(&s)
                .map_err(|e| RagError::Corruption(format!("bm25 model: {e}")))?,
            Err(e) => return Err(RagError::Corruption(format!("bm25 model: {e}"))),
        };
        let metadata: Vec<Chunk> = if chunks_path.exists() {
            let s = std::fs::read_to_string(&chunks_path)?;
            serde_json::from_str(&s)
                .map_err(|e| RagError::Corruption(format!("bm25 chunks: {e}")))?
        } else {
            Vec::new()
        };

        Ok(Self { model, metadata })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Source;

    fn chunk(doc_id: &str, idx: u32, text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
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
    fn tokenizer_preserves_hyphens_drops_stopwords_and_short_tokens() {
        let toks = tokenize("The state-of-the-art model is a win.");
        assert!(toks.contains(&"state-of-the-art".to_string()));
        assert!(!toks.contains(&"is".to_string()));
        assert!(!toks.contains(&"a".to_string()));
    }

    #[test]
    fn exact_text_query_ranks_its_own_chunk_first() {
        let mut idx = SparseIndex::new();
        idx.add(vec![
            chunk("d1", 0, "quantum entanglement and Bell inequalities"),
            chunk("d1", 1, "classical thermodynamics and entropy"),
        ]);
        let hits = idx.search("quantum entanglement and Bell inequalities", 5);
        assert_eq!(hits[0].chunk_idx, 0);
    }

    #[test]
    fn empty_query_after_stopword_filtering_returns_empty() {
        let mut idx = SparseIndex::new();
        idx.add(vec![chunk("d1", 0, "some real content here")]);
        assert!(idx.search("a the is", 5).is_empty());
    }

    #[test]
    fn save_then_load_round_trips_search() {
        let dir = tempfile::tempdir().unwrap();
        let mut idx = SparseIndex::new();
        idx.add(vec![
            chunk("d1", 0, "neural networks and backpropagation"),
            chunk("d1", 1, "gradient descent optimization"),
        ]);
        idx.save(dir.path()).unwrap();
        let loaded = SparseIndex::load(dir.path()).unwrap();
        assert_eq!(loaded.count(), 2);
        let before = idx.search("neural networks", 2);
        let after = loaded.search("neural networks", 2);
        assert_eq!(
            before.iter().map(|c| c.chunk_idx).collect::<Vec<_>>(),
            after.iter().map(|c| c.chunk_idx).collect::<Vec<_>>()
        );
    }

    #[test]
    fn load_absent_file_returns_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let idx = SparseIndex::load(dir.path()).unwrap();
        assert_eq!(idx.count(), 0);
    }
}
