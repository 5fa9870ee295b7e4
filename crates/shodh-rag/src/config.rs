//! Configuration knobs for the pipeline, the hybrid retrieval engine, and the
//! ambient model stack. Mirrors `original_source/l88_backend/config.py`'s
//! constants; see SPEC_FULL.md §6.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    pub data_dir: PathBuf,
    pub embedding: EmbeddingConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub cache: CacheConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model_dir: PathBuf,
    pub dimension: usize,
    pub cache_size: usize,
    /// Prefixed onto every query-mode embedding call.
    pub query_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Target chunk size in tokens (cl100k_base).
    pub chunk_size: usize,
    /// Overlap between adjacent chunks, in tokens.
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub retrieve_top_k: usize,
    pub rerank_top_n: usize,
    pub max_rewrites: usize,
    pub max_alt_queries: usize,
    /// BM25 fusion weight used when query_type == simple; dense weight is `1.0 - this`.
    pub bm25_weight_simple: f32,
    /// BM25 fusion weight for multi_hop/math/comparison; dense weight is `1.0 - this`.
    pub bm25_weight_other: f32,
    pub confidence_threshold: f32,
    pub unsure_threshold: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub ttl_seconds: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub model: String,
    pub temperature: f32,
    pub ctx_full: usize,
    pub ctx_small: usize,
    pub endpoint: String,
}

impl RagConfig {
    /// Validate config values, returning errors for clearly broken configurations.
    pub fn validate(&self) -> Result<(), String> {
        if self.embedding.dimension == 0 {
            return Err("embedding.dimension must be > 0".into());
        }
        if self.chunking.chunk_size < 50 {
            return Err("chunking.chunk_size must be >= 50".into());
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err("chunking.chunk_overlap must be < chunk_size".into());
        }
        if self.retrieval.retrieve_top_k == 0 {
            return Err("retrieval.retrieve_top_k must be > 0".into());
        }
        if self.retrieval.rerank_top_n == 0 {
            return Err("retrieval.rerank_top_n must be > 0".into());
        }
        if !(0.0..=1.0).contains(&self.retrieval.bm25_weight_simple)
            || !(0.0..=1.0).contains(&self.retrieval.bm25_weight_other)
        {
            return Err("retrieval.bm25_weight_* must be in [0.0, 1.0]".into());
        }
        if self.retrieval.unsure_threshold > self.retrieval.confidence_threshold {
            return Err("retrieval.unsure_threshold must be <= confidence_threshold".into());
        }
        if self.cache.ttl_seconds <= 0 {
            return Err("cache.ttl_seconds must be > 0".into());
        }
        Ok(())
    }

    /// Load config from a JSON file, erroring on missing/invalid fields.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read config file: {e}"))?;
        let config: Self =
            serde_json::from_str(&content).map_err(|e| format!("failed to parse config: {e}"))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ragpipe");

        let model_dir = if Path::new("models").exists() {
            PathBuf::from("models")
        } else if let Ok(env_path) = std::env::var("MODEL_PATH") {
            PathBuf::from(env_path)
        } else {
            data_dir.join("models")
        };

        Self {
            data_dir,
            embedding: EmbeddingConfig {
                model_dir,
                dimension: 768,
                cache_size: 1000,
                query_prefix: "Represent this sentence for searching relevant passages: "
                    .to_string(),
            },
            chunking: ChunkingConfig {
                chunk_size: 380,
                chunk_overlap: 45,
            },
            retrieval: RetrievalConfig {
                retrieve_top_k: 20,
                rerank_top_n: 5,
                max_rewrites: 2,
                max_alt_queries: 3,
                bm25_weight_simple: 0.6,
                bm25_weight_other: 0.2,
                confidence_threshold: 0.7,
                unsure_threshold: 0.4,
            },
            cache: CacheConfig { ttl_seconds: 3600 },
            llm: LlmConfig {
                model: "llama3".to_string(),
                temperature: 0.0,
                ctx_full: 16384,
                ctx_small: 2048,
                endpoint: "http://localhost:11434".to_string(),
            },
        }
    }
}
