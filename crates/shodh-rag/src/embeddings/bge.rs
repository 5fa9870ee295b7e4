//! ONNX bi-encoder embedder, generalized from the teacher's `embeddings/e5.rs`:
//! same `Session` + tokenizer + LRU-cache shape, mean-pooling fallback over
//! `last_hidden_state` when no pooled `sentence_embedding` output exists,
//! unit-L2-normalization applied uniformly. The query-prefix string is a
//! configured constant rather than a hardcoded "query:"/"passage:" pair,
//! matching distilled spec §4.1 ("a known query-prefix string") — passage
//! text is embedded unprefixed, per `original_source/l88_backend/ingestion/embedder.py`.

use super::EmbeddingModel;
use anyhow::{anyhow, Result};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Clone)]
pub struct BgeConfig {
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
    pub dimension: usize,
    pub max_length: usize,
    pub query_prefix: String,
}

pub struct BgeEmbeddings {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<tokenizers::Tokenizer>,
    config: BgeConfig,
    cache: Arc<RwLock<lru::LruCache<String, Vec<f32>>>>,
}

impl BgeEmbeddings {
    pub fn new(config: BgeConfig) -> Result<Self> {
        if !config.model_path.exists() {
            return Err(anyhow!(
                "embedding model not found at: {}",
                config.model_path.display()
            ));
        }
        let model_bytes = std::fs::read(&config.model_path)?;

        let num_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        let session = Session::builder()
            .map_err(|e| anyhow!("session builder: {e:?}"))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| anyhow!("optimization level: {e:?}"))?
            .with_intra_threads(num_threads)
            .map_err(|e| anyhow!("intra threads: {e:?}"))?
            .with_memory_pattern(true)
            .map_err(|e| anyhow!("memory pattern: {e:?}"))?
            .commit_from_memory(&model_bytes)
            .map_err(|e| anyhow!("failed to load embedding model: {e:?}"))?;

        let tokenizer = tokenizers::Tokenizer::from_file(&config.tokenizer_path)
            .map_err(|e| anyhow!("failed to load tokenizer: {e:?}"))?;

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            config,
            cache: Arc::new(RwLock::new(lru::LruCache::new(
                std::num::NonZeroUsize::new(1000).unwrap(),
            ))),
        })
    }

    fn embed_one(&self, text: &str, is_query: bool) -> Result<Vec<f32>> {
        let prefixed = if is_query {
            format!("{}{}", self.config.query_prefix, text)
        } else {
            text.to_string()
        };

        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        prefixed.hash(&mut hasher);
        let cache_key = format!("{:x}", hasher.finish());
        if let Some(cached) = self.cache.write().get(&cache_key) {
            return Ok(cached.clone());
        }

        let encoding = self
            .tokenizer
            .encode(prefixed.as_str(), true)
            .map_err(|e| anyhow!("tokenization failed: {e:?}"))?;

        let max_len = encoding.get_ids().len().min(self.config.max_length);
        let ids: Vec<i64> = encoding.get_ids()[..max_len]
            .iter()
            .map(|&id| id as i64)
            .collect();
        let mask: Vec<i64> = encoding.get_attention_mask()[..max_len]
            .iter()
            .map(|&m| m as i64)
            .collect();
        let type_ids: Vec<i64> = encoding.get_type_ids()[..max_len]
            .iter()
            .map(|&t| t as i64)
            .collect();

        let shape = vec![1, max_len];
        let input_ids =
            Value::from_array((shape.clone(), ids)).map_err(|e| anyhow!("input_ids: {e:?}"))?;
        let attention_mask = Value::from_array((shape.clone(), mask.clone()))
            .map_err(|e| anyhow!("attention_mask: {e:?}"))?;
        let token_type_ids = Value::from_array((shape, type_ids))
            .map_err(|e| anyhow!("token_type_ids: {e:?}"))?;

        let inputs = ort::inputs![
            "input_ids" => input_ids,
            "attention_mask" => attention_mask,
            "token_type_ids" => token_type_ids,
        ];

        let mut session = self.session.lock();
        let outputs = session
            .run(inputs)
            .map_err(|e| anyhow!("inference failed: {e:?}"))?;

        let embedding = extract_embedding(&outputs, &mask)?;
        let normalized = normalize(embedding);

        self.cache.write().put(cache_key, normalized.clone());
        Ok(normalized)
    }
}

fn extract_embedding(
    outputs: &ort::session::SessionOutputs,
    attention_mask: &[i64],
) -> Result<Vec<f32>> {
    let has_sentence_embedding = outputs.iter().any(|(name, _)| name == "sentence_embedding");
    if has_sentence_embedding {
        if let Ok((shape, data)) = outputs["sentence_embedding"].try_extract_tensor::<f32>() {
            if shape.len() == 2 {
                return Ok(data.to_vec());
            }
        }
    }

    let output_name = outputs
        .iter()
        .find(|(name, _)| *name == "last_hidden_state" || *name == "token_embeddings")
        .map(|(name, _)| name.to_string())
        .unwrap_or_else(|| "last_hidden_state".to_string());

    let (shape, data) = outputs[output_name.as_str()]
        .try_extract_tensor::<f32>()
        .map_err(|e| anyhow!("failed to extract output '{output_name}': {e:?}"))?;

    let seq_len = shape[1] as usize;
    let hidden_dim = shape[2] as usize;

    let mut pooled = vec![0.0f32; hidden_dim];
    let mut mask_sum = 0.0f32;
    for pos in 0..seq_len {
        let mask_val = attention_mask.get(pos).copied().unwrap_or(0) as f32;
        if mask_val > 0.0 {
            mask_sum += mask_val;
            let offset = pos * hidden_dim;
            for dim in 0..hidden_dim {
                pooled[dim] += data[offset + dim] * mask_val;
            }
        }
    }
    if mask_sum > 0.0 {
        for v in &mut pooled {
            *v /= mask_sum;
        }
    }
    Ok(pooled)
}

fn normalize(mut vec: Vec<f32>) -> Vec<f32> {
    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-12 {
        for v in &mut vec {
            *v /= norm;
        }
    }
    vec
}

impl EmbeddingModel for BgeEmbeddings {
    fn embed(&self, texts: &[&str], is_query: bool) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed_one(t, is_query)).collect()
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_produces_unit_vector() {
        let v = normalize(vec![3.0, 4.0]);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn normalize_leaves_zero_vector_untouched() {
        let v = normalize(vec![0.0, 0.0]);
        assert_eq!(v, vec![0.0, 0.0]);
    }
}
