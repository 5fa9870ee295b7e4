//! LLMClient (C10). Synchronous-contract `call(prompt, small_ctx)` over an
//! Ollama-style HTTP endpoint, generalized from the teacher's
//! `external.rs` request/response plumbing (timeouts, HTML-response
//! detection, JSON body parsing). Two pre-configured context profiles
//! replace the teacher's provider-selection matrix: full (generator,
//! self-evaluator, summarizer) and small (analyzer, rewriter), matching
//! `original_source/l88_backend/llm/client.py`'s `_llm`/`_llm_small`
//! singleton pair. Model identity and temperature are fixed at
//! construction; this layer does not retry — failures surface as a typed
//! error up to the pipeline, which owns its own bounded-retry loop.

use crate::config::LlmConfig;
use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_ctx: usize,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Thin Ollama `/api/generate` wrapper. One client, two context profiles.
pub struct LlmClient {
    http: Client,
    endpoint: String,
    model: String,
    temperature: f32,
    ctx_full: usize,
    ctx_small: usize,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(120))
            .build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            ctx_full: config.ctx_full,
            ctx_small: config.ctx_small,
        })
    }

    /// Sends `prompt` and returns the raw completion text. `small_ctx`
    /// selects the 2k-token window used by the analyzer and rewriter
    /// nodes; the generator, summarizer, and self-evaluator use the full
    /// window. No internal retry: a transport or parse failure is
    /// returned directly.
    pub async fn call(&self, prompt: &str, small_ctx: bool) -> Result<String> {
        let num_ctx = if small_ctx { self.ctx_small } else { self.ctx_full };

        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
                num_ctx,
            },
        };

        let url = format!("{}/api/generate", self.endpoint.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| anyhow!("LLM request to {url} failed: {e}"))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| anyhow!("failed to read LLM response body from {url}: {e}"))?;

        if !status.is_success() {
            let preview: String = text.chars().take(300).collect();
            return Err(anyhow!("LLM endpoint {url} returned HTTP {status}: {preview}"));
        }

        let trimmed = text.trim_start();
        if trimmed.starts_with('<') {
            let preview: String = trimmed.chars().take(200).collect();
            return Err(anyhow!(
                "LLM endpoint {url} returned HTML instead of JSON (HTTP {status}): {preview}"
            ));
        }

        let parsed: GenerateResponse = serde_json::from_str(&text).map_err(|e| {
            let preview: String = text.chars().take(300).collect();
            anyhow!("failed to parse LLM response from {url}: {e}. Body: {preview}")
        })?;

        Ok(parsed.response)
    }

    /// Convenience form for request bodies built inline, e.g. the debug
    /// harness; not used by the pipeline nodes directly.
    #[allow(dead_code)]
    pub fn describe(&self) -> serde_json::Value {
        json!({ "model": self.model, "endpoint": self.endpoint })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;

    fn test_config() -> LlmConfig {
        LlmConfig {
            model: "qwen2.5:14b".to_string(),
            temperature: 0.0,
            ctx_full: 16384,
            ctx_small: 2048,
            endpoint: "http://localhost:11434".to_string(),
        }
    }

    #[test]
    fn client_construction_does_not_require_network() {
        let client = LlmClient::new(&test_config()).unwrap();
        assert_eq!(client.model, "qwen2.5:14b");
    }

    #[test]
    fn url_join_avoids_double_slash() {
        let mut config = test_config();
        config.endpoint = "http://localhost:11434/".to_string();
        let client = LlmClient::new(&config).unwrap();
        let url = format!("{}/api/generate", client.endpoint.trim_end_matches('/'));
        assert_eq!(url, "http://localhost:11434/api/generate");
    }
}
