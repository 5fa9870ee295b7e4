//! Generator node (distilled §4.9 "Generator"). Grounded on
//! `original_source/l88_backend/graph/nodes/generator.py`.

use crate::error::Result;
use crate::pipeline::json_extract::parse_json;
use crate::pipeline::state::{ContextVerdict, PipelineState, Route};
use crate::pipeline::Llm;
use crate::types::{Chunk, Citation};
use serde::Deserialize;

const CHAT_PROMPT: &str = r#"You are a helpful scientific research assistant. Answer the following question using your training knowledge.

Question: {query}

Provide a clear, accurate answer. If you're uncertain, say so."#;

const GENERATOR_PROMPT: &str = r#"You are a scientific research assistant. Answer the user's question using ONLY the provided source chunks.

User question: {query}

Source chunks:
{chunks_text}

Instructions:
1. First, evaluate whether the chunks contain SUFFICIENT information to answer.
2. Then answer the question with inline citations [filename, page N].
3. Show your full reasoning in a <think> block.

Return ONLY valid JSON:
{{
  "context_verdict": "SUFFICIENT" or "GAP" or "EMPTY",
  "reasoning": "<think>your chain of thought</think>",
  "answer": "your direct answer with citations",
  "missing_info": "what is absent (only if GAP, else empty string)",
  "sources": [{{"filename": "...", "page": N, "excerpt": "relevant quote"}}]
}}"#;

const NOT_FOUND_ANSWER: &str = "No information found in the selected sources.";

#[derive(Deserialize)]
struct GeneratorSourceJson {
    filename: Option<String>,
    page: Option<u32>,
}

#[derive(Deserialize)]
struct GeneratorJson {
    context_verdict: Option<String>,
    reasoning: Option<String>,
    answer: Option<String>,
    missing_info: Option<String>,
    sources: Option<Vec<GeneratorSourceJson>>,
}

/// Back-maps `{filename, page}` source annotations to their retrieval
/// origin (session vs library) by filename lookup in the retrieved chunk
/// set; an annotation whose filename matches nothing retrieved is dropped.
fn back_map_sources(raw: Vec<GeneratorSourceJson>, chunks: &[Chunk]) -> Vec<Citation> {
    raw.into_iter()
        .filter_map(|s| {
            let filename = s.filename?;
            let chunk = chunks.iter().find(|c| c.filename == filename)?;
            Some(Citation {
                doc_id: chunk.doc_id.clone(),
                filename: chunk.filename.clone(),
                page: s.page.unwrap_or(chunk.page),
                source: chunk.source,
            })
        })
        .collect()
}

/// Branches on `route`/`found`. Always writes `last_verdict` from
/// `context_verdict` for the Rewriter's retry-hint on the next cycle.
pub async fn generate(state: &mut PipelineState, llm: &dyn Llm) -> Result<()> {
    if state.route == Some(Route::Chat) {
        let prompt = CHAT_PROMPT.replace("{query}", &state.query);
        let response = llm.call(&prompt, false).await?;
        state.context_verdict = Some(ContextVerdict::Sufficient);
        state.reasoning = String::new();
        state.answer = response;
        state.sources = Vec::new();
        state.missing_info = String::new();
        state.last_verdict = Some(ContextVerdict::Sufficient.as_str().to_string());
        return Ok(());
    }

    if !state.found {
        state.context_verdict = Some(ContextVerdict::Empty);
        state.reasoning = String::new();
        state.answer = NOT_FOUND_ANSWER.to_string();
        state.sources = Vec::new();
        state.missing_info = "No relevant chunks retrieved.".to_string();
        state.last_verdict = Some(ContextVerdict::Empty.as_str().to_string());
        return Ok(());
    }

    let chunks_text = state
        .chunks
        .iter()
        .map(|c| format!("[{}, page {}]:\n{}", c.filename, c.page, c.text))
        .collect::<Vec<_>>()
        .join("\n\n");

    let prompt = GENERATOR_PROMPT
        .replace("{query}", &state.query)
        .replace("{chunks_text}", &chunks_text);

    let response = llm.call(&prompt, false).await?;

    let parsed: Option<GeneratorJson> = parse_json(&response);
    let (context_verdict, reasoning, answer, missing_info, sources) = match parsed {
        Some(p) => {
            let context_verdict = p
                .context_verdict
                .map(|s| ContextVerdict::parse_or_default(&s))
                .unwrap_or(ContextVerdict::Sufficient);
            let sources = back_map_sources(p.sources.unwrap_or_default(), &state.chunks);
            (
                context_verdict,
                p.reasoning.unwrap_or_default(),
                p.answer.unwrap_or_default(),
                p.missing_info.unwrap_or_default(),
                sources,
            )
        }
        None => (ContextVerdict::Sufficient, String::new(), response.trim().to_string(), String::new(), Vec::new()),
    };

    state.context_verdict = Some(context_verdict);
    state.reasoning = reasoning;
    state.answer = answer;
    state.missing_info = missing_info;
    state.sources = sources;
    state.last_verdict = Some(context_verdict.as_str().to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Source;
    use async_trait::async_trait;

    struct FakeLlm(String);

    #[async_trait]
    impl Llm for FakeLlm {
        async fn call(&self, _prompt: &str, _small_ctx: bool) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    fn chunk(filename: &str, page: u32) -> Chunk {
        Chunk {
            text: "entropy increases".into(),
            doc_id: "d1".into(),
            filename: filename.into(),
            page,
            chunk_idx: 0,
            source: Source::Session,
            score: None,
            bm25_score: None,
            rerank_score: Some(0.9),
        }
    }

    #[tokio::test]
    async fn chat_route_returns_raw_llm_answer_with_sufficient_verdict() {
        let llm = FakeLlm("Paris is the capital of France.".into());
        let mut s = PipelineState::new("capital of France?".into(), "s1".into(), vec![], false);
        s.route = Some(Route::Chat);
        generate(&mut s, &llm).await.unwrap();
        assert_eq!(s.answer, "Paris is the capital of France.");
        assert_eq!(s.context_verdict, Some(ContextVerdict::Sufficient));
        assert!(s.sources.is_empty());
    }

    #[tokio::test]
    async fn not_found_short_circuits_without_calling_llm() {
        let llm = FakeLlm("should never be used".into());
        let mut s = PipelineState::new("q".into(), "s1".into(), vec!["d1".into()], false);
        s.route = Some(Route::Rag);
        s.found = false;
        generate(&mut s, &llm).await.unwrap();
        assert_eq!(s.context_verdict, Some(ContextVerdict::Empty));
        assert_eq!(s.answer, NOT_FOUND_ANSWER);
    }

    #[tokio::test]
    async fn rag_route_parses_structured_json_and_back_maps_sources() {
        let llm = FakeLlm(
            r#"{"context_verdict":"SUFFICIENT","reasoning":"","answer":"Entropy always increases.","missing_info":"","sources":[{"filename":"a.pdf","page":3,"excerpt":"x"}]}"#
                .into(),
        );
        let mut s = PipelineState::new("what about entropy?".into(), "s1".into(), vec!["d1".into()], false);
        s.route = Some(Route::Rag);
        s.found = true;
        s.chunks = vec![chunk("a.pdf", 3)];
        generate(&mut s, &llm).await.unwrap();
        assert_eq!(s.answer, "Entropy always increases.");
        assert_eq!(s.sources.len(), 1);
        assert_eq!(s.sources[0].doc_id, "d1");
        assert_eq!(s.last_verdict, Some("SUFFICIENT".to_string()));
    }

    #[tokio::test]
    async fn malformed_json_falls_back_to_raw_response_as_answer() {
        let llm = FakeLlm("  Here is the answer without any JSON.  ".into());
        let mut s = PipelineState::new("q".into(), "s1".into(), vec!["d1".into()], false);
        s.route = Some(Route::Rag);
        s.found = true;
        s.chunks = vec![chunk("a.pdf", 1)];
        generate(&mut s, &llm).await.unwrap();
        assert_eq!(s.answer, "Here is the answer without any JSON.");
        assert_eq!(s.context_verdict, Some(ContextVerdict::Sufficient));
    }
}
