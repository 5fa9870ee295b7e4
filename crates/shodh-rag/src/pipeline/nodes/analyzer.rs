//! Analyzer node (distilled §4.9 "Analyzer"). Grounded on
//! `original_source/l88_backend/graph/nodes/query_analyzer.py`.

use crate::error::Result;
use crate::pipeline::json_extract::parse_json;
use crate::pipeline::state::{PipelineState, QueryType, Strategy};
use crate::pipeline::Llm;
use serde::Deserialize;

const ANALYZER_PROMPT: &str = r#"You are a query classifier for a scientific RAG system.

Classify the following user query into exactly one category and one strategy.

Categories:
- "simple" -> single concept, direct lookup
- "multi_hop" -> requires combining information from multiple sources
- "math" -> involves equations, derivations, or numerical reasoning
- "comparison" -> comparing two or more concepts, methods, or results

Strategies (matched to category):
- "simple" -> "single"
- "multi_hop" -> "decompose"
- "math" -> "step_back"
- "comparison" -> "decompose"

Return ONLY valid JSON, no other text:
{{"query_type": "...", "strategy": "..."}}

User query: {query}"#;

#[derive(Deserialize)]
struct AnalyzerJson {
    query_type: Option<String>,
    strategy: Option<String>,
}

/// Single LLM call classifying `query_type`/`strategy`. On parse failure or
/// an invalid value, falls back to `simple`/`single`.
pub async fn analyze(state: &mut PipelineState, llm: &dyn Llm) -> Result<()> {
    let prompt = ANALYZER_PROMPT.replace("{query}", &state.query);
    let response = llm.call(&prompt, true).await?;

    let parsed: Option<AnalyzerJson> = parse_json(&response);
    let (query_type, strategy) = match parsed {
        Some(p) => (
            p.query_type
                .map(|s| QueryType::from_str_or_default(&s))
                .unwrap_or(QueryType::Simple),
            p.strategy
                .map(|s| Strategy::from_str_or_default(&s))
                .unwrap_or(Strategy::Single),
        ),
        None => (QueryType::Simple, Strategy::Single),
    };

    state.query_type = Some(query_type);
    state.strategy = Some(strategy);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::state::Route;
    use async_trait::async_trait;

    struct FakeLlm(String);

    #[async_trait]
    impl Llm for FakeLlm {
        async fn call(&self, _prompt: &str, _small_ctx: bool) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    fn state() -> PipelineState {
        let mut s = PipelineState::new("what is entropy?".into(), "s1".into(), vec![], false);
        s.route = Some(Route::Rag);
        s
    }

    #[tokio::test]
    async fn parses_valid_classification() {
        let llm = FakeLlm(r#"{"query_type": "multi_hop", "strategy": "decompose"}"#.into());
        let mut s = state();
        analyze(&mut s, &llm).await.unwrap();
        assert_eq!(s.query_type, Some(QueryType::MultiHop));
        assert_eq!(s.strategy, Some(Strategy::Decompose));
    }

    #[tokio::test]
    async fn falls_back_to_simple_single_on_garbage_response() {
        let llm = FakeLlm("I refuse to answer in JSON.".into());
        let mut s = state();
        analyze(&mut s, &llm).await.unwrap();
        assert_eq!(s.query_type, Some(QueryType::Simple));
        assert_eq!(s.strategy, Some(Strategy::Single));
    }
}
