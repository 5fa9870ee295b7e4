//! Rewriter node (distilled §4.9 "Rewriter"). Grounded on
//! `original_source/l88_backend/graph/nodes/query_rewriter.py`.

use crate::error::Result;
use crate::pipeline::json_extract::parse_json;
use crate::pipeline::state::{PipelineState, QueryType, Strategy};
use crate::pipeline::Llm;
use serde::Deserialize;

const REWRITER_PROMPT: &str = r#"You are a scientific research assistant and query optimizer.
Classify the user query and provide search-friendly rewrites.

Categories:
- "simple" -> single concept, direct lookup
- "multi_hop" -> requires combining information from multiple sources
- "math" -> involves equations, derivations, or numerical reasoning
- "comparison" -> comparing two or more concepts

Rewriting Strategies:
- "single": Rewrite into one clear, search-friendly query. Expand abbreviations.
- "decompose": Break into 2-3 sub-questions.
- "step_back": Ask a broader principle question.

Attempt: {attempt} of 3
{hints}

Return ONLY valid JSON:
{{
  "query_type": "simple|multi_hop|math|comparison",
  "strategy": "single|decompose|step_back",
  "rewritten_queries": ["query 1", "query 2"]
}}

User query: {query}"#;

const RETRY_HINT: &str = r#"This is a RETRY. Previous verdict: "{last_verdict}".
You MUST take a genuinely different angle.
- If too narrow, go broader.
- If too broad, be specific.
- NEVER repeat a previous query."#;

const ACRONYM_HINT: &str = "The query may contain acronyms: {acronyms}. Expand at least one of them in a rewritten query.";

#[derive(Deserialize)]
struct RewriterJson {
    query_type: Option<String>,
    strategy: Option<String>,
    rewritten_queries: Option<Vec<String>>,
}

fn gather_acronyms(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .filter_map(|w| {
            let cleaned: String = w.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
            let has_upper = cleaned.chars().any(|c| c.is_ascii_uppercase());
            let all_upper_or_digit = cleaned
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
            if cleaned.len() >= 2 && has_upper && all_upper_or_digit {
                Some(cleaned)
            } else {
                None
            }
        })
        .collect()
}

/// Owns `rewrite_count`. Always includes the original query in the returned
/// list. On any LLM or parse failure, falls back to `[original query]` but
/// still increments `rewrite_count` — the retry budget is spent whether or
/// not the LLM cooperated.
pub async fn rewrite(state: &mut PipelineState, llm: &dyn Llm, max_alt_queries: usize) -> Result<()> {
    let current_count = state.rewrite_count;
    let is_retry = current_count > 0;

    let mut hints = String::new();
    if is_retry {
        if let Some(verdict) = &state.last_verdict {
            hints.push_str(&RETRY_HINT.replace("{last_verdict}", verdict));
            hints.push('\n');
        }
    }
    let acronyms = gather_acronyms(&state.query);
    if !acronyms.is_empty() {
        hints.push_str(&ACRONYM_HINT.replace("{acronyms}", &acronyms.join(", ")));
    }

    let prompt = REWRITER_PROMPT
        .replace("{attempt}", &(current_count + 1).to_string())
        .replace("{hints}", &hints)
        .replace("{query}", &state.query);

    let response = llm.call(&prompt, true).await;

    let (query_type, strategy, mut queries) = match response {
        Ok(text) => match parse_json::<RewriterJson>(&text) {
            Some(parsed) => {
                let query_type = parsed
                    .query_type
                    .map(|s| QueryType::from_str_or_default(&s))
                    .unwrap_or(state.query_type.unwrap_or(QueryType::Simple));
                let strategy = parsed
                    .strategy
                    .map(|s| Strategy::from_str_or_default(&s))
                    .unwrap_or(Strategy::Single);
                let queries = parsed.rewritten_queries.unwrap_or_default();
                (query_type, strategy, queries)
            }
            None => (state.query_type.unwrap_or(QueryType::Simple), Strategy::Single, Vec::new()),
        },
        Err(_) => (state.query_type.unwrap_or(QueryType::Simple), Strategy::Single, Vec::new()),
    };

    if queries.is_empty() {
        queries.push(state.query.clone());
    }
    queries.truncate(max_alt_queries);
    if !queries.iter().any(|q| q == &state.query) {
        if queries.len() >= max_alt_queries {
            queries.pop();
        }
        queries.push(state.query.clone());
    }

    state.query_type = Some(query_type);
    state.strategy = Some(strategy);
    state.rewritten_queries = queries;
    state.rewrite_count = current_count + 1;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FakeLlm(String);

    #[async_trait]
    impl Llm for FakeLlm {
        async fn call(&self, _prompt: &str, _small_ctx: bool) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    fn state(query: &str) -> PipelineState {
        PipelineState::new(query.into(), "s1".into(), vec![], false)
    }

    #[tokio::test]
    async fn increments_rewrite_count_and_includes_original_query() {
        let llm = FakeLlm(r#"{"query_type":"simple","strategy":"single","rewritten_queries":["expanded query"]}"#.into());
        let mut s = state("define TRL");
        rewrite(&mut s, &llm, 3).await.unwrap();
        assert_eq!(s.rewrite_count, 1);
        assert!(s.rewritten_queries.contains(&"define TRL".to_string()));
        assert!(s.rewritten_queries.contains(&"expanded query".to_string()));
    }

    #[tokio::test]
    async fn acronym_hint_reaches_the_prompt_when_query_has_caps_tokens() {
        assert_eq!(gather_acronyms("define TRL please"), vec!["TRL".to_string()]);
        assert!(gather_acronyms("what is entropy").is_empty());
    }

    #[tokio::test]
    async fn falls_back_to_original_query_only_on_malformed_response() {
        let llm = FakeLlm("not json".into());
        let mut s = state("what is entropy?");
        rewrite(&mut s, &llm, 3).await.unwrap();
        assert_eq!(s.rewrite_count, 1);
        assert_eq!(s.rewritten_queries, vec!["what is entropy?".to_string()]);
    }

    #[tokio::test]
    async fn truncates_to_max_alt_queries_while_keeping_original() {
        let llm = FakeLlm(
            r#"{"query_type":"simple","strategy":"single","rewritten_queries":["a","b","c","d"]}"#
                .into(),
        );
        let mut s = state("original");
        rewrite(&mut s, &llm, 2).await.unwrap();
        assert_eq!(s.rewritten_queries.len(), 2);
        assert!(s.rewritten_queries.contains(&"original".to_string()));
    }
}
