//! Summarizer node (distilled §4.9 "Summarizer"). Terminal — bypasses
//! retrieval entirely. Grounded on
//! `original_source/l88_backend/graph/nodes/summarizer.py`.

use crate::error::Result;
use crate::indexes::IndexStore;
use crate::pipeline::state::{ContextVerdict, PipelineState};
use crate::pipeline::Llm;
use std::collections::HashSet;

const SUMMARIZE_PROMPT: &str = r#"You are a research assistant. Summarize the following document clearly and concisely.

User request: {query}

Document content:
{content}

Write a well-structured summary covering the main points, methodology (if any), and key findings or conclusions."#;

const NO_CONTENT_ANSWER: &str = "Could not load document content for summarization.";
const CONTENT_BUDGET_CHARS: usize = 12_000;

/// Loads chunk text for `selected_doc_ids` straight from the session's
/// persisted dense-index metadata (not via retrieval), concatenates,
/// truncates to the context budget, and makes one LLM call.
pub async fn summarize(state: &mut PipelineState, llm: &dyn Llm, indexes: &IndexStore) -> Result<()> {
    let selected: HashSet<&String> = state.selected_doc_ids.iter().collect();
    let text = {
        let handle = indexes.session(&state.session_id)?;
        let guard = handle.read();
        guard
            .dense
            .all_chunks()
            .iter()
            .filter(|c| selected.contains(&c.doc_id))
            .map(|c| c.text.clone())
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    if text.trim().is_empty() {
        state.answer = NO_CONTENT_ANSWER.to_string();
        state.confident = false;
        state.context_verdict = Some(ContextVerdict::Empty);
        state.sources = Vec::new();
        state.reasoning = String::new();
        state.missing_info = String::new();
        return Ok(());
    }

    let truncated: String = text.chars().take(CONTENT_BUDGET_CHARS).collect();
    let prompt = SUMMARIZE_PROMPT
        .replace("{query}", &state.query)
        .replace("{content}", &truncated);

    let answer = llm.call(&prompt, false).await?;

    state.answer = answer;
    state.confident = true;
    state.context_verdict = Some(ContextVerdict::Sufficient);
    state.sources = Vec::new();
    state.reasoning = String::new();
    state.missing_info = String::new();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RagConfig;
    use crate::types::{Chunk, Source};
    use async_trait::async_trait;

    struct FakeLlm(String);

    #[async_trait]
    impl Llm for FakeLlm {
        async fn call(&self, _prompt: &str, _small_ctx: bool) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    fn test_config(data_dir: &std::path::Path) -> RagConfig {
        let mut cfg = RagConfig::default();
        cfg.data_dir = data_dir.to_path_buf();
        cfg.embedding.dimension = 2;
        cfg
    }

    fn chunk(doc_id: &str, idx: u32, text: &str) -> Chunk {
        Chunk {
            text: text.into(),
            doc_id: doc_id.into(),
            filename: "a.pdf".into(),
            page: 1,
            chunk_idx: idx,
            source: Source::Session,
            score: None,
            bm25_score: None,
            rerank_score: None,
        }
    }

    #[tokio::test]
    async fn no_content_yields_fallback_without_calling_llm() {
        let dir = tempfile::tempdir().unwrap();
        let indexes = IndexStore::open(&test_config(dir.path())).unwrap();
        let mut s = PipelineState::new("summarize".into(), "s1".into(), vec!["d1".into()], false);
        let llm = FakeLlm("should not be called".into());
        summarize(&mut s, &llm, &indexes).await.unwrap();
        assert_eq!(s.answer, NO_CONTENT_ANSWER);
        assert!(!s.confident);
        assert_eq!(s.context_verdict, Some(ContextVerdict::Empty));
    }

    #[tokio::test]
    async fn concatenates_selected_document_chunks_and_calls_llm() {
        let dir = tempfile::tempdir().unwrap();
        let indexes = IndexStore::open(&test_config(dir.path())).unwrap();
        {
            let handle = indexes.session("s1").unwrap();
            let mut guard = handle.write();
            guard.dense.add(
                vec![chunk("d1", 0, "first part"), chunk("d2", 0, "other doc")],
                vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            );
        }
        let mut s = PipelineState::new("summarize".into(), "s1".into(), vec!["d1".into()], false);
        let llm = FakeLlm("a tidy summary".into());
        summarize(&mut s, &llm, &indexes).await.unwrap();
        assert_eq!(s.answer, "a tidy summary");
        assert!(s.confident);
        assert_eq!(s.context_verdict, Some(ContextVerdict::Sufficient));
    }
}
