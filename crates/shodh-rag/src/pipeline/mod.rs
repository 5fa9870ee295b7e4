//! Pipeline (C9): the agentic control flow over the node set in distilled
//! §4.9. Encoded as an explicit state machine — a `Node` enum plus a router
//! function per node, matching distilled §9 Design Notes ("encode each edge
//! as the pair (current_node, router_function -> next_node_name)") rather
//! than pulling in a graph-execution crate, since the node count and edge
//! set are small and fixed. Grounded on
//! `original_source/l88_backend/graph/{graph,edges}.py`.

pub mod json_extract;
pub mod nodes;
pub mod router;
pub mod state;

pub use state::{ContextVerdict, PipelineResponse, PipelineState, QueryType, Route, Strategy, Verdict};

use crate::config::RetrievalConfig;
use crate::embeddings::EmbeddingModel;
use crate::error::Result;
use crate::indexes::IndexStore;
use crate::reranking::Reranker;
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Abstracts the LLM call boundary so pipeline nodes can run against a test
/// double without a live Ollama endpoint. `small_ctx` mirrors
/// `LlmClient::call`'s context-window selection.
#[async_trait]
pub trait Llm: Send + Sync {
    async fn call(&self, prompt: &str, small_ctx: bool) -> Result<String>;
}

#[async_trait]
impl Llm for crate::llm::LlmClient {
    async fn call(&self, prompt: &str, small_ctx: bool) -> Result<String> {
        self.call(prompt, small_ctx)
            .await
            .map_err(|e| crate::error::RagError::Transient(e.to_string()))
    }
}

/// Nodes in the traversal graph (distilled §4.9 node names plus the three
/// terminal nodes: output, not_found, error).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    Router,
    Analyzer,
    Rewriter,
    Retrieval,
    Generator,
    SelfEval,
    Summarizer,
    NotFound,
    Error,
    Output,
}

/// Owns every dependency a node needs and drives the traversal. One
/// `Pipeline` is shared across sessions; all mutable state lives in the
/// per-call `PipelineState`.
pub struct Pipeline {
    pub embedder: std::sync::Arc<dyn EmbeddingModel>,
    pub indexes: std::sync::Arc<IndexStore>,
    pub reranker: std::sync::Arc<Reranker>,
    pub llm: std::sync::Arc<dyn Llm>,
    pub retrieval: RetrievalConfig,
}

impl Pipeline {
    /// Runs one full traversal and returns the terminal structured
    /// response. Never returns an `Err` to the caller for ordinary
    /// retrieval/LLM failures — distilled §7's propagation policy routes
    /// those into the `error`/`not_found` terminal nodes instead; an `Err`
    /// here only means index I/O failed outright (disk corruption beyond
    /// what `DenseIndex`/`SparseIndex::load` already tolerate).
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn run(
        &self,
        query: &str,
        session_id: &str,
        selected_doc_ids: Vec<String>,
        web_mode: bool,
    ) -> Result<PipelineResponse> {
        let has_selected_docs = !selected_doc_ids.is_empty();
        let mut state = PipelineState::new(query.to_string(), session_id.to_string(), selected_doc_ids, web_mode);

        let mut node = Node::Router;
        loop {
            debug!(?node, "entering node");
            node = match node {
                Node::Router => {
                    state.route = Some(router::route(&state.query, has_selected_docs, web_mode));
                    match state.route {
                        Some(Route::Summarize) => Node::Summarizer,
                        Some(Route::Chat) => Node::Generator,
                        Some(Route::Rag) | Some(Route::Error) | None => Node::Analyzer,
                    }
                }
                Node::Analyzer => {
                    nodes::analyzer::analyze(&mut state, self.llm.as_ref()).await?;
                    Node::Rewriter
                }
                Node::Rewriter => {
                    nodes::rewriter::rewrite(&mut state, self.llm.as_ref(), self.retrieval.max_alt_queries).await?;
                    Node::Retrieval
                }
                Node::Retrieval => {
                    let deps = nodes::retrieval::RetrievalDeps {
                        embedder: self.embedder.as_ref(),
                        indexes: self.indexes.as_ref(),
                        reranker: self.reranker.as_ref(),
                        retrieve_top_k: self.retrieval.retrieve_top_k,
                        rerank_top_n: self.retrieval.rerank_top_n,
                        bm25_weight_simple: self.retrieval.bm25_weight_simple,
                        bm25_weight_other: self.retrieval.bm25_weight_other,
                        confidence_threshold: self.retrieval.confidence_threshold,
                    };
                    nodes::retrieval::retrieve(&mut state, &deps)?;
                    Node::Generator
                }
                Node::Summarizer => {
                    nodes::summarizer::summarize(&mut state, self.llm.as_ref(), self.indexes.as_ref()).await?;
                    Node::Output
                }
                Node::Generator => {
                    nodes::generator::generate(&mut state, self.llm.as_ref()).await?;
                    route_after_generator(&state, self.retrieval.max_rewrites)
                }
                Node::SelfEval => {
                    nodes::self_eval::self_evaluate(
                        &mut state,
                        self.retrieval.confidence_threshold,
                        self.retrieval.unsure_threshold,
                    );
                    route_after_self_eval(&state, self.retrieval.max_rewrites)
                }
                Node::NotFound => {
                    state.answer = "No information found in the selected sources.".to_string();
                    state.confident = false;
                    state.context_verdict = Some(ContextVerdict::Empty);
                    state.missing_info = "All retrieval attempts returned no relevant results.".to_string();
                    state.sources = Vec::new();
                    Node::Output
                }
                Node::Error => {
                    state.answer = "No sources available. Upload documents or enable web mode.".to_string();
                    state.confident = false;
                    state.context_verdict = Some(ContextVerdict::Empty);
                    state.sources = Vec::new();
                    Node::Output
                }
                Node::Output => break,
            };
        }

        Ok(state.into_response())
    }
}

/// distilled §4.9 / `edges.py::route_after_generator`. A `simple` query
/// with a `SUFFICIENT` verdict skips self-evaluation entirely — retrieval's
/// own `top_rerank_score >= confidence_threshold` check already stands in
/// for it on that fast path.
fn route_after_generator(state: &PipelineState, max_rewrites: usize) -> Node {
    let simple_and_sufficient = state.query_type == Some(QueryType::Simple)
        && state.context_verdict == Some(ContextVerdict::Sufficient);
    if simple_and_sufficient {
        return Node::Output;
    }

    match state.context_verdict {
        Some(ContextVerdict::Sufficient) => Node::SelfEval,
        Some(ContextVerdict::Gap) => {
            if (state.rewrite_count as usize) < max_rewrites {
                Node::Rewriter
            } else {
                Node::SelfEval
            }
        }
        Some(ContextVerdict::Empty) | None => {
            if (state.rewrite_count as usize) < max_rewrites {
                Node::Rewriter
            } else {
                Node::NotFound
            }
        }
    }
}

/// `edges.py::route_after_self_eval`. GOOD exits immediately; otherwise
/// retry while budget remains, else surface the best answer found with
/// `confident = false`.
fn route_after_self_eval(state: &PipelineState, max_rewrites: usize) -> Node {
    match state.verdict {
        Some(Verdict::Good) => Node::Output,
        _ => {
            if (state.rewrite_count as usize) < max_rewrites {
                Node::Rewriter
            } else {
                Node::Output
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_and_sufficient_skips_self_eval() {
        let mut s = PipelineState::new("q".into(), "s1".into(), vec!["d1".into()], false);
        s.query_type = Some(QueryType::Simple);
        s.context_verdict = Some(ContextVerdict::Sufficient);
        assert_eq!(route_after_generator(&s, 2), Node::Output);
    }

    #[test]
    fn multi_hop_sufficient_still_goes_through_self_eval() {
        let mut s = PipelineState::new("q".into(), "s1".into(), vec!["d1".into()], false);
        s.query_type = Some(QueryType::MultiHop);
        s.context_verdict = Some(ContextVerdict::Sufficient);
        assert_eq!(route_after_generator(&s, 2), Node::SelfEval);
    }

    #[test]
    fn gap_retries_while_budget_remains_then_falls_to_self_eval() {
        let mut s = PipelineState::new("q".into(), "s1".into(), vec!["d1".into()], false);
        s.query_type = Some(QueryType::MultiHop);
        s.context_verdict = Some(ContextVerdict::Gap);
        s.rewrite_count = 0;
        assert_eq!(route_after_generator(&s, 2), Node::Rewriter);
        s.rewrite_count = 2;
        assert_eq!(route_after_generator(&s, 2), Node::SelfEval);
    }

    #[test]
    fn empty_retries_while_budget_remains_then_not_found() {
        let mut s = PipelineState::new("q".into(), "s1".into(), vec!["d1".into()], false);
        s.query_type = Some(QueryType::MultiHop);
        s.context_verdict = Some(ContextVerdict::Empty);
        s.rewrite_count = 0;
        assert_eq!(route_after_generator(&s, 2), Node::Rewriter);
        s.rewrite_count = 2;
        assert_eq!(route_after_generator(&s, 2), Node::NotFound);
    }

    #[test]
    fn self_eval_good_exits_bad_retries_then_exhausts_to_output() {
        let mut s = PipelineState::new("q".into(), "s1".into(), vec!["d1".into()], false);
        s.verdict = Some(Verdict::Good);
        assert_eq!(route_after_self_eval(&s, 2), Node::Output);

        s.verdict = Some(Verdict::Bad);
        s.rewrite_count = 0;
        assert_eq!(route_after_self_eval(&s, 2), Node::Rewriter);
        s.rewrite_count = 2;
        assert_eq!(route_after_self_eval(&s, 2), Node::Output);
    }
}
