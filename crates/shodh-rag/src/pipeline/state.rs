//! Pipeline state (distilled spec §3 "Pipeline state", §9 "Dynamic-typed
//! pipeline state") — one struct with optional leaves rather than a
//! per-node bespoke type, matching the source's single `TypedDict` shape
//! (`original_source/l88_backend/graph/state.py`).

use crate::types::{Chunk, Citation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Rag,
    Summarize,
    Chat,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    Simple,
    MultiHop,
    Math,
    Comparison,
}

impl QueryType {
    pub fn from_str_or_default(s: &str) -> Self {
        match s {
            "multi_hop" => QueryType::MultiHop,
            "math" => QueryType::Math,
            "comparison" => QueryType::Comparison,
            _ => QueryType::Simple,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Single,
    Decompose,
    StepBack,
}

impl Strategy {
    pub fn from_str_or_default(s: &str) -> Self {
        match s {
            "decompose" => Strategy::Decompose,
            "step_back" => Strategy::StepBack,
            _ => Strategy::Single,
        }
    }
}

/// The LLM's self-assessment of evidence sufficiency, from the Generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContextVerdict {
    Sufficient,
    Gap,
    Empty,
}

impl ContextVerdict {
    /// Case-insensitive parse with fallback to SUFFICIENT (distilled §4.9 Generator).
    pub fn parse_or_default(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "GAP" => ContextVerdict::Gap,
            "EMPTY" => ContextVerdict::Empty,
            _ => ContextVerdict::Sufficient,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContextVerdict::Sufficient => "SUFFICIENT",
            ContextVerdict::Gap => "GAP",
            ContextVerdict::Empty => "EMPTY",
        }
    }
}

/// The self-evaluator's quality label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Good,
    Unsure,
    Bad,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Good => "GOOD",
            Verdict::Unsure => "UNSURE",
            Verdict::Bad => "BAD",
        }
    }
}

/// Full pipeline state, threaded through the node graph by value. Optional
/// leaves are populated as the corresponding node runs; every field the
/// distilled spec lists is present even though a given traversal only ever
/// touches a subset of them.
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub query: String,
    pub session_id: String,
    pub selected_doc_ids: Vec<String>,
    pub web_mode: bool,

    pub route: Option<Route>,

    pub query_type: Option<QueryType>,
    pub strategy: Option<Strategy>,

    pub rewritten_queries: Vec<String>,
    pub rewrite_count: u32,
    /// Raw verdict label ("SUFFICIENT"/"GAP"/"EMPTY"/"GOOD"/"UNSURE"/"BAD"),
    /// carried into the Rewriter's retry-hint text.
    pub last_verdict: Option<String>,

    pub chunks: Vec<Chunk>,
    pub found: bool,

    pub context_verdict: Option<ContextVerdict>,
    pub reasoning: String,
    pub answer: String,
    pub sources: Vec<Citation>,
    pub missing_info: String,

    pub verdict: Option<Verdict>,
    pub confident: bool,
}

impl PipelineState {
    pub fn new(query: String, session_id: String, selected_doc_ids: Vec<String>, web_mode: bool) -> Self {
        Self {
            query,
            session_id,
            selected_doc_ids,
            web_mode,
            route: None,
            query_type: None,
            strategy: None,
            rewritten_queries: Vec::new(),
            rewrite_count: 0,
            last_verdict: None,
            chunks: Vec::new(),
            found: false,
            context_verdict: None,
            reasoning: String::new(),
            answer: String::new(),
            sources: Vec::new(),
            missing_info: String::new(),
            verdict: None,
            confident: false,
        }
    }

    pub fn into_response(self) -> PipelineResponse {
        PipelineResponse {
            answer: self.answer,
            sources: self.sources,
            confident: self.confident,
            context_verdict: self.context_verdict,
            verdict: self.verdict,
            missing_info: self.missing_info,
        }
    }
}

/// The structured terminal output every Pipeline traversal produces
/// (distilled §7 "every terminal state yields a structured response").
/// This is also the value type stored in the QueryCache, so a cache hit
/// returns a byte-identical response without re-running the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResponse {
    pub answer: String,
    pub sources: Vec<Citation>,
    pub confident: bool,
    pub context_verdict: Option<ContextVerdict>,
    pub verdict: Option<Verdict>,
    pub missing_info: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_type_defaults_to_simple_on_unknown_value() {
        assert_eq!(QueryType::from_str_or_default("nonsense"), QueryType::Simple);
        assert_eq!(QueryType::from_str_or_default("multi_hop"), QueryType::MultiHop);
    }

    #[test]
    fn context_verdict_parses_case_insensitively() {
        assert_eq!(ContextVerdict::parse_or_default("gap"), ContextVerdict::Gap);
        assert_eq!(ContextVerdict::parse_or_default("EMPTY"), ContextVerdict::Empty);
        assert_eq!(ContextVerdict::parse_or_default("bogus"), ContextVerdict::Sufficient);
    }
}
