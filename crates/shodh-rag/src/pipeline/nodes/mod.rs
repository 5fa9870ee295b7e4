pub mod analyzer;
pub mod generator;
pub mod retrieval;
pub mod rewriter;
pub mod self_eval;
pub mod summarizer;
