//! Error taxonomy. See SPEC_FULL.md §7.

#[derive(thiserror::Error, Debug)]
pub enum RagError {
    /// Caller fault: bad input, should not be retried.
    #[error("validation: {0}")]
    Validation(String),

    /// An external dependency (LLM, embedder, reranker) failed or was unreachable.
    #[error("external service unavailable: {0}")]
    Transient(String),

    /// An on-disk index artifact exists but could not be read.
    #[error("index corruption: {0}")]
    Corruption(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RagError>;
