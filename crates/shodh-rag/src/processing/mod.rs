//! Parse -> chunk pipeline stages (C5 Chunker, C6 Parser).

pub mod chunker;
pub mod lopdf_parser;
pub mod parser;

pub use chunker::Chunker;
pub use parser::Parser;
