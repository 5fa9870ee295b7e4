//! Persistent index storage (C2 DenseIndex, C3 SparseIndex). See SPEC_FULL.md §4.2-4.3.
//!
//! The teacher's original LanceDB-backed vector store is dropped: the
//! per-session two-flat-files persistence contract (atomic rename, "absent
//! file -> empty index") maps more directly onto the flat `DenseIndex`
//! below than onto a LanceDB connection/table model. See DESIGN.md.

pub mod dense_index;
pub mod sparse_index;

pub use dense_index::DenseIndex;
pub use sparse_index::SparseIndex;
