//! Error types for the fuzzy-hash HNSW index.

use thiserror::Error;

/// Result type alias used throughout this crate.
pub type Result<T> = std::result::Result<T, ApoError>;

/// Error types that can occur while building, querying or persisting an index.
#[derive(Error, Debug)]
pub enum ApoError {
    #[error("node already exists: {id}")]
    NodeAlreadyExists { id: String },

    #[error("node not found: {id}")]
    NodeNotFound { id: String },

    #[error("index is empty")]
    IndexEmpty,

    #[error("distance metric mismatch: index uses {expected}, record uses {actual}")]
    MetricMismatch { expected: String, actual: String },

    #[error("CRC32 mismatch in {section}: expected {expected:#010x}, computed {actual:#010x}")]
    BadCrc {
        section: &'static str,
        expected: u32,
        actual: u32,
    },

    #[error("unrecognized file format (magic or version mismatch)")]
    BadFormat,

    #[error("corrupt index: neighbor page id {page_id} not resolvable")]
    CorruptIndex { page_id: u32 },

    #[error("record loader failed: {0}")]
    LoaderFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
