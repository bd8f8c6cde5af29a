//! Error types for octree store operations.

use std::io;
use thiserror::Error;

/// Errors that can occur while encoding nodes or accessing an octree store
#[derive(Debug, Error)]
pub enum OctreeError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The header file does not start with the expected magic/version, or a
    /// required value could not be parsed.
    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    /// Fewer bytes were available than one fixed-size record needs.
    #[error("Truncated record: expected {expected} bytes, got {actual}")]
    TruncatedRecord { expected: usize, actual: usize },

    #[error("Index {index} out of range (count is {count})")]
    OutOfRange { index: u64, count: u64 },

    #[error("Invalid child slot {0} (must be 0-7)")]
    InvalidSlot(u8),

    #[error("Record size mismatch: expected {expected} bytes, got {actual}")]
    RecordSizeMismatch { expected: usize, actual: usize },

    #[error("Data index 0 is reserved for nodes without payload")]
    ReservedDataIndex,

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Octree file is closed")]
    Closed,
}

impl OctreeError {
    /// Returns true if the error was caused by a broken or unreadable header.
    pub fn is_malformed_header(&self) -> bool {
        matches!(self, OctreeError::MalformedHeader(_))
    }

    /// Returns true if the error was caused by an index past the current count.
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, OctreeError::OutOfRange { .. })
    }
}

/// Result type for octree store operations
pub type OctreeResult<T> = Result<T, OctreeError>;
