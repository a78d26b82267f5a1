//! Error types for the session index

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for session index operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Error types that can occur in session index operations
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Empty batch: at least one vector is required")]
    EmptyBatch,

    #[error("Index {index} out of range (len={len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Invalid vector: {reason}")]
    InvalidVector { reason: String },

    #[error("Vector at position {position} is not L2-normalized (norm={norm})")]
    NotNormalized { position: usize, norm: f32 },

    #[error("Batch length mismatch: {texts} texts but {sources} sources")]
    BatchLengthMismatch { texts: usize, sources: usize },

    #[error("Invalid metadata record: {reason}")]
    InvalidRecord { reason: String },

    #[error("top_k must be a positive integer")]
    InvalidTopK,

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Ingestion error: {0}")]
    Ingestion(String),

    #[error("Persistence error at {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt persisted state: {0}")]
    CorruptState(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Session lock poisoned")]
    LockPoisoned,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl SessionError {
    /// Wrap an I/O failure on a persisted artifact.
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SessionError::Persistence {
            path: path.into(),
            source,
        }
    }

    /// True when a durable write or delete failed. In-memory state is still
    /// authoritative when this is returned.
    pub fn is_persistence(&self) -> bool {
        matches!(self, SessionError::Persistence { .. })
    }

    /// True for errors caused by the caller's input rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SessionError::DimensionMismatch { .. }
                | SessionError::EmptyBatch
                | SessionError::InvalidVector { .. }
                | SessionError::NotNormalized { .. }
                | SessionError::BatchLengthMismatch { .. }
                | SessionError::InvalidRecord { .. }
                | SessionError::InvalidTopK
                | SessionError::Ingestion(_)
        )
    }
}
