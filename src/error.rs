//! Error types for the vector index server

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for VectorDB operations
pub type Result<T> = std::result::Result<T, VectorDbError>;

/// Error types that can occur while loading or serving an index
#[derive(Error, Debug)]
pub enum VectorDbError {
    /// The request's vector payload does not hold `num_vectors * dimension` components.
    #[error(
        "num elements of vector({actual}) != num vectors({num_vectors}) * dimension({dimension}) (expected {expected})"
    )]
    ShapeMismatch {
        expected: usize,
        actual: usize,
        num_vectors: usize,
        dimension: usize,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Failed to load index from {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl VectorDbError {
    /// Whether the error was caused by the caller's input rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            VectorDbError::ShapeMismatch { .. }
                | VectorDbError::InvalidArgument(_)
                | VectorDbError::DimensionMismatch { .. }
        )
    }
}

impl From<VectorDbError> for tonic::Status {
    fn from(err: VectorDbError) -> Self {
        if err.is_client_error() {
            tonic::Status::invalid_argument(err.to_string())
        } else {
            tonic::Status::internal(err.to_string())
        }
    }
}
