use thiserror::Error;

/// Errors raised by the vector store, embedders and query engine.
#[derive(Debug, Error)]
pub enum VecDbError {
    /// A vector's length disagrees with the collection's established dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension fixed by the first insert.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },

    /// A caller submitted more items than one batch may hold.
    #[error("batch of {size} exceeds configured maximum {max}")]
    BatchSizeExceeded { size: usize, max: usize },

    /// Store configuration is unusable or conflicts with the persisted collection.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The embedding provider failed or returned unusable output.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// A persisted value could not be decoded.
    #[error("invalid database value: {0}")]
    InvalidDbValue(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result alias for vector store operations.
pub type Result<T> = std::result::Result<T, VecDbError>;
