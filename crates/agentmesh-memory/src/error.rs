use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("memory backend I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to (de)serialize memory entry: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("vector-service memory backend error: {0}")]
    VectorService(String),
}

pub type MemoryResult<T> = Result<T, MemoryError>;
