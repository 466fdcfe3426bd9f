//! Structured error types for loom assembly.

use thiserror::Error;

/// Unified error type for all scopeloom operations.
#[derive(Debug, Error)]
pub enum LoomError {
    /// I/O error (file not found, permission denied, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The hierarchy path did not have exactly three segments.
    #[error("the hierarchy must contain exactly 3 segments (empty strings allowed), got {0}")]
    InvalidHierarchy(usize),

    /// A requested source attribute does not exist.
    #[error("cannot find {kind} with '{key}' as key")]
    MissingKey { kind: &'static str, key: String },

    /// An annotation has more distinct values than the viewer can display.
    #[error("annotation '{key}' has {count} unique values, the limit is {limit}")]
    TooManyValues {
        key: String,
        count: usize,
        limit: usize,
    },

    /// The X and Y extra-embedding tables drifted apart.
    #[error("column attributes Embeddings_X ({x} columns) and Embeddings_Y ({y} columns) do not match")]
    InconsistentEmbeddings { x: usize, y: usize },

    /// Invalid input (bad shapes, unsupported column types)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Compression or decompression failure
    #[error("compression error: {0}")]
    Compression(String),

    /// JSON or text encoding failure
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The container backend rejected a write
    #[error("container error: {0}")]
    Container(String),
}

/// Convenience alias used throughout scopeloom.
pub type Result<T> = std::result::Result<T, LoomError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_message_names_kind_and_key() {
        let e = LoomError::MissingKey {
            kind: "annotation",
            key: "louvain".into(),
        };
        assert_eq!(e.to_string(), "cannot find annotation with 'louvain' as key");
    }

    #[test]
    fn io_errors_convert() {
        fn open() -> Result<std::fs::File> {
            Ok(std::fs::File::open("/nonexistent/scopeloom/file")?)
        }
        assert!(matches!(open(), Err(LoomError::Io(_))));
    }
}
