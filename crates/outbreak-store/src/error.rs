use std::path::PathBuf;

/// Alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the document store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading, writing, or replacing the file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// An existing document could not be decoded. Never recovered from.
    #[error("corrupt document {path}: {source}")]
    Corrupt {
        /// The file involved.
        path: PathBuf,
        /// The decode error.
        source: serde_json::Error,
    },

    /// The in-memory document could not be encoded.
    #[error("cannot encode document: {0}")]
    Encode(#[source] serde_json::Error),

    /// A keyed access named something the document does not have, or
    /// supplied a value of the wrong shape for it.
    #[error("invalid value for key \"{key}\": {source}")]
    Key {
        /// The key.
        key: String,
        /// Why the value was rejected.
        source: serde_json::Error,
    },

    /// A keyed access named something the document does not have.
    #[error("unknown key \"{0}\"")]
    UnknownKey(String),

    /// The blocking write task panicked or was cancelled.
    #[error("write task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
