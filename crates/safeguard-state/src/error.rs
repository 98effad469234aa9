//! Store error types.

/// Errors produced by [`ModerationStore`](crate::ModerationStore) operations.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Underlying `SQLite` failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// `SQLite` failure tagged with the operation that hit it.
    #[error("{context}: {source}")]
    Backend {
        context: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// A JSON column could not be encoded or decoded.
    #[error("json column error: {0}")]
    Json(#[from] serde_json::Error),

    /// A text column held a value outside its enumeration.
    #[error("invalid stored value in {column}: {message}")]
    InvalidColumn {
        column: &'static str,
        message: String,
    },

    /// File-system I/O failure (e.g. creating the database directory).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal mutex was poisoned by a panicked thread.
    #[error("moderation store lock poisoned")]
    LockPoisoned,
}

impl StateError {
    pub(crate) fn backend_context(context: &'static str, source: rusqlite::Error) -> Self {
        Self::Backend { context, source }
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, StateError>;
