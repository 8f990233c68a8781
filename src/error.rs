// ABOUTME: Error type shared by the diff, transfer and flat-file engines
// ABOUTME: Separates storage failures, malformed input, append ordering and cancellation

use thiserror::Error;

/// Errors surfaced by the engines.
///
/// Divergences found while comparing stores are not errors; they are reported
/// through a [`crate::diff::DiffObserver`] and the comparison still succeeds.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Any failure reported by the underlying store (open, cursor, commit)
    #[error("storage error: {0}")]
    Storage(#[from] redb::Error),

    /// Reading the flat export or writing progress output failed
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The flat export stream could not be parsed
    #[error("malformed export at line {line}: {reason}")]
    Malformed { line: u64, reason: String },

    /// An append did not land strictly after the last entry of the table
    #[error("append out of order in table '{table}' at key {key}")]
    AppendOutOfOrder { table: String, key: String },

    /// The loader's write transaction was already committed or lost
    #[error("write transaction already closed")]
    TransactionClosed,

    /// The caller requested an abort
    #[error("context canceled")]
    Canceled,
}

impl EngineError {
    pub fn malformed(line: u64, reason: impl Into<String>) -> Self {
        EngineError::Malformed {
            line,
            reason: reason.into(),
        }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, EngineError::Canceled)
    }
}

macro_rules! storage_error_from {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for EngineError {
                fn from(err: $source) -> Self {
                    EngineError::Storage(redb::Error::from(err))
                }
            }
        )*
    };
}

storage_error_from!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

pub type EngineResult<T> = Result<T, EngineError>;
