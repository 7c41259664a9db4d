//! Error types for the event store.

/// A filter was rejected as a whole before any query ran.
///
/// These are expected outcomes of untrusted input, not failures of the
/// store. No partial results are ever produced for a rejected filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    /// More ids than the configured ceiling.
    #[error("too many ids")]
    TooManyIds,
    /// More authors than the configured ceiling.
    #[error("too many authors")]
    TooManyAuthors,
    /// More kinds than the configured ceiling.
    #[error("too many kinds")]
    TooManyKinds,
    /// More tag values, summed over all tag names, than the ceiling.
    #[error("too many tag values")]
    TooManyTagValues,
    /// A tag name was given with no accepted values.
    #[error("empty tag set")]
    EmptyTagSet,
}

/// Errors that can occur during event store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An event with the same id is already stored. Callers usually treat
    /// this as an idempotent success.
    #[error("duplicate: event already exists")]
    DuplicateEvent,

    /// The filter was rejected before execution.
    #[error("invalid filter: {0}")]
    Filter(#[from] FilterError),

    /// A database operation failed.
    #[error("store database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No pooled connection could be obtained.
    #[error("store pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Tag JSON could not be encoded or decoded.
    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The blocking worker panicked or was cancelled.
    #[error("store worker failed: {0}")]
    TaskJoin(String),
}

impl StoreError {
    /// Whether this is the benign duplicate-id outcome.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateEvent)
    }
}
