//! Domain error types.

use thiserror::Error;

use crate::stream::ExpectedRevision;

/// Top-level error type shared by the stores, adapters and domain code.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The stream does not exist in the stream store.
    #[error("stream not found: {0}")]
    StreamNotFound(String),

    /// Optimistic concurrency conflict on a conditional append.
    #[error(
        "concurrency conflict on stream {stream_id}: expected revision {expected}, found {}",
        display_actual(.actual)
    )]
    ConcurrencyConflict {
        /// The stream that had the conflict.
        stream_id: String,
        /// The revision the writer asserted.
        expected: ExpectedRevision,
        /// The head position actually found, `None` if the stream is absent.
        actual: Option<u64>,
    },

    /// A malformed command or event detected before any store interaction.
    #[error("validation error: {0}")]
    Validation(String),

    /// A transport, serialization or store-internal failure.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),

    /// The operation was cancelled by its caller.
    #[error("operation cancelled")]
    Cancelled,

    /// The operation's deadline passed before the store answered.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// An error annotated with the operation and stream it came from.
    #[error("{operation} [{stream_id}]: {source}")]
    Operation {
        /// Name of the failing operation, e.g. `AggregateStore::load`.
        operation: &'static str,
        /// The stream the operation targeted.
        stream_id: String,
        /// The underlying error.
        #[source]
        source: Box<DomainError>,
    },
}

#[allow(clippy::ref_option)]
fn display_actual(actual: &Option<u64>) -> String {
    actual.map_or_else(|| "no stream".to_owned(), |position| position.to_string())
}

impl DomainError {
    /// Wraps this error with the operation name and target stream id.
    #[must_use]
    pub fn in_operation(self, operation: &'static str, stream_id: impl Into<String>) -> Self {
        Self::Operation {
            operation,
            stream_id: stream_id.into(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, skipping any operation annotations.
    #[must_use]
    pub fn root(&self) -> &DomainError {
        let mut current = self;
        while let Self::Operation { source, .. } = current {
            current = source;
        }
        current
    }

    /// True if the root cause is an absent stream.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Self::StreamNotFound(_))
    }

    /// True if the root cause is a lost compare-and-append race.
    #[must_use]
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self.root(), Self::ConcurrencyConflict { .. })
    }
}
