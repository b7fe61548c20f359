//! Stream store port.
//!
//! The stream store is the external, append-only, per-aggregate log. This
//! module defines the narrow surface the event and aggregate stores need
//! from it: a paged read in either direction and a conditional append.

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use uuid::Uuid;

use crate::error::DomainError;

/// Content type recorded for JSON payloads.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Direction of a stream read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadDirection {
    /// Oldest to newest.
    Forwards,
    /// Newest to oldest.
    Backwards,
}

/// Where a read starts. Positions are one-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPosition {
    /// The first event of the stream.
    Start,
    /// The last event of the stream.
    End,
    /// A specific position, inclusive.
    At(u64),
}

/// The stream head a writer asserts before appending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedRevision {
    /// The stream must not exist yet.
    NoStream,
    /// The stream's last event must be at exactly this position.
    Exact(u64),
    /// No check.
    Any,
}

impl fmt::Display for ExpectedRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoStream => f.write_str("no stream"),
            Self::Exact(position) => write!(f, "{position}"),
            Self::Any => f.write_str("any"),
        }
    }
}

impl ExpectedRevision {
    /// Checks the assertion against the stream's current head, `None` when the
    /// stream is absent.
    #[must_use]
    pub fn matches(self, head: Option<u64>) -> bool {
        match (self, head) {
            (Self::Any, _) | (Self::NoStream, None) => true,
            (Self::Exact(expected), Some(actual)) => expected == actual,
            _ => false,
        }
    }
}

/// An event as handed to the stream store for appending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventData {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Event type name.
    pub event_type: String,
    /// MIME type of `data`.
    pub content_type: String,
    /// Serialized payload.
    pub data: Vec<u8>,
    /// Serialized metadata.
    pub metadata: Vec<u8>,
}

/// An event as recorded by the stream store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Event type name.
    pub event_type: String,
    /// Serialized payload.
    pub data: Vec<u8>,
    /// Serialized metadata.
    pub metadata: Vec<u8>,
    /// When the store recorded the event.
    pub created_at: DateTime<Utc>,
    /// The stream the event belongs to.
    pub stream_id: String,
    /// One-based position within the stream.
    pub position: u64,
}

/// Outcome of a successful append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendResult {
    /// Position of the last event now in the stream.
    pub next_expected_revision: u64,
}

/// Lazy, forward-only sequence of recorded events produced by a read.
///
/// Exhaustion (`None`) means the end of the requested range. An absent stream
/// is reported as a `DomainError::StreamNotFound` item, never as exhaustion.
pub type RecordedEventStream =
    Pin<Box<dyn Stream<Item = Result<RecordedEvent, DomainError>> + Send>>;

/// Client of the external append-only stream store.
#[async_trait]
pub trait StreamStore: Send + Sync {
    /// Reads at most `max_count` events of `stream_id` starting at `from`.
    ///
    /// Implementations may report an absent stream either as an `Err` here or
    /// as the first item of the returned stream.
    async fn read_stream(
        &self,
        stream_id: &str,
        direction: ReadDirection,
        from: StreamPosition,
        max_count: u64,
    ) -> Result<RecordedEventStream, DomainError>;

    /// Appends `events` atomically if the stream head matches `expected`.
    ///
    /// Returns `DomainError::ConcurrencyConflict` when it does not; `Any`
    /// never conflicts, even with a writer creating the same stream. An event
    /// id already recorded in any stream fails the whole batch with
    /// `DomainError::Infrastructure`.
    async fn append_to_stream(
        &self,
        stream_id: &str,
        expected: ExpectedRevision,
        events: Vec<EventData>,
    ) -> Result<AppendResult, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_stream_matches_only_absent_stream() {
        assert!(ExpectedRevision::NoStream.matches(None));
        assert!(!ExpectedRevision::NoStream.matches(Some(1)));
    }

    #[test]
    fn test_exact_matches_only_same_head() {
        assert!(ExpectedRevision::Exact(2).matches(Some(2)));
        assert!(!ExpectedRevision::Exact(2).matches(Some(3)));
        assert!(!ExpectedRevision::Exact(2).matches(None));
    }

    #[test]
    fn test_any_always_matches() {
        assert!(ExpectedRevision::Any.matches(None));
        assert!(ExpectedRevision::Any.matches(Some(7)));
    }
}
