//! In-process implementation of the `StreamStore` port.
//!
//! Streams live in a map behind one mutex; compare-and-append runs entirely
//! under that lock, so it has the same all-or-nothing, one-winner semantics
//! as the durable adapters. Event ids are unique across all streams, as in
//! the PostgreSQL adapter. Used for tests and local runs.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use cairn_core::clock::{Clock, SystemClock};
use cairn_core::error::DomainError;
use cairn_core::stream::{
    AppendResult, EventData, ExpectedRevision, ReadDirection, RecordedEvent,
    RecordedEventStream, StreamPosition, StreamStore,
};
use futures::stream;
use uuid::Uuid;

#[derive(Default)]
struct Streams {
    by_id: HashMap<String, Vec<RecordedEvent>>,
    event_ids: HashSet<Uuid>,
}

impl Streams {
    /// First id in `events` that is already recorded or repeats within the batch.
    fn duplicate_id(&self, events: &[EventData]) -> Option<Uuid> {
        let mut batch = HashSet::new();
        events
            .iter()
            .map(|data| data.event_id)
            .find(|id| self.event_ids.contains(id) || !batch.insert(*id))
    }
}

/// A `StreamStore` held entirely in memory. Clones share the same streams.
#[derive(Clone)]
pub struct InMemoryStreamStore {
    streams: Arc<Mutex<Streams>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for InMemoryStreamStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStreamStore").finish_non_exhaustive()
    }
}

impl Default for InMemoryStreamStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStreamStore {
    /// Creates an empty store stamping events with the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store stamping events with `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            streams: Arc::new(Mutex::new(Streams::default())),
            clock,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Streams>, DomainError> {
        self.streams
            .lock()
            .map_err(|_| DomainError::Infrastructure("in-memory stream store poisoned".into()))
    }

    /// Copies out the requested window, `None` if the stream is absent.
    fn select(
        &self,
        stream_id: &str,
        direction: ReadDirection,
        from: StreamPosition,
        max_count: u64,
    ) -> Result<Option<Vec<RecordedEvent>>, DomainError> {
        let streams = self.lock()?;
        Ok(streams
            .by_id
            .get(stream_id)
            .map(|events| window(events, direction, from, max_count)))
    }

    fn compare_and_append(
        &self,
        stream_id: &str,
        expected: ExpectedRevision,
        events: Vec<EventData>,
    ) -> Result<AppendResult, DomainError> {
        let mut streams = self.lock()?;
        let head = streams.by_id.get(stream_id).map(|events| events.len() as u64);
        if !expected.matches(head) {
            return Err(DomainError::ConcurrencyConflict {
                stream_id: stream_id.to_owned(),
                expected,
                actual: head,
            });
        }
        if events.is_empty() {
            return Ok(AppendResult {
                next_expected_revision: head.unwrap_or(0),
            });
        }
        if let Some(event_id) = streams.duplicate_id(&events) {
            return Err(DomainError::Infrastructure(format!(
                "event {event_id} is already recorded"
            )));
        }

        let created_at = self.clock.now();
        let Streams { by_id, event_ids } = &mut *streams;
        let recorded = by_id.entry(stream_id.to_owned()).or_default();
        for data in events {
            event_ids.insert(data.event_id);
            let position = recorded.len() as u64 + 1;
            recorded.push(RecordedEvent {
                event_id: data.event_id,
                event_type: data.event_type,
                data: data.data,
                metadata: data.metadata,
                created_at,
                stream_id: stream_id.to_owned(),
                position,
            });
        }

        Ok(AppendResult {
            next_expected_revision: recorded.len() as u64,
        })
    }
}

fn as_len(position: u64) -> usize {
    usize::try_from(position).unwrap_or(usize::MAX)
}

/// Selects the requested window of a stream. `events[i]` is at position `i + 1`.
fn window(
    events: &[RecordedEvent],
    direction: ReadDirection,
    from: StreamPosition,
    max_count: u64,
) -> Vec<RecordedEvent> {
    let head = events.len() as u64;
    let limit = as_len(max_count);
    match direction {
        ReadDirection::Forwards => {
            let start = match from {
                StreamPosition::Start => 1,
                StreamPosition::End => head.max(1),
                StreamPosition::At(position) => position.max(1),
            };
            events
                .iter()
                .skip(as_len(start - 1))
                .take(limit)
                .cloned()
                .collect()
        }
        ReadDirection::Backwards => {
            let start = match from {
                StreamPosition::Start => head.min(1),
                StreamPosition::End => head,
                StreamPosition::At(position) => position.min(head),
            };
            events[..as_len(start)]
                .iter()
                .rev()
                .take(limit)
                .cloned()
                .collect()
        }
    }
}

#[async_trait]
impl StreamStore for InMemoryStreamStore {
    async fn read_stream(
        &self,
        stream_id: &str,
        direction: ReadDirection,
        from: StreamPosition,
        max_count: u64,
    ) -> Result<RecordedEventStream, DomainError> {
        let selected = self.select(stream_id, direction, from, max_count)?;
        match selected {
            Some(events) => Ok(Box::pin(stream::iter(events.into_iter().map(Ok::<_, DomainError>)))),
            None => {
                let missing = DomainError::StreamNotFound(stream_id.to_owned());
                Ok(Box::pin(stream::iter([Err::<RecordedEvent, _>(missing)])))
            }
        }
    }

    async fn append_to_stream(
        &self,
        stream_id: &str,
        expected: ExpectedRevision,
        events: Vec<EventData>,
    ) -> Result<AppendResult, DomainError> {
        self.compare_and_append(stream_id, expected, events)
    }
}
