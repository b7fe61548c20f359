//! Aggregate-agnostic event store.
//!
//! Saves and loads raw event batches against a named stream. Unlike the
//! aggregate store, loading an absent stream yields an empty batch.

use std::sync::Arc;

use cairn_core::context::Context;
use cairn_core::error::DomainError;
use cairn_core::event::Event;
use cairn_core::stream::{EventData, ExpectedRevision, StreamStore};
use tracing::{debug, instrument};

use crate::config::StoreConfig;
use crate::stream_access::StreamAccess;

/// Low-level save/load of event batches.
#[derive(Debug, Clone)]
pub struct EventStore {
    access: StreamAccess,
}

impl EventStore {
    /// Creates a new `EventStore` over the given stream store.
    #[must_use]
    pub fn new(streams: Arc<dyn StreamStore>, config: &StoreConfig) -> Self {
        Self {
            access: StreamAccess::new(streams, config),
        }
    }

    /// Appends `events` to `stream_id` without a revision check. An empty
    /// batch is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on store failure or when an
    /// event id is already recorded, or
    /// `Cancelled`/`DeadlineExceeded` from the context, each wrapped with the
    /// operation name and stream id.
    #[instrument(skip(self, ctx, events), fields(count = events.len()))]
    pub async fn save_events(
        &self,
        ctx: &Context,
        stream_id: &str,
        events: &[Event],
    ) -> Result<(), DomainError> {
        if events.is_empty() {
            debug!("empty batch, nothing to append");
            return Ok(());
        }

        let data: Vec<EventData> = events.iter().map(Event::to_event_data).collect();
        let appended = self
            .access
            .scoped(ctx)
            .run(
                self.access
                    .streams
                    .append_to_stream(stream_id, ExpectedRevision::Any, data),
            )
            .await
            .map_err(|e| e.in_operation("EventStore::save_events", stream_id))?;

        debug!(head = appended.next_expected_revision, "events appended");
        Ok(())
    }

    /// Loads every event of `stream_id` in stream order. An absent stream
    /// yields an empty `Vec`.
    ///
    /// Streams do not record an aggregate type, so each returned event has an
    /// empty `aggregate_type`. [`AggregateStore::load`](crate::AggregateStore::load)
    /// stamps it from the aggregate being hydrated.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on store failure, or
    /// `Cancelled`/`DeadlineExceeded` from the context, each wrapped with the
    /// operation name and stream id.
    #[instrument(skip(self, ctx))]
    pub async fn load_events(
        &self,
        ctx: &Context,
        stream_id: &str,
    ) -> Result<Vec<Event>, DomainError> {
        let mut events = Vec::new();
        let read = self
            .access
            .scoped(ctx)
            .run(self.access.read_forward(stream_id, |recorded| {
                events.push(Event::from_recorded(recorded));
                Ok(())
            }))
            .await;

        match read {
            Ok(count) => {
                debug!(count, "events loaded");
                Ok(events)
            }
            Err(DomainError::StreamNotFound(_)) => {
                debug!("stream absent, returning no events");
                Ok(Vec::new())
            }
            Err(e) => Err(e.in_operation("EventStore::load_events", stream_id)),
        }
    }
}
