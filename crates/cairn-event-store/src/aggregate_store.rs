//! Aggregate store: hydrate and persist whole aggregates.
//!
//! `load` replays an aggregate's full stream through `raise_event`. `save`
//! appends the aggregate's uncommitted events with a compare-and-append
//! guard: `NoStream` for an aggregate that was never persisted, otherwise the
//! stream's current tail position, re-read immediately before the append.
//! No client-side lock is held between that read and the append; the stream
//! store's conditional append decides the race.

use std::sync::Arc;

use cairn_core::aggregate::Aggregate;
use cairn_core::context::Context;
use cairn_core::error::DomainError;
use cairn_core::event::Event;
use cairn_core::stream::{
    AppendResult, EventData, ExpectedRevision, ReadDirection, StreamPosition, StreamStore,
};
use futures::StreamExt;
use tracing::{debug, instrument, warn};

use crate::config::StoreConfig;
use crate::stream_access::StreamAccess;

/// Loads and saves aggregates against their streams.
#[derive(Debug, Clone)]
pub struct AggregateStore {
    access: StreamAccess,
}

impl AggregateStore {
    /// Creates a new `AggregateStore` over the given stream store.
    #[must_use]
    pub fn new(streams: Arc<dyn StreamStore>, config: &StoreConfig) -> Self {
        Self {
            access: StreamAccess::new(streams, config),
        }
    }

    /// Hydrates `aggregate` by replaying its whole stream in order.
    ///
    /// On error the aggregate may be partially hydrated and must be
    /// discarded.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StreamNotFound` if the stream does not exist,
    /// `DomainError::Infrastructure` on store failure, whatever
    /// `raise_event` returns for a bad event, or `Cancelled`/
    /// `DeadlineExceeded` from the context. Errors are wrapped with the
    /// operation name and stream id.
    #[instrument(
        skip_all,
        fields(
            stream_id = %aggregate.aggregate_id(),
            aggregate_type = %aggregate.aggregate_type(),
        )
    )]
    pub async fn load<A>(&self, ctx: &Context, aggregate: &mut A) -> Result<(), DomainError>
    where
        A: Aggregate + ?Sized,
    {
        let stream_id = aggregate.aggregate_id().to_owned();
        let aggregate_type = aggregate.aggregate_type().clone();

        let replayed = self
            .access
            .scoped(ctx)
            .run(self.access.read_forward(&stream_id, |recorded| {
                let mut event = Event::from_recorded(recorded);
                event.aggregate_type = aggregate_type.clone();
                aggregate.raise_event(&event)
            }))
            .await
            .map_err(|e| e.in_operation("AggregateStore::load", stream_id.as_str()))?;

        debug!(replayed, version = aggregate.version(), "aggregate hydrated");
        Ok(())
    }

    /// Builds a fresh aggregate with `factory` and hydrates it.
    ///
    /// # Errors
    ///
    /// As [`AggregateStore::load`].
    pub async fn load_with<A, F>(
        &self,
        ctx: &Context,
        aggregate_id: &str,
        factory: F,
    ) -> Result<A, DomainError>
    where
        A: Aggregate,
        F: FnOnce(&str) -> A,
    {
        let mut aggregate = factory(aggregate_id);
        self.load(ctx, &mut aggregate).await?;
        Ok(aggregate)
    }

    /// Appends the aggregate's uncommitted events and clears them.
    ///
    /// With no uncommitted events this returns immediately without touching
    /// the stream store. On failure the uncommitted events are kept so the
    /// caller can reload and retry, or discard.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ConcurrencyConflict` if another writer moved the
    /// stream head first, `DomainError::Infrastructure` on store failure, or
    /// `Cancelled`/`DeadlineExceeded` from the context. Errors are wrapped
    /// with the operation name and stream id.
    #[instrument(
        skip_all,
        fields(
            stream_id = %aggregate.aggregate_id(),
            version = aggregate.version(),
            uncommitted = aggregate.uncommitted_events().len(),
        )
    )]
    pub async fn save<A>(&self, ctx: &Context, aggregate: &mut A) -> Result<(), DomainError>
    where
        A: Aggregate + ?Sized,
    {
        if aggregate.uncommitted_events().is_empty() {
            debug!("no uncommitted events, nothing to save");
            return Ok(());
        }

        let stream_id = aggregate.aggregate_id().to_owned();
        let events: Vec<EventData> = aggregate
            .uncommitted_events()
            .iter()
            .map(Event::to_event_data)
            .collect();
        let persisted_version = aggregate.persisted_version();

        let appended = self
            .access
            .scoped(ctx)
            .run(self.append(&stream_id, persisted_version, events))
            .await
            .map_err(|e| {
                if e.is_concurrency_conflict() {
                    warn!(error = %e, "lost append race");
                }
                e.in_operation("AggregateStore::save", stream_id.as_str())
            })?;

        aggregate.clear_uncommitted_events();
        debug!(head = appended.next_expected_revision, "aggregate saved");
        Ok(())
    }

    async fn append(
        &self,
        stream_id: &str,
        persisted_version: u64,
        events: Vec<EventData>,
    ) -> Result<AppendResult, DomainError> {
        let expected = if persisted_version == 0 {
            ExpectedRevision::NoStream
        } else {
            ExpectedRevision::Exact(self.tail_position(stream_id).await?)
        };
        debug!(%expected, "appending with expected revision");

        self.access
            .streams
            .append_to_stream(stream_id, expected, events)
            .await
    }

    async fn tail_position(&self, stream_id: &str) -> Result<u64, DomainError> {
        let mut tail = self
            .access
            .streams
            .read_stream(stream_id, ReadDirection::Backwards, StreamPosition::End, 1)
            .await?;
        match tail.next().await {
            Some(recorded) => Ok(recorded?.position),
            None => Err(DomainError::StreamNotFound(stream_id.to_owned())),
        }
    }

    /// Probes whether `stream_id` exists by reading one event at its tail.
    /// Never applies events to anything.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StreamNotFound` if the stream is absent,
    /// `DomainError::Infrastructure` on store failure, or `Cancelled`/
    /// `DeadlineExceeded` from the context. Errors are wrapped with the
    /// operation name and stream id.
    #[instrument(skip(self, ctx))]
    pub async fn exists(&self, ctx: &Context, stream_id: &str) -> Result<(), DomainError> {
        self.access
            .scoped(ctx)
            .run(async {
                let position = self.tail_position(stream_id).await?;
                debug!(position, "stream exists");
                Ok(())
            })
            .await
            .map_err(|e| e.in_operation("AggregateStore::exists", stream_id))
    }
}
