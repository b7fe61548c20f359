//! Test stream stores — `StreamStore` doubles for tests.

use std::future::pending;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cairn_core::error::DomainError;
use cairn_core::stream::{
    AppendResult, EventData, ExpectedRevision, ReadDirection, RecordedEventStream,
    StreamPosition, StreamStore,
};
use tokio::sync::Barrier;

/// One `append_to_stream` call as seen by a `RecordingStreamStore`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedAppend {
    /// Target stream.
    pub stream_id: String,
    /// The revision the caller asserted.
    pub expected: ExpectedRevision,
    /// Event types, in append order.
    pub event_types: Vec<String>,
}

/// A stream store that records every call and forwards it to `inner`.
pub struct RecordingStreamStore {
    inner: Arc<dyn StreamStore>,
    reads: Mutex<Vec<(String, ReadDirection, StreamPosition, u64)>>,
    appends: Mutex<Vec<RecordedAppend>>,
}

impl std::fmt::Debug for RecordingStreamStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingStreamStore")
            .field("reads", &self.reads)
            .field("appends", &self.appends)
            .finish_non_exhaustive()
    }
}

impl RecordingStreamStore {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: Arc<dyn StreamStore>) -> Self {
        Self {
            inner,
            reads: Mutex::new(Vec::new()),
            appends: Mutex::new(Vec::new()),
        }
    }

    /// Returns a snapshot of all reads: stream, direction, start, max count.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn reads(&self) -> Vec<(String, ReadDirection, StreamPosition, u64)> {
        self.reads.lock().unwrap().clone()
    }

    /// Returns a snapshot of all appends.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn appends(&self) -> Vec<RecordedAppend> {
        self.appends.lock().unwrap().clone()
    }

    /// Total number of calls of either kind.
    ///
    /// # Panics
    ///
    /// Panics if an internal mutex is poisoned.
    pub fn call_count(&self) -> usize {
        self.reads.lock().unwrap().len() + self.appends.lock().unwrap().len()
    }
}

#[async_trait]
impl StreamStore for RecordingStreamStore {
    async fn read_stream(
        &self,
        stream_id: &str,
        direction: ReadDirection,
        from: StreamPosition,
        max_count: u64,
    ) -> Result<RecordedEventStream, DomainError> {
        self.reads
            .lock()
            .unwrap()
            .push((stream_id.to_owned(), direction, from, max_count));
        self.inner
            .read_stream(stream_id, direction, from, max_count)
            .await
    }

    async fn append_to_stream(
        &self,
        stream_id: &str,
        expected: ExpectedRevision,
        events: Vec<EventData>,
    ) -> Result<AppendResult, DomainError> {
        self.appends.lock().unwrap().push(RecordedAppend {
            stream_id: stream_id.to_owned(),
            expected,
            event_types: events.iter().map(|e| e.event_type.clone()).collect(),
        });
        self.inner
            .append_to_stream(stream_id, expected, events)
            .await
    }
}

/// A stream store that always returns an infrastructure error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingStreamStore;

#[async_trait]
impl StreamStore for FailingStreamStore {
    async fn read_stream(
        &self,
        _stream_id: &str,
        _direction: ReadDirection,
        _from: StreamPosition,
        _max_count: u64,
    ) -> Result<RecordedEventStream, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn append_to_stream(
        &self,
        _stream_id: &str,
        _expected: ExpectedRevision,
        _events: Vec<EventData>,
    ) -> Result<AppendResult, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}

/// A stream store whose calls never complete. Useful for testing
/// cancellation and deadlines.
#[derive(Debug)]
pub struct StalledStreamStore;

#[async_trait]
impl StreamStore for StalledStreamStore {
    async fn read_stream(
        &self,
        _stream_id: &str,
        _direction: ReadDirection,
        _from: StreamPosition,
        _max_count: u64,
    ) -> Result<RecordedEventStream, DomainError> {
        pending().await
    }

    async fn append_to_stream(
        &self,
        _stream_id: &str,
        _expected: ExpectedRevision,
        _events: Vec<EventData>,
    ) -> Result<AppendResult, DomainError> {
        pending().await
    }
}

/// A stream store that holds every backward read at a barrier until
/// `parties` of them have arrived, then forwards to `inner`. Forces two
/// saves to both observe the same stream tail before either appends.
pub struct GatedStreamStore {
    inner: Arc<dyn StreamStore>,
    barrier: Barrier,
}

impl std::fmt::Debug for GatedStreamStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatedStreamStore").finish_non_exhaustive()
    }
}

impl GatedStreamStore {
    /// Wraps `inner`, releasing backward reads in groups of `parties`.
    #[must_use]
    pub fn new(inner: Arc<dyn StreamStore>, parties: usize) -> Self {
        Self {
            inner,
            barrier: Barrier::new(parties),
        }
    }
}

#[async_trait]
impl StreamStore for GatedStreamStore {
    async fn read_stream(
        &self,
        stream_id: &str,
        direction: ReadDirection,
        from: StreamPosition,
        max_count: u64,
    ) -> Result<RecordedEventStream, DomainError> {
        let events = self
            .inner
            .read_stream(stream_id, direction, from, max_count)
            .await?;
        if direction == ReadDirection::Backwards {
            self.barrier.wait().await;
        }
        Ok(events)
    }

    async fn append_to_stream(
        &self,
        stream_id: &str,
        expected: ExpectedRevision,
        events: Vec<EventData>,
    ) -> Result<AppendResult, DomainError> {
        self.inner
            .append_to_stream(stream_id, expected, events)
            .await
    }
}
