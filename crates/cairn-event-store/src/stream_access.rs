//! Stream store handle shared by the event store and the aggregate store.

use std::sync::Arc;
use std::time::Duration;

use cairn_core::context::Context;
use cairn_core::error::DomainError;
use cairn_core::stream::{ReadDirection, RecordedEvent, StreamPosition, StreamStore};
use futures::StreamExt;

use crate::config::StoreConfig;

/// A stream store plus the paging and timeout settings every operation
/// against it uses.
#[derive(Clone)]
pub(crate) struct StreamAccess {
    pub(crate) streams: Arc<dyn StreamStore>,
    page_size: u64,
    operation_timeout: Option<Duration>,
}

impl std::fmt::Debug for StreamAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamAccess")
            .field("page_size", &self.page_size)
            .field("operation_timeout", &self.operation_timeout)
            .finish_non_exhaustive()
    }
}

impl StreamAccess {
    pub(crate) fn new(streams: Arc<dyn StreamStore>, config: &StoreConfig) -> Self {
        Self {
            streams,
            page_size: config.page_size.max(1),
            operation_timeout: config.operation_timeout(),
        }
    }

    /// The caller's context, tightened by the configured operation timeout.
    pub(crate) fn scoped(&self, ctx: &Context) -> Context {
        match self.operation_timeout {
            Some(timeout) => ctx.clone().with_timeout(timeout),
            None => ctx.clone(),
        }
    }

    /// Reads `stream_id` from its first position to its end in pages,
    /// handing each recorded event to `visit` in stream order. Returns the
    /// number of events read.
    pub(crate) async fn read_forward<F>(
        &self,
        stream_id: &str,
        mut visit: F,
    ) -> Result<u64, DomainError>
    where
        F: FnMut(RecordedEvent) -> Result<(), DomainError>,
    {
        let mut next_position = 1;
        let mut total = 0;
        loop {
            let mut page = self
                .streams
                .read_stream(
                    stream_id,
                    ReadDirection::Forwards,
                    StreamPosition::At(next_position),
                    self.page_size,
                )
                .await?;

            let mut in_page = 0;
            while let Some(recorded) = page.next().await {
                let recorded = recorded?;
                next_position = recorded.position + 1;
                in_page += 1;
                visit(recorded)?;
            }
            total += in_page;

            if in_page < self.page_size {
                return Ok(total);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cairn_core::stream::{EventData, ExpectedRevision};
    use uuid::Uuid;

    use super::*;
    use crate::InMemoryStreamStore;

    #[test]
    fn test_zero_page_size_is_raised_to_one() {
        let config = StoreConfig {
            page_size: 0,
            ..StoreConfig::default()
        };

        let access = StreamAccess::new(Arc::new(InMemoryStreamStore::new()), &config);

        assert_eq!(access.page_size, 1);
    }

    #[tokio::test]
    async fn test_read_forward_visits_every_page_in_order() {
        // Arrange
        let streams = Arc::new(InMemoryStreamStore::new());
        let events = (0..5)
            .map(|_| EventData {
                event_id: Uuid::new_v4(),
                event_type: "Seeded".to_owned(),
                content_type: "application/json".to_owned(),
                data: b"{}".to_vec(),
                metadata: Vec::new(),
            })
            .collect();
        streams
            .append_to_stream("s-1", ExpectedRevision::NoStream, events)
            .await
            .unwrap();
        let config = StoreConfig {
            page_size: 2,
            ..StoreConfig::default()
        };
        let access = StreamAccess::new(streams, &config);
        let mut seen = Vec::new();

        // Act
        let total = access
            .read_forward("s-1", |recorded| {
                seen.push(recorded.position);
                Ok(())
            })
            .await
            .unwrap();

        // Assert
        assert_eq!(total, 5);
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_scoped_context_without_timeout_keeps_caller_deadline() {
        let access = StreamAccess::new(
            Arc::new(InMemoryStreamStore::new()),
            &StoreConfig::default(),
        );
        let ctx = Context::background().with_timeout(Duration::from_secs(5));

        let scoped = access.scoped(&ctx);

        assert_eq!(scoped.deadline(), ctx.deadline());
    }
}
