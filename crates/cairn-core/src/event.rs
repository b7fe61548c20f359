//! Event envelope.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{Aggregate, AggregateType};
use crate::clock::Clock;
use crate::error::DomainError;
use crate::stream::{EventData, JSON_CONTENT_TYPE, RecordedEvent};

/// Typed view of the side-channel data commonly carried in
/// [`Event::metadata`]. The stores never interpret it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Correlation ID for tracing a command through its effects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
    /// Causation ID linking this event to the event/command that caused it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causation_id: Option<Uuid>,
    /// The actor that issued the command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl EventMetadata {
    /// Metadata for an event caused directly by a correlated command.
    #[must_use]
    pub fn correlated(correlation_id: Uuid) -> Self {
        Self {
            correlation_id: Some(correlation_id),
            causation_id: Some(correlation_id),
            user_id: None,
        }
    }
}

/// An immutable domain fact belonging to one aggregate stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Type name used to route decoding of `data`.
    pub event_type: String,
    /// Serialized payload, opaque to the stores.
    pub data: Vec<u8>,
    /// Serialized metadata, opaque to the stores.
    pub metadata: Vec<u8>,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// The aggregate (and stream) this event belongs to.
    pub aggregate_id: String,
    /// The kind of aggregate this event belongs to.
    pub aggregate_type: AggregateType,
    /// Aggregate version after this event is applied. One-based.
    pub version: u64,
}

impl Event {
    /// Creates an unversioned event with a fresh id and timestamp.
    #[must_use]
    pub fn new(
        aggregate_id: impl Into<String>,
        aggregate_type: AggregateType,
        event_type: impl Into<String>,
        clock: &dyn Clock,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type: event_type.into(),
            data: Vec::new(),
            metadata: Vec::new(),
            timestamp: clock.now(),
            aggregate_id: aggregate_id.into(),
            aggregate_type,
            version: 0,
        }
    }

    /// Creates an unversioned event addressed to `aggregate`.
    #[must_use]
    pub fn for_aggregate<A: Aggregate + ?Sized>(
        aggregate: &A,
        event_type: impl Into<String>,
        clock: &dyn Clock,
    ) -> Self {
        Self::new(
            aggregate.aggregate_id(),
            aggregate.aggregate_type().clone(),
            event_type,
            clock,
        )
    }

    /// Rebuilds an event from its recorded form. The stream position becomes
    /// the version; the aggregate type is unknown to the store and left empty.
    #[must_use]
    pub fn from_recorded(recorded: RecordedEvent) -> Self {
        Self {
            event_id: recorded.event_id,
            event_type: recorded.event_type,
            data: recorded.data,
            metadata: recorded.metadata,
            timestamp: recorded.created_at,
            aggregate_id: recorded.stream_id,
            aggregate_type: AggregateType::default(),
            version: recorded.position,
        }
    }

    /// Translates the event into the stream store's append representation.
    #[must_use]
    pub fn to_event_data(&self) -> EventData {
        EventData {
            event_id: self.event_id,
            event_type: self.event_type.clone(),
            content_type: JSON_CONTENT_TYPE.to_owned(),
            data: self.data.clone(),
            metadata: self.metadata.clone(),
        }
    }

    /// Serializes `data` as the JSON payload.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the value cannot be serialized.
    pub fn with_json_data<T: Serialize>(mut self, data: &T) -> Result<Self, DomainError> {
        self.data = serde_json::to_vec(data).map_err(|e| {
            DomainError::Validation(format!("{} payload serialization failed: {e}", self.event_type))
        })?;
        Ok(self)
    }

    /// Decodes the JSON payload.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the payload does not decode.
    pub fn json_data<T: DeserializeOwned>(&self) -> Result<T, DomainError> {
        serde_json::from_slice(&self.data).map_err(|e| {
            DomainError::Infrastructure(format!(
                "{} payload deserialization failed: {e}",
                self.event_type
            ))
        })
    }

    /// Serializes `metadata` as the JSON side channel.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the value cannot be serialized.
    pub fn with_json_metadata<T: Serialize>(mut self, metadata: &T) -> Result<Self, DomainError> {
        self.metadata = serde_json::to_vec(metadata).map_err(|e| {
            DomainError::Validation(format!("{} metadata serialization failed: {e}", self.event_type))
        })?;
        Ok(self)
    }

    /// Decodes the JSON side channel.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the metadata does not decode.
    pub fn json_metadata<T: DeserializeOwned>(&self) -> Result<T, DomainError> {
        serde_json::from_slice(&self.metadata).map_err(|e| {
            DomainError::Infrastructure(format!(
                "{} metadata deserialization failed: {e}",
                self.event_type
            ))
        })
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Event(aggregate_id: {}, version: {}, event_type: {}, aggregate_type: {}, timestamp: {})",
            self.aggregate_id,
            self.version,
            self.event_type,
            self.aggregate_type,
            self.timestamp.to_rfc3339(),
        )
    }
}
