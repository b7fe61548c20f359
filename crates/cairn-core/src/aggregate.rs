//! Aggregate root abstraction.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::event::Event;

/// Tag naming a kind of aggregate, e.g. `"product"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregateType(String);

impl AggregateType {
    /// Creates a new aggregate type tag.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AggregateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// State every aggregate carries regardless of its domain: identity, version
/// and the events raised since the last successful save.
#[derive(Debug, Clone)]
pub struct AggregateBase {
    id: String,
    aggregate_type: AggregateType,
    version: u64,
    uncommitted_events: Vec<Event>,
}

impl AggregateBase {
    /// Creates an empty base at version 0.
    #[must_use]
    pub fn new(id: impl Into<String>, aggregate_type: AggregateType) -> Self {
        Self {
            id: id.into(),
            aggregate_type,
            version: 0,
            uncommitted_events: Vec::new(),
        }
    }
}

/// Trait for aggregate roots that reconstitute from event history.
///
/// Implementors embed an [`AggregateBase`] and supply [`Aggregate::when`], the
/// pure state transition for one event. Everything else is provided.
pub trait Aggregate: Send + Sync {
    /// Shared aggregate state.
    fn base(&self) -> &AggregateBase;

    /// Shared aggregate state, mutably.
    fn base_mut(&mut self) -> &mut AggregateBase;

    /// Applies one event to the domain state.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be applied in the current state
    /// or its payload does not decode.
    fn when(&mut self, event: &Event) -> Result<(), DomainError>;

    /// Returns the aggregate identifier, which is also its stream id.
    fn aggregate_id(&self) -> &str {
        &self.base().id
    }

    /// Returns the aggregate type tag.
    fn aggregate_type(&self) -> &AggregateType {
        &self.base().aggregate_type
    }

    /// Returns the current version (number of events applied).
    fn version(&self) -> u64 {
        self.base().version
    }

    /// Returns the version last read from or written to the stream store.
    fn persisted_version(&self) -> u64 {
        let base = self.base();
        base.version
            .saturating_sub(base.uncommitted_events.len() as u64)
    }

    /// Returns uncommitted events produced by command handling.
    fn uncommitted_events(&self) -> &[Event] {
        &self.base().uncommitted_events
    }

    /// Clears uncommitted events after persistence.
    fn clear_uncommitted_events(&mut self) {
        self.base_mut().uncommitted_events.clear();
    }

    /// Replays one stored event. Used during hydration; never records the
    /// event as uncommitted.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the event belongs to another
    /// aggregate or is not the next version, or whatever `when` returns.
    fn raise_event(&mut self, event: &Event) -> Result<(), DomainError> {
        if event.aggregate_id != self.aggregate_id() {
            return Err(DomainError::Validation(format!(
                "event {} belongs to aggregate {}, not {}",
                event.event_id,
                event.aggregate_id,
                self.aggregate_id()
            )));
        }
        let expected = self.version() + 1;
        if event.version != expected {
            return Err(DomainError::Validation(format!(
                "event {} out of order for aggregate {}: expected version {expected}, got {}",
                event.event_id,
                self.aggregate_id(),
                event.version
            )));
        }

        self.when(event)?;
        self.base_mut().version = event.version;
        Ok(())
    }

    /// Records a new event produced by domain logic: stamps it with the next
    /// version, applies it and queues it for the next save.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the event belongs to another
    /// aggregate, or whatever `when` returns. On error nothing is recorded.
    fn apply(&mut self, mut event: Event) -> Result<(), DomainError> {
        if event.aggregate_id != self.aggregate_id() {
            return Err(DomainError::Validation(format!(
                "event {} belongs to aggregate {}, not {}",
                event.event_id,
                event.aggregate_id,
                self.aggregate_id()
            )));
        }
        event.aggregate_type = self.aggregate_type().clone();
        event.version = self.version() + 1;

        self.when(&event)?;

        let base = self.base_mut();
        base.version = event.version;
        base.uncommitted_events.push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;

    #[derive(Debug)]
    struct Counter {
        base: AggregateBase,
        total: i64,
    }

    impl Counter {
        fn new(id: &str) -> Self {
            Self {
                base: AggregateBase::new(id, AggregateType::new("counter")),
                total: 0,
            }
        }

        fn incremented(&self, by: i64) -> Event {
            Event::for_aggregate(self, "Incremented", &SystemClock)
                .with_json_data(&by)
                .unwrap()
        }
    }

    impl Aggregate for Counter {
        fn base(&self) -> &AggregateBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut AggregateBase {
            &mut self.base
        }

        fn when(&mut self, event: &Event) -> Result<(), DomainError> {
            match event.event_type.as_str() {
                "Incremented" => {
                    self.total += event.json_data::<i64>()?;
                    Ok(())
                }
                other => Err(DomainError::Validation(format!("unknown event type {other}"))),
            }
        }
    }

    #[test]
    fn test_apply_advances_version_and_records_uncommitted() {
        // Arrange
        let mut counter = Counter::new("c-1");

        // Act
        counter.apply(counter.incremented(2)).unwrap();
        counter.apply(counter.incremented(3)).unwrap();

        // Assert
        assert_eq!(counter.total, 5);
        assert_eq!(counter.version(), 2);
        assert_eq!(counter.persisted_version(), 0);
        let versions: Vec<u64> = counter.uncommitted_events().iter().map(|e| e.version).collect();
        assert_eq!(versions, vec![1, 2]);
        assert!(
            counter
                .uncommitted_events()
                .iter()
                .all(|e| e.aggregate_type.as_str() == "counter")
        );
    }

    #[test]
    fn test_apply_rejects_event_for_other_aggregate() {
        let mut counter = Counter::new("c-1");
        let foreign = Counter::new("c-2").incremented(1);

        let result = counter.apply(foreign);

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert_eq!(counter.version(), 0);
        assert!(counter.uncommitted_events().is_empty());
    }

    #[test]
    fn test_failed_when_records_nothing() {
        let mut counter = Counter::new("c-1");
        let bogus = Event::for_aggregate(&counter, "Decremented", &SystemClock);

        let result = counter.apply(bogus);

        assert!(result.is_err());
        assert_eq!(counter.version(), 0);
        assert!(counter.uncommitted_events().is_empty());
    }

    #[test]
    fn test_raise_event_replays_without_recording_uncommitted() {
        // Arrange
        let mut source = Counter::new("c-1");
        source.apply(source.incremented(4)).unwrap();
        source.apply(source.incremented(6)).unwrap();
        let history = source.uncommitted_events().to_vec();
        let mut replica = Counter::new("c-1");

        // Act
        for event in &history {
            replica.raise_event(event).unwrap();
        }

        // Assert
        assert_eq!(replica.total, 10);
        assert_eq!(replica.version(), 2);
        assert_eq!(replica.persisted_version(), 2);
        assert!(replica.uncommitted_events().is_empty());
    }

    #[test]
    fn test_raise_event_rejects_version_gap() {
        let mut source = Counter::new("c-1");
        source.apply(source.incremented(1)).unwrap();
        source.apply(source.incremented(1)).unwrap();
        let second = source.uncommitted_events()[1].clone();
        let mut replica = Counter::new("c-1");

        let result = replica.raise_event(&second);

        match result {
            Err(DomainError::Validation(msg)) => assert!(msg.contains("expected version 1")),
            other => panic!("expected Validation, got {other:?}"),
        }
        assert_eq!(replica.version(), 0);
    }

    #[test]
    fn test_clear_uncommitted_keeps_version() {
        let mut counter = Counter::new("c-1");
        counter.apply(counter.incremented(1)).unwrap();

        counter.clear_uncommitted_events();

        assert!(counter.uncommitted_events().is_empty());
        assert_eq!(counter.version(), 1);
        assert_eq!(counter.persisted_version(), 1);
    }
}
