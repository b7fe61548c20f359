//! Cairn Event Store — persistence on top of an append-only stream store.
//!
//! [`aggregate_store::AggregateStore`] hydrates and saves aggregates with
//! optimistic concurrency; [`event_store::EventStore`] moves raw event
//! batches. Both talk to a [`cairn_core::stream::StreamStore`], of which this
//! crate ships an in-memory and a PostgreSQL implementation.

pub mod aggregate_store;
pub mod config;
pub mod event_store;
pub mod in_memory_stream_store;
pub mod pg_stream_store;
pub mod schema;
mod stream_access;

pub use aggregate_store::AggregateStore;
pub use config::{ConfigError, StoreConfig};
pub use event_store::EventStore;
pub use in_memory_stream_store::InMemoryStreamStore;
pub use pg_stream_store::PgStreamStore;
