//! Shared test doubles for the Cairn event-sourcing layer.

mod clock;
mod stream_store;

pub use clock::FixedClock;
pub use stream_store::{
    FailingStreamStore, GatedStreamStore, RecordedAppend, RecordingStreamStore,
    StalledStreamStore,
};
