//! Cairn — Product catalogue bounded context.
//!
//! A product is an event-sourced aggregate persisted through
//! [`cairn_event_store::AggregateStore`].

pub mod application;
pub mod domain;
