//! Cairn Core — event-sourcing abstractions.
//!
//! This crate defines the event envelope, the aggregate contract, the
//! stream-store port and the error and context types shared by every other
//! crate. It contains no infrastructure code.

pub mod aggregate;
pub mod clock;
pub mod command;
pub mod context;
pub mod error;
pub mod event;
pub mod stream;
