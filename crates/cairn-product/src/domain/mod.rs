//! Domain model for the Product catalogue context.

pub mod aggregates;
pub mod commands;
pub mod events;
