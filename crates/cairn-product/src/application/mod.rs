//! Application services for the Product catalogue context.

pub mod command_handlers;
pub mod query_handlers;
