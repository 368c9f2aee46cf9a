//! Application services for the Overage Purchase context.

pub mod command_handlers;
pub mod query_handlers;
pub mod sweeper;
