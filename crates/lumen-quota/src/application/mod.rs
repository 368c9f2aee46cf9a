//! Application services for the Storage & Quota context.

pub mod command_handlers;
pub mod query_handlers;
