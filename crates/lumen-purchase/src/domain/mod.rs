//! Domain model for the Overage Purchase context.

pub mod aggregates;
pub mod commands;
pub mod events;
pub mod status;
