//! Domain model for the Storage & Quota context.

pub mod aggregates;
pub mod commands;
pub mod events;
pub mod objects;
pub mod plans;
pub mod policy;
pub mod units;
