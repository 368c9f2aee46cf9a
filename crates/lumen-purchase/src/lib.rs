//! Lumen — Overage Purchase bounded context.
//!
//! Turns an event's storage overage into a priced purchase order, carries
//! the order through payment, and expands the event's capacity once paid.

pub mod application;
pub mod domain;
pub mod gateway;
