//! Route modules organized by bounded context.

pub mod events;
pub mod health;
pub mod orders;
pub mod webhooks;
