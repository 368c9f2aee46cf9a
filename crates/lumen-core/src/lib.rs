//! Lumen Core — shared domain abstractions.
//!
//! This crate defines the traits and types that every bounded context
//! (quota accounting, billing, purchase workflow) depends on. It contains no
//! infrastructure code beyond in-process serialization and retry helpers.

pub mod aggregate;
pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod lock;
pub mod repository;
pub mod retry;
pub mod rng;
