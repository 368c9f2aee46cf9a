//! Lumen — Storage & Quota bounded context.
//!
//! Responsible for per-event storage accounting (the running byte total of
//! everything guests uploaded), the plan capacity it is measured against,
//! and the quota policy that decides which objects are locked once the
//! plan is exceeded.

pub mod application;
pub mod domain;
