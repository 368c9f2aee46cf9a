//! Clock abstraction for determinism.
//!
//! Upload ordering, payment expiry and the expiry sweep all read time
//! through this trait so tests can pin or advance it.

use chrono::{DateTime, Utc};

/// Abstraction over system time for deterministic behavior.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;

    /// Whether `deadline` has been reached. A deadline is inclusive: an
    /// order expiring at 10:10 is overdue at 10:10 exactly.
    fn has_reached(&self, deadline: DateTime<Utc>) -> bool {
        self.now() >= deadline
    }
}

/// Production clock that delegates to the system clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
