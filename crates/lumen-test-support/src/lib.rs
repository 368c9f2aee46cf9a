//! Shared test doubles for the Lumen engine.

mod clock;
mod repository;
mod rng;

pub use clock::{FixedClock, ManualClock};
pub use repository::{
    EmptyEventRepository, FailingEventRepository, InMemoryEventRepository,
    RecordingEventRepository,
};
pub use rng::{MockRng, SequenceRng};
