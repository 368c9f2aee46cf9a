//! Test repositories — `EventRepository` implementations for tests.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use lumen_core::error::DomainError;
use lumen_core::repository::{EventRepository, StoredEvent};
use uuid::Uuid;

/// An event repository that records all `append_events` calls and returns
/// the same configured history from every `load_events` call.
#[derive(Debug)]
pub struct RecordingEventRepository {
    history: Vec<StoredEvent>,
    appended: Mutex<Vec<(Uuid, i64, Vec<StoredEvent>)>>,
}

impl RecordingEventRepository {
    /// Create a repository that serves `history` for every aggregate.
    #[must_use]
    pub fn new(history: Vec<StoredEvent>) -> Self {
        Self {
            history,
            appended: Mutex::new(Vec::new()),
        }
    }

    /// Returns a snapshot of all events that were appended.
    pub fn appended_events(&self) -> Vec<(Uuid, i64, Vec<StoredEvent>)> {
        self.appended
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl EventRepository for RecordingEventRepository {
    async fn load_events(&self, _aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(self.history.clone())
    }

    async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        self.appended
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((aggregate_id, expected_version, events.to_vec()));
        Ok(())
    }

    async fn aggregate_ids_with_event_type_excluding(
        &self,
        event_type: &str,
        excluded: &[&str],
    ) -> Result<Vec<Uuid>, DomainError> {
        let mut ids: Vec<Uuid> = self
            .history
            .iter()
            .filter(|e| e.event_type == event_type)
            .map(|e| e.aggregate_id)
            .filter(|id| {
                !self
                    .history
                    .iter()
                    .any(|e| e.aggregate_id == *id && excluded.contains(&e.event_type.as_str()))
            })
            .collect();
        ids.dedup();
        Ok(ids)
    }
}

/// An event repository that always returns an empty event list and silently
/// accepts appends. Useful for "not found" scenarios and creation commands.
#[derive(Debug)]
pub struct EmptyEventRepository;

#[async_trait]
impl EventRepository for EmptyEventRepository {
    async fn load_events(&self, _aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(vec![])
    }

    async fn append_events(
        &self,
        _aggregate_id: Uuid,
        _expected_version: i64,
        _events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        Ok(())
    }

    async fn aggregate_ids_with_event_type_excluding(
        &self,
        _event_type: &str,
        _excluded: &[&str],
    ) -> Result<Vec<Uuid>, DomainError> {
        Ok(vec![])
    }
}

/// An event repository that always returns an infrastructure error. Useful
/// for testing error-handling paths.
#[derive(Debug)]
pub struct FailingEventRepository;

#[async_trait]
impl EventRepository for FailingEventRepository {
    async fn load_events(&self, _aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn append_events(
        &self,
        _aggregate_id: Uuid,
        _expected_version: i64,
        _events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn aggregate_ids_with_event_type_excluding(
        &self,
        _event_type: &str,
        _excluded: &[&str],
    ) -> Result<Vec<Uuid>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}

/// A working in-process event store with optimistic concurrency, for
/// multi-step workflow tests.
///
/// `fail_next_appends` injects transient append failures so retry paths can
/// be exercised.
#[derive(Debug, Default)]
pub struct InMemoryEventRepository {
    streams: Mutex<HashMap<Uuid, Vec<StoredEvent>>>,
    pending_failures: Mutex<u32>,
}

impl InMemoryEventRepository {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` appends fail with an infrastructure error.
    pub fn fail_next_appends(&self, count: u32) {
        *self
            .pending_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = count;
    }

    /// All events of one aggregate, in sequence order.
    pub fn stream(&self, aggregate_id: Uuid) -> Vec<StoredEvent> {
        self.streams
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&aggregate_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(self.stream(aggregate_id))
    }

    async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        {
            let mut failures = self
                .pending_failures
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if *failures > 0 {
                *failures -= 1;
                return Err(DomainError::Infrastructure("injected append failure".into()));
            }
        }

        let mut streams = self.streams.lock().unwrap_or_else(PoisonError::into_inner);
        let stream = streams.entry(aggregate_id).or_default();
        let actual = stream.last().map_or(0, |e| e.sequence_number);
        if actual != expected_version {
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual,
            });
        }
        stream.extend_from_slice(events);
        Ok(())
    }

    async fn aggregate_ids_with_event_type_excluding(
        &self,
        event_type: &str,
        excluded: &[&str],
    ) -> Result<Vec<Uuid>, DomainError> {
        let streams = self.streams.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(streams
            .iter()
            .filter(|(_, events)| {
                events.iter().any(|e| e.event_type == event_type)
                    && !events
                        .iter()
                        .any(|e| excluded.contains(&e.event_type.as_str()))
            })
            .map(|(id, _)| *id)
            .collect())
    }
}
