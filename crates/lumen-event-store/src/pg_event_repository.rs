//! `PostgreSQL` implementation of the `EventRepository` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, warn};
use uuid::Uuid;

use lumen_core::error::DomainError;
use lumen_core::repository::{EventRepository, StoredEvent};

/// PostgreSQL-backed event repository.
#[derive(Debug, Clone)]
pub struct PgEventRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct EventRow {
    event_id: Uuid,
    aggregate_id: Uuid,
    event_type: String,
    payload: serde_json::Value,
    sequence_number: i64,
    correlation_id: Uuid,
    causation_id: Uuid,
    occurred_at: DateTime<Utc>,
}

impl From<EventRow> for StoredEvent {
    fn from(row: EventRow) -> Self {
        Self {
            event_id: row.event_id,
            aggregate_id: row.aggregate_id,
            event_type: row.event_type,
            payload: row.payload,
            sequence_number: row.sequence_number,
            correlation_id: row.correlation_id,
            causation_id: row.causation_id,
            occurred_at: row.occurred_at,
        }
    }
}

fn infrastructure(context: &str, err: &sqlx::Error) -> DomainError {
    DomainError::Infrastructure(format!("{context}: {err}"))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}

impl PgEventRepository {
    /// Creates a new `PgEventRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn current_version(&self, aggregate_id: Uuid) -> Result<i64, DomainError> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(MAX(sequence_number), 0) FROM domain_events WHERE aggregate_id = $1",
        )
        .bind(aggregate_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| infrastructure("failed to read stream version", &e))
    }
}

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        let rows = sqlx::query_as::<_, EventRow>(
            "SELECT event_id, aggregate_id, event_type, payload, sequence_number, \
                    correlation_id, causation_id, occurred_at \
             FROM domain_events WHERE aggregate_id = $1 ORDER BY sequence_number ASC",
        )
        .bind(aggregate_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| infrastructure("failed to load events", &e))?;

        Ok(rows.into_iter().map(StoredEvent::from).collect())
    }

    async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        if events.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| infrastructure("failed to begin transaction", &e))?;

        let actual = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(MAX(sequence_number), 0) FROM domain_events WHERE aggregate_id = $1",
        )
        .bind(aggregate_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| infrastructure("failed to read stream version", &e))?;
        if actual != expected_version {
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual,
            });
        }

        for event in events {
            let inserted = sqlx::query(
                "INSERT INTO domain_events \
                 (event_id, aggregate_id, event_type, payload, sequence_number, \
                  correlation_id, causation_id, occurred_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(event.event_id)
            .bind(event.aggregate_id)
            .bind(&event.event_type)
            .bind(&event.payload)
            .bind(event.sequence_number)
            .bind(event.correlation_id)
            .bind(event.causation_id)
            .bind(event.occurred_at)
            .execute(&mut *tx)
            .await;

            if let Err(err) = inserted {
                if is_unique_violation(&err) {
                    // A concurrent writer committed the same sequence number.
                    drop(tx);
                    let actual = self.current_version(aggregate_id).await?;
                    warn!(%aggregate_id, expected_version, actual, "lost append race");
                    return Err(DomainError::ConcurrencyConflict {
                        aggregate_id,
                        expected: expected_version,
                        actual,
                    });
                }
                return Err(infrastructure("failed to append event", &err));
            }
        }

        tx.commit()
            .await
            .map_err(|e| infrastructure("failed to commit events", &e))?;
        debug!(%aggregate_id, count = events.len(), "events appended");
        Ok(())
    }

    async fn aggregate_ids_with_event_type_excluding(
        &self,
        event_type: &str,
        excluded: &[&str],
    ) -> Result<Vec<Uuid>, DomainError> {
        let excluded: Vec<String> = excluded.iter().map(|t| (*t).to_owned()).collect();
        sqlx::query_scalar::<_, Uuid>(
            r"SELECT DISTINCT e.aggregate_id
              FROM domain_events e
              WHERE e.event_type = $1
                AND NOT EXISTS (
                    SELECT 1 FROM domain_events t
                    WHERE t.event_type = ANY($2)
                      AND t.aggregate_id = e.aggregate_id
                )",
        )
        .bind(event_type)
        .bind(excluded)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| infrastructure("failed to list aggregates", &e))
    }
}
