//! Command handlers for the Storage & Quota context.
//!
//! Every handler serializes on the event's lock for its whole
//! load → decide → append cycle, so concurrent uploads to one event can
//! never lose an increment.

use lumen_core::aggregate::AggregateRoot;
use lumen_core::clock::Clock;
use lumen_core::error::DomainError;
use lumen_core::event::{EventMetadata, decode_payload, stream_opened_by};
use lumen_core::lock::KeyedLocks;
use lumen_core::repository::{EventRepository, StoredEvent};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::aggregates::StorageAccount;
use crate::domain::commands::{ChangePlan, ExpandCapacity, OpenAccount, RecordObject};
use crate::domain::events::{ACCOUNT_OPENED, QuotaEvent, QuotaEventKind};
use crate::domain::objects::StoredObject;
use crate::domain::plans::{PlanCatalog, lookup_plan};
use crate::domain::policy;
use crate::domain::units::bytes_to_gb;

/// Result of accounting one upload.
#[derive(Debug, Clone, Serialize)]
pub struct RecordedUpload {
    /// The recorded object.
    pub object_id: Uuid,
    /// Event usage after the upload, in bytes.
    pub used_bytes: u64,
    /// Event usage after the upload, in GB.
    pub used_gb: f64,
    /// Effective capacity in bytes.
    pub capacity_bytes: u64,
    /// Whether the new object landed past capacity.
    pub locked: bool,
    /// Events persisted by the command.
    #[serde(skip)]
    pub stored_events: Vec<StoredEvent>,
}

/// Result of applying purchased capacity.
#[derive(Debug, Clone)]
pub struct CapacityExpansion {
    /// `false` when the order had already been applied.
    pub applied: bool,
    /// Effective capacity after the command, in bytes.
    pub capacity_bytes: u64,
    /// Objects that were locked before the expansion and are not any more.
    pub unlocked_object_ids: Vec<Uuid>,
    /// Events persisted by the command.
    pub stored_events: Vec<StoredEvent>,
}

/// Reconstitutes a `StorageAccount` from stored events.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if event deserialization fails.
pub(crate) fn reconstitute(
    event_id: Uuid,
    existing_events: &[StoredEvent],
) -> Result<StorageAccount, DomainError> {
    let mut account = StorageAccount::new(event_id);
    for stored in existing_events {
        let kind: QuotaEventKind = decode_payload(stored)?;
        account.apply(&QuotaEvent {
            metadata: EventMetadata::from_stored(stored),
            kind,
        });
    }
    Ok(account)
}

/// Loads an opened account.
///
/// # Errors
///
/// Returns `DomainError::EventNotFound` if the event has no account, which
/// includes ids whose stream belongs to another aggregate.
pub async fn load_account(
    event_id: Uuid,
    repo: &dyn EventRepository,
) -> Result<StorageAccount, DomainError> {
    let existing_events = repo.load_events(event_id).await?;
    if !stream_opened_by(&existing_events, ACCOUNT_OPENED) {
        return Err(DomainError::EventNotFound(event_id));
    }
    reconstitute(event_id, &existing_events)
}

async fn persist(
    account: &StorageAccount,
    repo: &dyn EventRepository,
) -> Result<Vec<StoredEvent>, DomainError> {
    let stored_events = account.pending_stored_events();
    if !stored_events.is_empty() {
        repo.append_events(account.id, account.version(), &stored_events)
            .await?;
    }
    Ok(stored_events)
}

/// Handles the `OpenAccount` command.
///
/// # Errors
///
/// Returns `DomainError::PlanNotFound` for an unknown plan,
/// `DomainError::EventNotFound` if the id already holds another aggregate's
/// stream and `DomainError::Validation` if the event already has an account.
pub async fn handle_open_account(
    command: &OpenAccount,
    catalog: &dyn PlanCatalog,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    locks: &KeyedLocks,
) -> Result<Vec<StoredEvent>, DomainError> {
    let plan = lookup_plan(catalog, &command.plan_id)?;
    let _guard = locks.acquire(command.event_id).await;

    let existing_events = repo.load_events(command.event_id).await?;
    if !existing_events.is_empty() && !stream_opened_by(&existing_events, ACCOUNT_OPENED) {
        return Err(DomainError::EventNotFound(command.event_id));
    }
    let mut account = reconstitute(command.event_id, &existing_events)?;
    account.open(&plan, command.correlation_id, clock)?;

    let stored_events = persist(&account, repo).await?;
    info!(
        event_id = %command.event_id,
        plan_id = %plan.id,
        capacity_gb = plan.capacity_gb,
        "storage account opened"
    );
    Ok(stored_events)
}

/// Handles the `ChangePlan` command.
///
/// # Errors
///
/// Returns `DomainError::EventNotFound`, `DomainError::PlanNotFound`, or
/// `DomainError::Validation` when the event is already on the plan.
pub async fn handle_change_plan(
    command: &ChangePlan,
    catalog: &dyn PlanCatalog,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    locks: &KeyedLocks,
) -> Result<Vec<StoredEvent>, DomainError> {
    let plan = lookup_plan(catalog, &command.plan_id)?;
    let _guard = locks.acquire(command.event_id).await;

    let mut account = load_account(command.event_id, repo).await?;
    account.change_plan(&plan, command.correlation_id, clock)?;

    let stored_events = persist(&account, repo).await?;
    info!(event_id = %command.event_id, plan_id = %plan.id, "plan changed");
    Ok(stored_events)
}

/// Handles the `RecordObject` command and returns the updated usage.
///
/// # Errors
///
/// Returns `DomainError::EventNotFound` for an unknown event and
/// `DomainError::Validation` for an empty or repeated object.
pub async fn handle_record_object(
    command: &RecordObject,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    locks: &KeyedLocks,
) -> Result<RecordedUpload, DomainError> {
    let _guard = locks.acquire(command.event_id).await;

    let mut account = load_account(command.event_id, repo).await?;
    let object = StoredObject {
        object_id: command.object_id,
        size_bytes: command.size_bytes,
        category: command.category,
        uploaded_at: command.uploaded_at.unwrap_or_else(|| clock.now()),
    };
    let mut objects = account.objects().to_vec();
    objects.push(object.clone());

    let used_bytes = account.record_object(object, command.correlation_id, clock)?;
    let stored_events = persist(&account, repo).await?;

    let capacity_bytes = account.capacity_bytes();
    let locked = policy::locked_object_ids(&objects, capacity_bytes).contains(&command.object_id);
    if locked {
        info!(
            event_id = %command.event_id,
            object_id = %command.object_id,
            used_bytes,
            capacity_bytes,
            "upload exceeds capacity; object locked"
        );
    } else {
        debug!(event_id = %command.event_id, object_id = %command.object_id, used_bytes, "upload recorded");
    }

    Ok(RecordedUpload {
        object_id: command.object_id,
        used_bytes,
        used_gb: bytes_to_gb(used_bytes),
        capacity_bytes,
        locked,
        stored_events,
    })
}

/// Handles the `ExpandCapacity` command. Applying the same order twice is
/// a no-op that still reports success.
///
/// # Errors
///
/// Returns `DomainError::EventNotFound` for an unknown event and
/// `DomainError::Validation` for an empty expansion.
pub async fn handle_expand_capacity(
    command: &ExpandCapacity,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    locks: &KeyedLocks,
) -> Result<CapacityExpansion, DomainError> {
    let _guard = locks.acquire(command.event_id).await;

    let mut account = load_account(command.event_id, repo).await?;
    let locked_before = policy::locked_object_ids(account.objects(), account.capacity_bytes());

    let applied = account.expand_capacity(
        command.order_id,
        command.additional_bytes,
        command.correlation_id,
        clock,
    )?;
    if !applied {
        debug!(event_id = %command.event_id, order_id = %command.order_id, "order already applied");
        return Ok(CapacityExpansion {
            applied: false,
            capacity_bytes: account.capacity_bytes(),
            unlocked_object_ids: Vec::new(),
            stored_events: Vec::new(),
        });
    }

    let stored_events = persist(&account, repo).await?;
    let capacity_bytes = account
        .capacity_bytes()
        .saturating_add(command.additional_bytes);
    let locked_after = policy::locked_object_ids(account.objects(), capacity_bytes);
    let unlocked_object_ids: Vec<Uuid> = locked_before
        .into_iter()
        .filter(|id| !locked_after.contains(id))
        .collect();

    info!(
        event_id = %command.event_id,
        order_id = %command.order_id,
        additional_bytes = command.additional_bytes,
        capacity_bytes,
        unlocked = unlocked_object_ids.len(),
        "capacity expanded"
    );
    Ok(CapacityExpansion {
        applied: true,
        capacity_bytes,
        unlocked_object_ids,
        stored_events,
    })
}
