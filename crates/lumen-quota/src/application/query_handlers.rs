//! Query handlers for the Storage & Quota context.
//!
//! Readers never take the event lock; each query works from a single
//! snapshot of the event stream.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use lumen_core::error::DomainError;
use lumen_core::repository::EventRepository;
use serde::Serialize;
use tracing::error;
use uuid::Uuid;

use crate::application::command_handlers::load_account;
use crate::domain::objects::{MediaCategory, StoredObject};
use crate::domain::policy::overage_bytes;
use crate::domain::units::bytes_to_gb;

/// Read-only view of an event's storage quota.
#[derive(Debug, Clone, Serialize)]
pub struct QuotaView {
    /// The event identifier.
    pub event_id: Uuid,
    /// Current plan.
    pub plan_id: String,
    /// Bytes used.
    pub used_bytes: u64,
    /// GB used.
    pub used_gb: f64,
    /// Bytes used by photos.
    pub image_bytes: u64,
    /// Bytes used by videos.
    pub video_bytes: u64,
    /// Effective capacity (plan plus purchases) in bytes.
    pub capacity_bytes: u64,
    /// Effective capacity in GB.
    pub capacity_gb: f64,
    /// Capacity bought through purchase orders, in bytes.
    pub purchased_bytes: u64,
    /// Usage beyond capacity, in GB.
    pub overage_gb: f64,
    /// Smallest whole GB purchase that clears the overage.
    pub minimum_purchase_gb: u64,
    /// Number of recorded objects.
    pub object_count: usize,
    /// Locked objects, oldest first.
    pub locked_object_ids: Vec<Uuid>,
    /// When the plan period ends.
    pub active_until: Option<DateTime<Utc>>,
    /// Current version (event count).
    pub version: i64,
}

/// Read-only view of one object and its lock state.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectView {
    /// The object identifier.
    pub object_id: Uuid,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Mime category.
    pub category: MediaCategory,
    /// Upload time.
    pub uploaded_at: DateTime<Utc>,
    /// Whether the object is read-locked.
    pub locked: bool,
}

/// Both usage figures of an account, as compared by [`verify_usage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageCheck {
    /// The running total.
    pub incremental_bytes: u64,
    /// The sum over every object.
    pub recomputed_bytes: u64,
}

/// Retrieves the quota view of an event.
///
/// # Errors
///
/// Returns `DomainError::EventNotFound` if the event has no account.
/// Returns `DomainError::Infrastructure` if event deserialization fails.
pub async fn get_quota(event_id: Uuid, repo: &dyn EventRepository) -> Result<QuotaView, DomainError> {
    let account = load_account(event_id, repo).await?;
    let capacity_bytes = account.capacity_bytes();
    let locked_object_ids = account
        .classify()
        .into_iter()
        .filter(|c| c.locked)
        .map(|c| c.object_id)
        .collect();

    Ok(QuotaView {
        event_id,
        plan_id: account.plan_id().unwrap_or_default().to_owned(),
        used_bytes: account.used_bytes(),
        used_gb: bytes_to_gb(account.used_bytes()),
        image_bytes: account.category_bytes(MediaCategory::Image),
        video_bytes: account.category_bytes(MediaCategory::Video),
        capacity_bytes,
        capacity_gb: bytes_to_gb(capacity_bytes),
        purchased_bytes: account.expanded_bytes(),
        overage_gb: bytes_to_gb(overage_bytes(account.used_bytes(), capacity_bytes)),
        minimum_purchase_gb: account.minimum_purchase_gb(),
        object_count: account.objects().len(),
        locked_object_ids,
        active_until: account.active_until(),
        version: account.version,
    })
}

/// Current usage of an event in GB.
///
/// # Errors
///
/// Returns `DomainError::EventNotFound` if the event has no account.
pub async fn used_gb(event_id: Uuid, repo: &dyn EventRepository) -> Result<f64, DomainError> {
    let account = load_account(event_id, repo).await?;
    Ok(bytes_to_gb(account.used_bytes()))
}

/// Lists every object of an event in upload order with its lock state.
///
/// # Errors
///
/// Returns `DomainError::EventNotFound` if the event has no account.
pub async fn list_objects(
    event_id: Uuid,
    repo: &dyn EventRepository,
) -> Result<Vec<ObjectView>, DomainError> {
    let account = load_account(event_id, repo).await?;
    let objects: HashMap<Uuid, &StoredObject> =
        account.objects().iter().map(|o| (o.object_id, o)).collect();

    Ok(account
        .classify()
        .into_iter()
        .filter_map(|c| {
            objects.get(&c.object_id).map(|o| ObjectView {
                object_id: o.object_id,
                size_bytes: o.size_bytes,
                category: o.category,
                uploaded_at: o.uploaded_at,
                locked: c.locked,
            })
        })
        .collect())
}

/// Recomputes usage from the object list and compares it with the running
/// total.
///
/// # Errors
///
/// Returns `DomainError::EventNotFound` if the event has no account and
/// `DomainError::Infrastructure` if the two figures disagree.
pub async fn verify_usage(
    event_id: Uuid,
    repo: &dyn EventRepository,
) -> Result<UsageCheck, DomainError> {
    let account = load_account(event_id, repo).await?;
    let check = UsageCheck {
        incremental_bytes: account.used_bytes(),
        recomputed_bytes: account.recomputed_used_bytes(),
    };
    if check.incremental_bytes != check.recomputed_bytes {
        error!(
            %event_id,
            incremental = check.incremental_bytes,
            recomputed = check.recomputed_bytes,
            "storage usage drift detected"
        );
        return Err(DomainError::Infrastructure(format!(
            "usage drift on event {event_id}: {} != {} bytes",
            check.incremental_bytes, check.recomputed_bytes
        )));
    }
    Ok(check)
}
