//! Quota policy.
//!
//! Pure functions over an account's objects and capacity. An object is
//! locked when the running total of everything uploaded up to and including
//! it (oldest first) exceeds capacity. Lock state is never stored; it is
//! recomputed whenever usage or capacity changes.

use serde::Serialize;
use uuid::Uuid;

use super::objects::StoredObject;
use super::units::whole_gb_ceil;

/// Lock decision for one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ObjectClassification {
    /// The object.
    pub object_id: Uuid,
    /// Its size in bytes.
    pub size_bytes: u64,
    /// Bytes uploaded up to and including this object.
    pub cumulative_bytes: u64,
    /// Whether the object is read-locked.
    pub locked: bool,
}

/// Bytes used beyond capacity.
#[must_use]
pub const fn overage_bytes(used_bytes: u64, capacity_bytes: u64) -> u64 {
    used_bytes.saturating_sub(capacity_bytes)
}

/// Smallest whole GB purchase that clears the overage.
#[must_use]
pub const fn minimum_purchase_gb(used_bytes: u64, capacity_bytes: u64) -> u64 {
    whole_gb_ceil(overage_bytes(used_bytes, capacity_bytes))
}

/// Classifies every object as locked or accessible, in upload order.
///
/// Ties on `uploaded_at` are broken by object id so the result is the same
/// regardless of input order. A zero capacity means no plan covers the event
/// and locks everything.
#[must_use]
pub fn classify(objects: &[StoredObject], capacity_bytes: u64) -> Vec<ObjectClassification> {
    let mut ordered: Vec<&StoredObject> = objects.iter().collect();
    ordered.sort_by_key(|o| (o.uploaded_at, o.object_id));

    let mut cumulative: u64 = 0;
    ordered
        .into_iter()
        .map(|object| {
            cumulative = cumulative.saturating_add(object.size_bytes);
            ObjectClassification {
                object_id: object.object_id,
                size_bytes: object.size_bytes,
                cumulative_bytes: cumulative,
                locked: capacity_bytes == 0 || cumulative > capacity_bytes,
            }
        })
        .collect()
}

/// Identifiers of locked objects, in upload order.
#[must_use]
pub fn locked_object_ids(objects: &[StoredObject], capacity_bytes: u64) -> Vec<Uuid> {
    classify(objects, capacity_bytes)
        .into_iter()
        .filter(|c| c.locked)
        .map(|c| c.object_id)
        .collect()
}
