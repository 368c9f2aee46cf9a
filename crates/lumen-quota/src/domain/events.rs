//! Domain events for the Storage & Quota context.

use chrono::{DateTime, Utc};
use lumen_core::event::{DomainEvent, EventMetadata};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::objects::MediaCategory;

/// Event type of [`AccountOpened`]; the first event of every account stream.
pub const ACCOUNT_OPENED: &str = "quota.account_opened";
/// Event type of [`ObjectRecorded`].
pub const OBJECT_RECORDED: &str = "quota.object_recorded";
/// Event type of [`PlanChanged`].
pub const PLAN_CHANGED: &str = "quota.plan_changed";
/// Event type of [`CapacityExpanded`].
pub const CAPACITY_EXPANDED: &str = "quota.capacity_expanded";

/// Emitted when a storage account is opened for an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountOpened {
    /// The event (account) identifier.
    pub event_id: Uuid,
    /// The subscribed plan.
    pub plan_id: String,
    /// Plan capacity in bytes.
    pub capacity_bytes: u64,
    /// Plan duration in days.
    pub duration_days: u32,
}

/// Emitted when the account moves to a different plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanChanged {
    /// The event (account) identifier.
    pub event_id: Uuid,
    /// The new plan.
    pub plan_id: String,
    /// New plan capacity in bytes.
    pub capacity_bytes: u64,
    /// New plan duration in days.
    pub duration_days: u32,
}

/// Emitted when an upload is accounted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectRecorded {
    /// The event (account) identifier.
    pub event_id: Uuid,
    /// The uploaded object.
    pub object_id: Uuid,
    /// Object size in bytes.
    pub size_bytes: u64,
    /// Mime category.
    pub category: MediaCategory,
    /// Upload time.
    pub uploaded_at: DateTime<Utc>,
}

/// Emitted when a paid purchase order adds capacity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityExpanded {
    /// The event (account) identifier.
    pub event_id: Uuid,
    /// The purchase order that paid for the expansion.
    pub order_id: Uuid,
    /// Bytes added to capacity.
    pub additional_bytes: u64,
}

/// Event payload variants for the Storage & Quota context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum QuotaEventKind {
    /// A storage account was opened.
    AccountOpened(AccountOpened),
    /// The account changed plan.
    PlanChanged(PlanChanged),
    /// An upload was accounted.
    ObjectRecorded(ObjectRecorded),
    /// Capacity was expanded by a purchase.
    CapacityExpanded(CapacityExpanded),
}

/// Domain event envelope for the Storage & Quota context.
#[derive(Debug, Clone)]
pub struct QuotaEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: QuotaEventKind,
}

impl DomainEvent for QuotaEvent {
    fn event_type(&self) -> &'static str {
        match &self.kind {
            QuotaEventKind::AccountOpened(_) => ACCOUNT_OPENED,
            QuotaEventKind::PlanChanged(_) => PLAN_CHANGED,
            QuotaEventKind::ObjectRecorded(_) => OBJECT_RECORDED,
            QuotaEventKind::CapacityExpanded(_) => CAPACITY_EXPANDED,
        }
    }

    fn to_payload(&self) -> serde_json::Value {
        // Serialization of derived Serialize types to Value is infallible.
        serde_json::to_value(&self.kind).expect("QuotaEventKind serialization is infallible")
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}
