//! Commands for the Storage & Quota context.

use chrono::{DateTime, Utc};
use lumen_core::command::Command;
use uuid::Uuid;

use super::objects::MediaCategory;

/// Command to open a storage account for an event.
#[derive(Debug, Clone)]
pub struct OpenAccount {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The event to open an account for.
    pub event_id: Uuid,
    /// The plan to subscribe to.
    pub plan_id: String,
}

impl Command for OpenAccount {
    fn command_type(&self) -> &'static str {
        "quota.open_account"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn aggregate_id(&self) -> Uuid {
        self.event_id
    }
}

/// Command to move an event to another plan.
#[derive(Debug, Clone)]
pub struct ChangePlan {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The event whose plan changes.
    pub event_id: Uuid,
    /// The new plan.
    pub plan_id: String,
}

impl Command for ChangePlan {
    fn command_type(&self) -> &'static str {
        "quota.change_plan"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn aggregate_id(&self) -> Uuid {
        self.event_id
    }
}

/// Command to account an uploaded object.
#[derive(Debug, Clone)]
pub struct RecordObject {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The event the object was uploaded to.
    pub event_id: Uuid,
    /// The uploaded object.
    pub object_id: Uuid,
    /// Object size in bytes.
    pub size_bytes: u64,
    /// Mime category.
    pub category: MediaCategory,
    /// Upload time; the clock's current time when absent.
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl Command for RecordObject {
    fn command_type(&self) -> &'static str {
        "quota.record_object"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn aggregate_id(&self) -> Uuid {
        self.event_id
    }
}

/// Command to add purchased capacity to an event.
#[derive(Debug, Clone)]
pub struct ExpandCapacity {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The event to expand.
    pub event_id: Uuid,
    /// The paid purchase order.
    pub order_id: Uuid,
    /// Bytes to add.
    pub additional_bytes: u64,
}

impl Command for ExpandCapacity {
    fn command_type(&self) -> &'static str {
        "quota.expand_capacity"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn aggregate_id(&self) -> Uuid {
        self.event_id
    }
}
