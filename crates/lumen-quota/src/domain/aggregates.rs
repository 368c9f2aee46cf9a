//! Aggregate roots for the Storage & Quota context.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use lumen_core::aggregate::AggregateRoot;
use lumen_core::clock::Clock;
use lumen_core::error::DomainError;
use lumen_core::event::EventMetadata;
use uuid::Uuid;

use super::events::{
    ACCOUNT_OPENED, AccountOpened, CAPACITY_EXPANDED, CapacityExpanded, OBJECT_RECORDED,
    ObjectRecorded, PLAN_CHANGED, PlanChanged, QuotaEvent, QuotaEventKind,
};
use super::objects::{MediaCategory, StoredObject};
use super::plans::Plan;
use super::policy::{self, ObjectClassification};
use super::units::gb_to_bytes;

/// The aggregate root for one event's storage account.
///
/// `used_bytes` is maintained incrementally as objects are recorded and
/// always equals the sum of `objects`' sizes.
#[derive(Debug)]
pub struct StorageAccount {
    /// Aggregate identifier (the event id).
    pub id: Uuid,
    /// Current version (event count).
    pub(crate) version: i64,
    /// Subscribed plan, set once the account is opened.
    pub(crate) plan_id: Option<String>,
    /// Capacity included in the plan.
    pub(crate) plan_capacity_bytes: u64,
    /// Capacity bought through purchase orders.
    pub(crate) expanded_bytes: u64,
    /// Plan duration in days.
    pub(crate) duration_days: u32,
    /// When the account was opened.
    pub(crate) opened_at: Option<DateTime<Utc>>,
    /// Every recorded object.
    pub(crate) objects: Vec<StoredObject>,
    /// Ids of `objects`.
    pub(crate) object_ids: HashSet<Uuid>,
    /// Running total of `objects`' sizes.
    pub(crate) used_bytes: u64,
    /// Running totals per category.
    pub(crate) category_bytes: BTreeMap<MediaCategory, u64>,
    /// Purchase orders already applied.
    pub(crate) applied_orders: HashSet<Uuid>,
    /// Uncommitted events pending persistence.
    uncommitted_events: Vec<QuotaEvent>,
}

impl StorageAccount {
    /// Creates an unopened account.
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            version: 0,
            plan_id: None,
            plan_capacity_bytes: 0,
            expanded_bytes: 0,
            duration_days: 0,
            opened_at: None,
            objects: Vec::new(),
            object_ids: HashSet::new(),
            used_bytes: 0,
            category_bytes: BTreeMap::new(),
            applied_orders: HashSet::new(),
            uncommitted_events: Vec::new(),
        }
    }

    fn raise(
        &mut self,
        event_type: &str,
        kind: QuotaEventKind,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) {
        let event = QuotaEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: event_type.to_owned(),
                aggregate_id: self.id,
                sequence_number: self.next_sequence_number(),
                correlation_id,
                causation_id: correlation_id,
                occurred_at: clock.now(),
            },
            kind,
        };
        self.uncommitted_events.push(event);
    }

    /// Opens the account on `plan`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the account is already open.
    pub fn open(
        &mut self,
        plan: &Plan,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.is_open() {
            return Err(DomainError::Validation(format!(
                "storage account for event {} already exists",
                self.id
            )));
        }
        let kind = QuotaEventKind::AccountOpened(AccountOpened {
            event_id: self.id,
            plan_id: plan.id.clone(),
            capacity_bytes: gb_to_bytes(plan.capacity_gb),
            duration_days: plan.duration_days,
        });
        self.raise(ACCOUNT_OPENED, kind, correlation_id, clock);
        Ok(())
    }

    /// Moves the account to `plan`. Purchased capacity is kept.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::EventNotFound` if the account is not open and
    /// `DomainError::Validation` if it is already on `plan`.
    pub fn change_plan(
        &mut self,
        plan: &Plan,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_open()?;
        if self.plan_id.as_deref() == Some(plan.id.as_str()) {
            return Err(DomainError::Validation(format!(
                "event {} is already on plan {}",
                self.id, plan.id
            )));
        }
        let kind = QuotaEventKind::PlanChanged(PlanChanged {
            event_id: self.id,
            plan_id: plan.id.clone(),
            capacity_bytes: gb_to_bytes(plan.capacity_gb),
            duration_days: plan.duration_days,
        });
        self.raise(PLAN_CHANGED, kind, correlation_id, clock);
        Ok(())
    }

    /// Accounts an upload and returns the resulting usage in bytes.
    ///
    /// Recording never fails because of quota; objects past capacity are
    /// simply locked by the policy.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::EventNotFound` if the account is not open and
    /// `DomainError::Validation` for an empty object, a repeated object id,
    /// or a usage total that would overflow.
    pub fn record_object(
        &mut self,
        object: StoredObject,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<u64, DomainError> {
        self.ensure_open()?;
        if object.size_bytes == 0 {
            return Err(DomainError::Validation(format!(
                "object {} has no content",
                object.object_id
            )));
        }
        if self.object_ids.contains(&object.object_id) {
            return Err(DomainError::Validation(format!(
                "object {} was already recorded",
                object.object_id
            )));
        }
        let used = self
            .used_bytes
            .checked_add(object.size_bytes)
            .ok_or_else(|| DomainError::Validation("storage usage overflow".to_owned()))?;

        let kind = QuotaEventKind::ObjectRecorded(ObjectRecorded {
            event_id: self.id,
            object_id: object.object_id,
            size_bytes: object.size_bytes,
            category: object.category,
            uploaded_at: object.uploaded_at,
        });
        self.raise(OBJECT_RECORDED, kind, correlation_id, clock);
        Ok(used)
    }

    /// Adds purchased capacity. Returns `false` without raising an event if
    /// `order_id` was already applied.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::EventNotFound` if the account is not open and
    /// `DomainError::Validation` for a zero or overflowing expansion.
    pub fn expand_capacity(
        &mut self,
        order_id: Uuid,
        additional_bytes: u64,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<bool, DomainError> {
        self.ensure_open()?;
        if self.applied_orders.contains(&order_id) {
            return Ok(false);
        }
        if additional_bytes == 0 {
            return Err(DomainError::Validation(
                "capacity expansion must be positive".to_owned(),
            ));
        }
        if self.capacity_bytes().checked_add(additional_bytes).is_none() {
            return Err(DomainError::Validation("capacity overflow".to_owned()));
        }
        let kind = QuotaEventKind::CapacityExpanded(CapacityExpanded {
            event_id: self.id,
            order_id,
            additional_bytes,
        });
        self.raise(CAPACITY_EXPANDED, kind, correlation_id, clock);
        Ok(true)
    }

    fn ensure_open(&self) -> Result<(), DomainError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(DomainError::EventNotFound(self.id))
        }
    }

    /// Whether the account has been opened.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.plan_id.is_some()
    }

    /// Current plan id.
    #[must_use]
    pub fn plan_id(&self) -> Option<&str> {
        self.plan_id.as_deref()
    }

    /// Bytes used, from the running total.
    #[must_use]
    pub fn used_bytes(&self) -> u64 {
        self.used_bytes
    }

    /// Bytes used, summed afresh from the object list.
    #[must_use]
    pub fn recomputed_used_bytes(&self) -> u64 {
        self.objects
            .iter()
            .fold(0_u64, |acc, o| acc.saturating_add(o.size_bytes))
    }

    /// Bytes used by objects of `category`.
    #[must_use]
    pub fn category_bytes(&self, category: MediaCategory) -> u64 {
        self.category_bytes.get(&category).copied().unwrap_or(0)
    }

    /// Effective capacity: plan capacity plus purchased capacity.
    #[must_use]
    pub fn capacity_bytes(&self) -> u64 {
        self.plan_capacity_bytes.saturating_add(self.expanded_bytes)
    }

    /// Capacity bought through purchase orders.
    #[must_use]
    pub fn expanded_bytes(&self) -> u64 {
        self.expanded_bytes
    }

    /// Every recorded object, in recording order.
    #[must_use]
    pub fn objects(&self) -> &[StoredObject] {
        &self.objects
    }

    /// Whether `order_id` has already expanded this account.
    #[must_use]
    pub fn has_applied(&self, order_id: Uuid) -> bool {
        self.applied_orders.contains(&order_id)
    }

    /// Last day the event accepts uploads under its plan.
    #[must_use]
    pub fn active_until(&self) -> Option<DateTime<Utc>> {
        self.opened_at
            .map(|opened| opened + Duration::days(i64::from(self.duration_days)))
    }

    /// Lock decisions for every object against current capacity.
    #[must_use]
    pub fn classify(&self) -> Vec<ObjectClassification> {
        policy::classify(&self.objects, self.capacity_bytes())
    }

    /// Smallest whole GB purchase that clears the current overage.
    #[must_use]
    pub fn minimum_purchase_gb(&self) -> u64 {
        policy::minimum_purchase_gb(self.used_bytes, self.capacity_bytes())
    }
}

impl AggregateRoot for StorageAccount {
    type Event = QuotaEvent;

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(&mut self, event: &Self::Event) {
        match &event.kind {
            QuotaEventKind::AccountOpened(payload) => {
                self.plan_id = Some(payload.plan_id.clone());
                self.plan_capacity_bytes = payload.capacity_bytes;
                self.duration_days = payload.duration_days;
                self.opened_at = Some(event.metadata.occurred_at);
            }
            QuotaEventKind::PlanChanged(payload) => {
                self.plan_id = Some(payload.plan_id.clone());
                self.plan_capacity_bytes = payload.capacity_bytes;
                self.duration_days = payload.duration_days;
            }
            QuotaEventKind::ObjectRecorded(payload) => {
                self.used_bytes = self.used_bytes.saturating_add(payload.size_bytes);
                let per_category = self.category_bytes.entry(payload.category).or_insert(0);
                *per_category = per_category.saturating_add(payload.size_bytes);
                self.object_ids.insert(payload.object_id);
                self.objects.push(StoredObject {
                    object_id: payload.object_id,
                    size_bytes: payload.size_bytes,
                    category: payload.category,
                    uploaded_at: payload.uploaded_at,
                });
            }
            QuotaEventKind::CapacityExpanded(payload) => {
                if self.applied_orders.insert(payload.order_id) {
                    self.expanded_bytes = self.expanded_bytes.saturating_add(payload.additional_bytes);
                }
            }
        }
        self.version += 1;
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    fn clear_uncommitted_events(&mut self) {
        self.uncommitted_events.clear();
    }
}
