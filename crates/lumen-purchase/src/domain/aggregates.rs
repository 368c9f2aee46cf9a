//! Aggregate roots for the Overage Purchase context.

use chrono::{DateTime, Utc};
use lumen_billing::Money;
use lumen_core::aggregate::AggregateRoot;
use lumen_core::clock::Clock;
use lumen_core::error::DomainError;
use lumen_core::event::EventMetadata;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::events::{
    CapacityApplied, OrderCancelled, OrderExpired, OrderQuoted, PaymentFailed, PaymentIssued,
    PaymentRequested, PaymentSettled, PurchaseEvent, PurchaseEventKind,
};
use super::status::{OrderStatus, PaymentMethod};

/// Priced terms of an order, fixed at quote time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteTerms {
    /// The event being topped up.
    pub event_id: Uuid,
    /// Requested additional storage in GB.
    pub requested_gb: Decimal,
    /// `requested_gb` in whole bytes.
    pub additional_bytes: u64,
    /// Price per GB at quote time.
    pub unit_price: Decimal,
    /// Price before interest.
    pub base_price: Money,
    /// Price including interest.
    pub total_price: Money,
    /// Amount of each installment.
    pub installments: Vec<Money>,
}

impl QuoteTerms {
    /// Number of installments.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn installment_count(&self) -> u32 {
        self.installments.len() as u32
    }
}

/// Outcome of a settlement notification that the order accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// The order moved to `Paid`.
    Settled,
    /// The order was already `Paid`; capacity still needs applying.
    AlreadyPaid,
}

/// The aggregate root for an overage purchase order.
#[derive(Debug)]
pub struct PurchaseOrder {
    /// Aggregate identifier.
    pub id: Uuid,
    /// Current version (event count).
    pub(crate) version: i64,
    /// Lifecycle state.
    pub(crate) status: OrderStatus,
    /// Priced terms (set after `OrderQuoted`).
    pub(crate) terms: Option<QuoteTerms>,
    pub(crate) created_at: Option<DateTime<Utc>>,
    pub(crate) payment_method: Option<PaymentMethod>,
    pub(crate) idempotency_key: Option<String>,
    pub(crate) expires_at: Option<DateTime<Utc>>,
    pub(crate) external_ref: Option<String>,
    pub(crate) payment_code: Option<String>,
    pub(crate) last_payment_error: Option<String>,
    pub(crate) settled_at: Option<DateTime<Utc>>,
    pub(crate) applied_at: Option<DateTime<Utc>>,
    /// Uncommitted events pending persistence.
    uncommitted_events: Vec<PurchaseEvent>,
}

impl PurchaseOrder {
    /// Creates an empty order.
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            version: 0,
            status: OrderStatus::Draft,
            terms: None,
            created_at: None,
            payment_method: None,
            idempotency_key: None,
            expires_at: None,
            external_ref: None,
            payment_code: None,
            last_payment_error: None,
            settled_at: None,
            applied_at: None,
            uncommitted_events: Vec::new(),
        }
    }

    fn raise(&mut self, kind: PurchaseEventKind, correlation_id: Uuid, clock: &dyn Clock) {
        let event = PurchaseEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: kind.event_type().to_owned(),
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

    fn conflict(&self, reason: impl Into<String>) -> DomainError {
        DomainError::StateConflict {
            order_id: self.id,
            reason: reason.into(),
        }
    }

    /// Applies the uncommitted events to local state once they have been
    /// persisted, so a handler can continue with the next transition.
    pub fn commit(&mut self) {
        let events = std::mem::take(&mut self.uncommitted_events);
        for event in &events {
            self.apply(event);
        }
    }

    /// Prices the order.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the order was already quoted or
    /// the terms have no installments.
    pub fn quote(
        &mut self,
        terms: QuoteTerms,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.terms.is_some() {
            return Err(DomainError::Validation(format!(
                "purchase order {} already exists",
                self.id
            )));
        }
        if terms.installments.is_empty() {
            return Err(DomainError::Validation(
                "a quote needs at least one installment".to_owned(),
            ));
        }
        let kind = PurchaseEventKind::OrderQuoted(OrderQuoted {
            order_id: self.id,
            event_id: terms.event_id,
            requested_gb: terms.requested_gb,
            additional_bytes: terms.additional_bytes,
            unit_price: terms.unit_price,
            base_price: terms.base_price,
            total_price: terms.total_price,
            installment_count: terms.installment_count(),
            installments: terms.installments,
        });
        self.raise(kind, correlation_id, clock);
        Ok(())
    }

    /// Confirms a draft order: Draft → `PendingPayment`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StateConflict` unless the order is a quoted
    /// draft, and `DomainError::InvalidInstallmentCount` when the method
    /// does not accept the quoted installment count.
    pub fn request_payment(
        &mut self,
        payment_method: PaymentMethod,
        idempotency_key: String,
        expires_at: DateTime<Utc>,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let Some(terms) = &self.terms else {
            return Err(self.conflict("order has not been quoted"));
        };
        if self.status != OrderStatus::Draft {
            return Err(self.conflict(format!("cannot confirm a {} order", self.status)));
        }
        let count = terms.installment_count();
        let max = payment_method.max_installments(count);
        if count > max {
            return Err(DomainError::InvalidInstallmentCount { count, max });
        }
        let kind = PurchaseEventKind::PaymentRequested(PaymentRequested {
            order_id: self.id,
            payment_method,
            idempotency_key,
            expires_at,
        });
        self.raise(kind, correlation_id, clock);
        Ok(())
    }

    /// Records the gateway's payment handle.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StateConflict` unless the order is pending
    /// payment without a handle.
    pub fn record_payment_issued(
        &mut self,
        external_ref: String,
        payment_code: String,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.status != OrderStatus::PendingPayment || self.external_ref.is_some() {
            return Err(self.conflict("payment was already issued"));
        }
        let kind = PurchaseEventKind::PaymentIssued(PaymentIssued {
            order_id: self.id,
            external_ref,
            payment_code,
        });
        self.raise(kind, correlation_id, clock);
        Ok(())
    }

    /// Records that the gateway could not be reached. The order stays
    /// pending so `confirm` can be retried with the same key.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StateConflict` unless the order is pending
    /// payment.
    pub fn record_payment_failed(
        &mut self,
        reason: String,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.status != OrderStatus::PendingPayment {
            return Err(self.conflict(format!("cannot fail payment of a {} order", self.status)));
        }
        let kind = PurchaseEventKind::PaymentFailed(PaymentFailed {
            order_id: self.id,
            reason,
        });
        self.raise(kind, correlation_id, clock);
        Ok(())
    }

    /// Handles a settlement notification.
    ///
    /// A pending order is accepted even past its expiry as long as the sweep
    /// has not expired it yet.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::DuplicateSettlement` for an applied order and
    /// `DomainError::StateConflict` for a reference mismatch or any other
    /// state.
    pub fn settle(
        &mut self,
        external_ref: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<Settlement, DomainError> {
        match self.status {
            OrderStatus::Applied => Err(DomainError::DuplicateSettlement(self.id)),
            OrderStatus::Paid | OrderStatus::PendingPayment => {
                match self.external_ref.as_deref() {
                    None => return Err(self.conflict("no payment was issued for this order")),
                    Some(expected) if expected != external_ref => {
                        return Err(self.conflict(format!(
                            "settlement reference {external_ref} does not match {expected}"
                        )));
                    }
                    Some(_) => {}
                }
                if self.status == OrderStatus::Paid {
                    return Ok(Settlement::AlreadyPaid);
                }
                let kind = PurchaseEventKind::PaymentSettled(PaymentSettled {
                    order_id: self.id,
                    external_ref: external_ref.to_owned(),
                });
                self.raise(kind, correlation_id, clock);
                Ok(Settlement::Settled)
            }
            status => Err(self.conflict(format!("cannot settle a {status} order"))),
        }
    }

    /// Records that the event's capacity was expanded: Paid → Applied.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StateConflict` unless the order is paid.
    pub fn mark_applied(&mut self, correlation_id: Uuid, clock: &dyn Clock) -> Result<(), DomainError> {
        let Some(terms) = &self.terms else {
            return Err(self.conflict("order has not been quoted"));
        };
        if self.status != OrderStatus::Paid {
            return Err(self.conflict(format!("cannot apply a {} order", self.status)));
        }
        let kind = PurchaseEventKind::CapacityApplied(CapacityApplied {
            order_id: self.id,
            event_id: terms.event_id,
            additional_bytes: terms.additional_bytes,
        });
        self.raise(kind, correlation_id, clock);
        Ok(())
    }

    /// Cancels an unpaid order.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StateConflict` unless the order is a quoted
    /// draft or pending payment.
    pub fn cancel(&mut self, correlation_id: Uuid, clock: &dyn Clock) -> Result<(), DomainError> {
        if self.terms.is_none()
            || !matches!(self.status, OrderStatus::Draft | OrderStatus::PendingPayment)
        {
            return Err(self.conflict(format!("cannot cancel a {} order", self.status)));
        }
        let kind = PurchaseEventKind::OrderCancelled(OrderCancelled { order_id: self.id });
        self.raise(kind, correlation_id, clock);
        Ok(())
    }

    /// Expires the order if it is still pending past its expiry. Returns
    /// whether it expired.
    pub fn expire_if_overdue(&mut self, correlation_id: Uuid, clock: &dyn Clock) -> bool {
        let overdue = self.status == OrderStatus::PendingPayment
            && self.expires_at.is_some_and(|expires_at| clock.has_reached(expires_at));
        if overdue {
            let kind = PurchaseEventKind::OrderExpired(OrderExpired { order_id: self.id });
            self.raise(kind, correlation_id, clock);
        }
        overdue
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Priced terms, once quoted.
    #[must_use]
    pub fn terms(&self) -> Option<&QuoteTerms> {
        self.terms.as_ref()
    }

    /// Payment method chosen at confirmation.
    #[must_use]
    pub fn payment_method(&self) -> Option<PaymentMethod> {
        self.payment_method
    }

    /// Idempotency key generated at confirmation.
    #[must_use]
    pub fn idempotency_key(&self) -> Option<&str> {
        self.idempotency_key.as_deref()
    }

    /// Gateway reference, once the payment was issued.
    #[must_use]
    pub fn external_ref(&self) -> Option<&str> {
        self.external_ref.as_deref()
    }

    /// When the unpaid order expires.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}

impl AggregateRoot for PurchaseOrder {
    type Event = PurchaseEvent;

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(&mut self, event: &Self::Event) {
        let at = event.metadata.occurred_at;
        match &event.kind {
            PurchaseEventKind::OrderQuoted(payload) => {
                self.status = OrderStatus::Draft;
                self.created_at = Some(at);
                self.terms = Some(QuoteTerms {
                    event_id: payload.event_id,
                    requested_gb: payload.requested_gb,
                    additional_bytes: payload.additional_bytes,
                    unit_price: payload.unit_price,
                    base_price: payload.base_price,
                    total_price: payload.total_price,
                    installments: payload.installments.clone(),
                });
            }
            PurchaseEventKind::PaymentRequested(payload) => {
                self.status = OrderStatus::PendingPayment;
                self.payment_method = Some(payload.payment_method);
                self.idempotency_key = Some(payload.idempotency_key.clone());
                self.expires_at = Some(payload.expires_at);
            }
            PurchaseEventKind::PaymentIssued(payload) => {
                self.external_ref = Some(payload.external_ref.clone());
                self.payment_code = Some(payload.payment_code.clone());
                self.last_payment_error = None;
            }
            PurchaseEventKind::PaymentFailed(payload) => {
                self.last_payment_error = Some(payload.reason.clone());
            }
            PurchaseEventKind::PaymentSettled(_) => {
                self.status = OrderStatus::Paid;
                self.settled_at = Some(at);
            }
            PurchaseEventKind::CapacityApplied(_) => {
                self.status = OrderStatus::Applied;
                self.applied_at = Some(at);
            }
            PurchaseEventKind::OrderCancelled(_) => self.status = OrderStatus::Cancelled,
            PurchaseEventKind::OrderExpired(_) => self.status = OrderStatus::Expired,
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
