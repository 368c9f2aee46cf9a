//! Command handlers for the Overage Purchase context.
//!
//! Handlers hold the order's lock for their whole cycle. Applying capacity
//! additionally takes the event's lock inside the quota handler; the order
//! lock is always taken first.

use std::sync::Mutex;

use chrono::Duration;
use lumen_billing::{PricingSettings, quote_overage, schedule};
use lumen_core::aggregate::AggregateRoot;
use lumen_core::clock::Clock;
use lumen_core::error::DomainError;
use lumen_core::event::{EventMetadata, decode_payload, stream_opened_by};
use lumen_core::lock::KeyedLocks;
use lumen_core::repository::{EventRepository, StoredEvent};
use lumen_core::retry::RetryPolicy;
use lumen_core::rng::DeterministicRng;
use lumen_quota::application::command_handlers::{handle_expand_capacity, load_account};
use lumen_quota::domain::commands::ExpandCapacity;
use lumen_quota::domain::units::decimal_gb_to_bytes;
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::aggregates::{PurchaseOrder, QuoteTerms, Settlement};
use crate::domain::commands::{ApplyPaidOrder, CancelOrder, ConfirmOrder, QuoteOrder, SettlePayment};
use crate::domain::events::{ORDER_QUOTED, PurchaseEvent, PurchaseEventKind};
use crate::domain::status::OrderStatus;
use crate::gateway::{PaymentGateway, PaymentRequest};

/// Checkout timing: how long an unpaid order waits and how hard the
/// gateway is retried.
#[derive(Debug, Clone, Copy)]
pub struct CheckoutSettings {
    /// Time from confirmation until an unpaid order expires.
    pub payment_expiry: Duration,
    /// Retry policy for `create_payment`.
    pub gateway_retry: RetryPolicy,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            payment_expiry: Duration::minutes(10),
            gateway_retry: RetryPolicy::default(),
        }
    }
}

/// What a settlement notification led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// The order is paid and its capacity applied.
    Applied,
    /// The order was already applied; nothing changed.
    Duplicate,
    /// The order is paid but applying capacity failed; it must be retried.
    PaidPendingApplication,
}

/// Reconstitutes a `PurchaseOrder` from stored events.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if event deserialization fails.
pub(crate) fn reconstitute(
    order_id: Uuid,
    existing_events: &[StoredEvent],
) -> Result<PurchaseOrder, DomainError> {
    let mut order = PurchaseOrder::new(order_id);
    for stored in existing_events {
        let kind: PurchaseEventKind = decode_payload(stored)?;
        order.apply(&PurchaseEvent {
            metadata: EventMetadata::from_stored(stored),
            kind,
        });
    }
    Ok(order)
}

/// Loads an existing order.
///
/// # Errors
///
/// Returns `DomainError::OrderNotFound` if the id has no order stream.
pub async fn load_order(
    order_id: Uuid,
    repo: &dyn EventRepository,
) -> Result<PurchaseOrder, DomainError> {
    let existing_events = repo.load_events(order_id).await?;
    if !stream_opened_by(&existing_events, ORDER_QUOTED) {
        return Err(DomainError::OrderNotFound(order_id));
    }
    reconstitute(order_id, &existing_events)
}

/// Persists the order's uncommitted events and folds them into its state.
async fn persist(
    order: &mut PurchaseOrder,
    repo: &dyn EventRepository,
) -> Result<Vec<StoredEvent>, DomainError> {
    let stored_events = order.pending_stored_events();
    if !stored_events.is_empty() {
        repo.append_events(order.id, order.version(), &stored_events)
            .await?;
    }
    order.commit();
    Ok(stored_events)
}

/// Derives the key that de-duplicates gateway calls for one order.
pub(crate) fn idempotency_key(order_id: Uuid, rng: &mut dyn DeterministicRng) -> String {
    let mut hasher = Sha256::new();
    hasher.update(order_id.as_bytes());
    for _ in 0..4 {
        hasher.update(rng.next_u32_range(0, u32::MAX).to_be_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Handles the `QuoteOrder` command: validates the request against the
/// event's current overage, prices and schedules it, and stores a draft
/// order.
///
/// # Errors
///
/// Returns `DomainError::EventNotFound`, `DomainError::InvalidRequestedStorage`,
/// `DomainError::InvalidInstallmentCount`, or `DomainError::Validation` if
/// the order id is taken.
pub async fn handle_quote_order(
    command: &QuoteOrder,
    settings: &PricingSettings,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    locks: &KeyedLocks,
) -> Result<Vec<StoredEvent>, DomainError> {
    let account = load_account(command.event_id, repo).await?;
    let minimum_gb = account.minimum_purchase_gb();
    let base_price = quote_overage(command.requested_gb, minimum_gb, settings)?;
    let plan = schedule(base_price, command.installment_count, settings)?;
    let additional_bytes = decimal_gb_to_bytes(command.requested_gb).ok_or_else(|| {
        DomainError::InvalidRequestedStorage {
            requested: command.requested_gb.to_string(),
            minimum: minimum_gb,
        }
    })?;

    let _guard = locks.acquire(command.order_id).await;
    let existing_events = repo.load_events(command.order_id).await?;
    if !existing_events.is_empty() && !stream_opened_by(&existing_events, ORDER_QUOTED) {
        return Err(DomainError::Validation(format!(
            "purchase order {} already exists",
            command.order_id
        )));
    }
    let mut order = reconstitute(command.order_id, &existing_events)?;
    order.quote(
        QuoteTerms {
            event_id: command.event_id,
            requested_gb: command.requested_gb,
            additional_bytes,
            unit_price: settings.price_per_gb,
            base_price,
            total_price: plan.total,
            installments: plan.installments,
        },
        command.correlation_id,
        clock,
    )?;

    let stored_events = persist(&mut order, repo).await?;
    info!(
        order_id = %command.order_id,
        event_id = %command.event_id,
        requested_gb = %command.requested_gb,
        total = %plan.total,
        installments = command.installment_count,
        "order quoted"
    );
    Ok(stored_events)
}

/// Handles the `ConfirmOrder` command: moves a draft to `PendingPayment`
/// and creates the payment at the gateway, retrying transient failures.
///
/// Confirming an order whose payment was already issued is a no-op. An
/// order whose earlier gateway call was exhausted is retried with its
/// original idempotency key.
///
/// The RNG mutex is locked only around key generation, never across an
/// await.
///
/// # Errors
///
/// Returns `DomainError::OrderNotFound`, `DomainError::StateConflict`,
/// `DomainError::InvalidInstallmentCount` (pix with installments), or
/// `DomainError::PaymentGateway` once retries are exhausted.
pub async fn handle_confirm_order(
    command: &ConfirmOrder,
    checkout: &CheckoutSettings,
    clock: &dyn Clock,
    rng: &Mutex<dyn DeterministicRng + Send>,
    repo: &dyn EventRepository,
    locks: &KeyedLocks,
    gateway: &dyn PaymentGateway,
) -> Result<Vec<StoredEvent>, DomainError> {
    let _guard = locks.acquire(command.order_id).await;
    let mut order = load_order(command.order_id, repo).await?;
    let mut stored_events = Vec::new();

    match order.status() {
        OrderStatus::Draft => {
            let key = {
                let mut rng_guard = rng
                    .lock()
                    .map_err(|e| DomainError::Infrastructure(format!("RNG mutex poisoned: {e}")))?;
                idempotency_key(order.id, &mut *rng_guard)
            };
            let expires_at = clock.now() + checkout.payment_expiry;
            order.request_payment(
                command.payment_method,
                key,
                expires_at,
                command.correlation_id,
                clock,
            )?;
            stored_events.extend(persist(&mut order, repo).await?);
            info!(
                order_id = %order.id,
                payment_method = %command.payment_method,
                %expires_at,
                "payment requested"
            );
        }
        OrderStatus::PendingPayment => {
            if order.external_ref().is_some() {
                return Ok(stored_events);
            }
            if order.payment_method() != Some(command.payment_method) {
                return Err(DomainError::StateConflict {
                    order_id: order.id,
                    reason: "payment was requested with a different method".to_owned(),
                });
            }
            if order.expires_at().is_some_and(|at| clock.has_reached(at)) {
                return Err(DomainError::StateConflict {
                    order_id: order.id,
                    reason: "payment window has elapsed".to_owned(),
                });
            }
        }
        status => {
            return Err(DomainError::StateConflict {
                order_id: order.id,
                reason: format!("cannot confirm a {status} order"),
            });
        }
    }

    let terms = order.terms().cloned().ok_or_else(|| DomainError::StateConflict {
        order_id: order.id,
        reason: "order has not been quoted".to_owned(),
    })?;
    let request = PaymentRequest {
        order_id: order.id,
        idempotency_key: order.idempotency_key().unwrap_or_default().to_owned(),
        amount: terms.total_price,
        installment_count: terms.installment_count(),
        method: command.payment_method,
    };

    let request_ref = &request;
    let result = checkout
        .gateway_retry
        .run("create_payment", move |_| async move {
            gateway
                .create_payment(request_ref)
                .await
                .map_err(DomainError::from)
        })
        .await;

    match result {
        Ok(handle) => {
            order.record_payment_issued(
                handle.external_ref.clone(),
                handle.payment_code,
                command.correlation_id,
                clock,
            )?;
            stored_events.extend(persist(&mut order, repo).await?);
            info!(order_id = %order.id, external_ref = %handle.external_ref, "payment issued");
            Ok(stored_events)
        }
        Err(err) => {
            order.record_payment_failed(err.to_string(), command.correlation_id, clock)?;
            if let Err(persist_err) = persist(&mut order, repo).await {
                warn!(order_id = %order.id, error = %persist_err, "could not record payment failure");
            }
            Err(err)
        }
    }
}

/// Expands the event's capacity for a paid order and marks it applied.
async fn apply_capacity(
    order: &mut PurchaseOrder,
    correlation_id: Uuid,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    locks: &KeyedLocks,
) -> Result<(), DomainError> {
    let terms = order.terms().cloned().ok_or_else(|| DomainError::StateConflict {
        order_id: order.id,
        reason: "order has not been quoted".to_owned(),
    })?;
    let expansion = handle_expand_capacity(
        &ExpandCapacity {
            correlation_id,
            event_id: terms.event_id,
            order_id: order.id,
            additional_bytes: terms.additional_bytes,
        },
        clock,
        repo,
        locks,
    )
    .await?;

    order.mark_applied(correlation_id, clock)?;
    persist(order, repo).await?;
    info!(
        order_id = %order.id,
        event_id = %terms.event_id,
        additional_bytes = terms.additional_bytes,
        unlocked = expansion.unlocked_object_ids.len(),
        "purchased capacity applied"
    );
    Ok(())
}

/// Handles a settlement notification: `PendingPayment` → Paid → Applied.
///
/// A replay for an applied order is logged and reported as
/// [`SettlementOutcome::Duplicate`]. When capacity cannot be applied the
/// order stays Paid and [`SettlementOutcome::PaidPendingApplication`] tells
/// the caller to schedule [`handle_apply_paid_order`].
///
/// # Errors
///
/// Returns `DomainError::OrderNotFound`, or `DomainError::StateConflict` for
/// a reference mismatch or an order that is not awaiting payment.
pub async fn handle_settle_payment(
    command: &SettlePayment,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    locks: &KeyedLocks,
) -> Result<SettlementOutcome, DomainError> {
    let _guard = locks.acquire(command.order_id).await;
    let mut order = load_order(command.order_id, repo).await?;
    let never_issued =
        order.status() == OrderStatus::PendingPayment && order.external_ref().is_none();

    let settlement = match order.settle(&command.external_ref, command.correlation_id, clock) {
        Ok(settlement) => settlement,
        Err(DomainError::DuplicateSettlement(order_id)) => {
            warn!(%order_id, external_ref = %command.external_ref, "duplicate settlement ignored");
            return Ok(SettlementOutcome::Duplicate);
        }
        Err(err) if never_issued => {
            // The gateway may have captured money for a payment we never
            // recorded as issued.
            error!(
                order_id = %command.order_id,
                external_ref = %command.external_ref,
                error = %err,
                "settlement for an order without an issued payment; reconcile manually"
            );
            return Err(err);
        }
        Err(err) => {
            warn!(order_id = %command.order_id, error = %err, "settlement rejected");
            return Err(err);
        }
    };
    if settlement == Settlement::Settled {
        persist(&mut order, repo).await?;
        info!(order_id = %order.id, external_ref = %command.external_ref, "payment settled");
    }

    match apply_capacity(&mut order, command.correlation_id, clock, repo, locks).await {
        Ok(()) => Ok(SettlementOutcome::Applied),
        Err(err) => {
            error!(order_id = %order.id, error = %err, "capacity application failed after payment");
            Ok(SettlementOutcome::PaidPendingApplication)
        }
    }
}

/// Applies the capacity of a paid order. Returns `false` if the order was
/// already applied.
///
/// # Errors
///
/// Returns `DomainError::OrderNotFound`, `DomainError::StateConflict` for an
/// unpaid order, or the error that prevented applying capacity.
pub async fn handle_apply_paid_order(
    command: &ApplyPaidOrder,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    locks: &KeyedLocks,
) -> Result<bool, DomainError> {
    let _guard = locks.acquire(command.order_id).await;
    let mut order = load_order(command.order_id, repo).await?;
    match order.status() {
        OrderStatus::Applied => Ok(false),
        OrderStatus::Paid => {
            apply_capacity(&mut order, command.correlation_id, clock, repo, locks).await?;
            Ok(true)
        }
        status => Err(DomainError::StateConflict {
            order_id: order.id,
            reason: format!("cannot apply a {status} order"),
        }),
    }
}

/// Handles the `CancelOrder` command.
///
/// # Errors
///
/// Returns `DomainError::OrderNotFound`, or `DomainError::StateConflict`
/// unless the order is a draft or pending payment.
pub async fn handle_cancel_order(
    command: &CancelOrder,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    locks: &KeyedLocks,
) -> Result<Vec<StoredEvent>, DomainError> {
    let _guard = locks.acquire(command.order_id).await;
    let mut order = load_order(command.order_id, repo).await?;
    order.cancel(command.correlation_id, clock)?;

    let stored_events = persist(&mut order, repo).await?;
    info!(order_id = %order.id, "order cancelled");
    Ok(stored_events)
}
