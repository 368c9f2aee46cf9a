//! Background maintenance of purchase orders.
//!
//! Both sweeps are driven by the API's periodic task. Per-order failures are
//! logged and skipped so one broken stream never stalls the rest.

use lumen_core::aggregate::AggregateRoot;
use lumen_core::clock::Clock;
use lumen_core::error::DomainError;
use lumen_core::lock::KeyedLocks;
use lumen_core::repository::EventRepository;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::command_handlers::{handle_apply_paid_order, load_order};
use crate::domain::commands::ApplyPaidOrder;
use crate::domain::events::{
    CAPACITY_APPLIED, ORDER_CANCELLED, ORDER_EXPIRED, PAYMENT_REQUESTED, PAYMENT_SETTLED,
};
use crate::domain::status::OrderStatus;

/// Once any of these is in a stream the order can no longer expire.
const PAST_PAYMENT_WINDOW: [&str; 4] =
    [PAYMENT_SETTLED, CAPACITY_APPLIED, ORDER_CANCELLED, ORDER_EXPIRED];

async fn expire_one(
    order_id: Uuid,
    correlation_id: Uuid,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    locks: &KeyedLocks,
) -> Result<bool, DomainError> {
    let _guard = locks.acquire(order_id).await;
    let mut order = load_order(order_id, repo).await?;
    if !order.expire_if_overdue(correlation_id, clock) {
        return Ok(false);
    }
    let stored_events = order.pending_stored_events();
    repo.append_events(order_id, order.version(), &stored_events)
        .await?;
    Ok(true)
}

/// Expires every pending order whose payment window has elapsed. Returns
/// the expired order ids.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the candidate orders cannot be
/// listed.
pub async fn expire_overdue_orders(
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    locks: &KeyedLocks,
) -> Result<Vec<Uuid>, DomainError> {
    let candidates = repo
        .aggregate_ids_with_event_type_excluding(PAYMENT_REQUESTED, &PAST_PAYMENT_WINDOW)
        .await?;
    let correlation_id = Uuid::new_v4();
    let mut expired = Vec::new();

    for order_id in candidates {
        match expire_one(order_id, correlation_id, clock, repo, locks).await {
            Ok(true) => expired.push(order_id),
            Ok(false) => {}
            Err(err) => warn!(%order_id, error = %err, "could not expire order"),
        }
    }

    if expired.is_empty() {
        debug!("no overdue orders");
    } else {
        info!(count = expired.len(), "expired unpaid orders");
    }
    Ok(expired)
}

/// Applies capacity for every order that was paid but never applied, for
/// instance after a crash between settlement and expansion. Returns the
/// order ids that were applied.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the candidate orders cannot be
/// listed.
pub async fn apply_pending_orders(
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    locks: &KeyedLocks,
) -> Result<Vec<Uuid>, DomainError> {
    let candidates = repo
        .aggregate_ids_with_event_type_excluding(PAYMENT_SETTLED, &[CAPACITY_APPLIED])
        .await?;
    let correlation_id = Uuid::new_v4();
    let mut applied = Vec::new();

    for order_id in candidates {
        // Cheap unlocked pre-check; the handler re-checks under the lock.
        match load_order(order_id, repo).await {
            Ok(order) if order.status() == OrderStatus::Paid => {}
            Ok(_) => continue,
            Err(err) => {
                warn!(%order_id, error = %err, "could not load settled order");
                continue;
            }
        }
        let command = ApplyPaidOrder {
            correlation_id,
            order_id,
        };
        match handle_apply_paid_order(&command, clock, repo, locks).await {
            Ok(true) => applied.push(order_id),
            Ok(false) => {}
            Err(err) => warn!(%order_id, error = %err, "capacity application still failing"),
        }
    }

    if !applied.is_empty() {
        info!(count = applied.len(), "applied capacity for paid orders");
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use lumen_billing::PricingSettings;
    use lumen_core::repository::StoredEvent;
    use lumen_core::retry::RetryPolicy;
    use lumen_core::rng::DeterministicRng;
    use lumen_quota::application::command_handlers::{handle_open_account, handle_record_object};
    use lumen_quota::domain::commands::{OpenAccount, RecordObject};
    use lumen_quota::domain::objects::MediaCategory;
    use lumen_quota::domain::plans::InMemoryPlanCatalog;
    use lumen_quota::domain::units::BYTES_PER_GB;
    use lumen_test_support::{FailingEventRepository, InMemoryEventRepository, ManualClock, MockRng};
    use rust_decimal::Decimal;

    use super::*;
    use crate::application::command_handlers::{
        CheckoutSettings, SettlementOutcome, handle_confirm_order, handle_quote_order,
        handle_settle_payment,
    };
    use crate::domain::commands::{ConfirmOrder, QuoteOrder, SettlePayment};
    use crate::domain::status::PaymentMethod;
    use crate::gateway::SandboxPaymentGateway;

    struct Fixture {
        repo: InMemoryEventRepository,
        locks: KeyedLocks,
        clock: ManualClock,
        gateway: SandboxPaymentGateway,
        rng: Mutex<MockRng>,
        event_id: Uuid,
    }

    impl Fixture {
        async fn over_quota() -> Self {
            let fixture = Self {
                repo: InMemoryEventRepository::new(),
                locks: KeyedLocks::new(),
                clock: ManualClock::new(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()),
                gateway: SandboxPaymentGateway::new(),
                rng: Mutex::new(MockRng),
                event_id: Uuid::new_v4(),
            };
            handle_open_account(
                &OpenAccount {
                    correlation_id: Uuid::new_v4(),
                    event_id: fixture.event_id,
                    plan_id: "basic".to_owned(),
                },
                &InMemoryPlanCatalog::with_defaults(),
                &fixture.clock,
                &fixture.repo,
                &fixture.locks,
            )
            .await
            .unwrap();
            handle_record_object(
                &RecordObject {
                    correlation_id: Uuid::new_v4(),
                    event_id: fixture.event_id,
                    object_id: Uuid::new_v4(),
                    size_bytes: 12 * BYTES_PER_GB,
                    category: MediaCategory::Image,
                    uploaded_at: None,
                },
                &fixture.clock,
                &fixture.repo,
                &fixture.locks,
            )
            .await
            .unwrap();
            fixture
        }

        async fn pending_order(&self) -> Uuid {
            let order_id = Uuid::new_v4();
            handle_quote_order(
                &QuoteOrder {
                    correlation_id: Uuid::new_v4(),
                    order_id,
                    event_id: self.event_id,
                    requested_gb: Decimal::from(2),
                    installment_count: 1,
                },
                &PricingSettings::default(),
                &self.clock,
                &self.repo,
                &self.locks,
            )
            .await
            .unwrap();
            let rng: &Mutex<dyn DeterministicRng + Send> = &self.rng;
            handle_confirm_order(
                &ConfirmOrder {
                    correlation_id: Uuid::new_v4(),
                    order_id,
                    payment_method: PaymentMethod::Pix,
                },
                &CheckoutSettings {
                    payment_expiry: Duration::minutes(10),
                    gateway_retry: RetryPolicy::immediate(1),
                },
                &self.clock,
                rng,
                &self.repo,
                &self.locks,
                &self.gateway,
            )
            .await
            .unwrap();
            order_id
        }

        async fn settle(&self, order_id: Uuid) -> SettlementOutcome {
            let external_ref = load_order(order_id, &self.repo)
                .await
                .unwrap()
                .external_ref()
                .unwrap()
                .to_owned();
            handle_settle_payment(
                &SettlePayment {
                    correlation_id: Uuid::new_v4(),
                    order_id,
                    external_ref,
                },
                &self.clock,
                &self.repo,
                &self.locks,
            )
            .await
            .unwrap()
        }
    }

    /// Counts stream loads on top of the fixture's store.
    struct CountingRepository<'a> {
        inner: &'a InMemoryEventRepository,
        loads: AtomicUsize,
    }

    #[async_trait]
    impl EventRepository for CountingRepository<'_> {
        async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.inner.load_events(aggregate_id).await
        }

        async fn append_events(
            &self,
            aggregate_id: Uuid,
            expected_version: i64,
            events: &[StoredEvent],
        ) -> Result<(), DomainError> {
            self.inner
                .append_events(aggregate_id, expected_version, events)
                .await
        }

        async fn aggregate_ids_with_event_type_excluding(
            &self,
            event_type: &str,
            excluded: &[&str],
        ) -> Result<Vec<Uuid>, DomainError> {
            self.inner
                .aggregate_ids_with_event_type_excluding(event_type, excluded)
                .await
        }
    }

    #[tokio::test]
    async fn test_sweep_expires_only_overdue_orders() {
        // Arrange
        let fixture = Fixture::over_quota().await;
        let early = fixture.pending_order().await;
        fixture.clock.advance(Duration::minutes(5));
        let late = fixture.pending_order().await;
        fixture.clock.advance(Duration::minutes(6));

        // Act
        let expired = expire_overdue_orders(&fixture.clock, &fixture.repo, &fixture.locks)
            .await
            .unwrap();

        // Assert
        assert_eq!(expired, vec![early]);
        let early_order = load_order(early, &fixture.repo).await.unwrap();
        let late_order = load_order(late, &fixture.repo).await.unwrap();
        assert_eq!(early_order.status(), OrderStatus::Expired);
        assert_eq!(late_order.status(), OrderStatus::PendingPayment);
    }

    #[tokio::test]
    async fn test_settlement_after_expiry_is_rejected() {
        // Arrange
        let fixture = Fixture::over_quota().await;
        let order_id = fixture.pending_order().await;
        let external_ref = load_order(order_id, &fixture.repo)
            .await
            .unwrap()
            .external_ref()
            .unwrap()
            .to_owned();
        fixture.clock.advance(Duration::minutes(11));
        expire_overdue_orders(&fixture.clock, &fixture.repo, &fixture.locks)
            .await
            .unwrap();

        // Act
        let result = handle_settle_payment(
            &SettlePayment {
                correlation_id: Uuid::new_v4(),
                order_id,
                external_ref,
            },
            &fixture.clock,
            &fixture.repo,
            &fixture.locks,
        )
        .await;

        // Assert
        assert!(matches!(result, Err(DomainError::StateConflict { .. })));
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent() {
        let fixture = Fixture::over_quota().await;
        fixture.pending_order().await;
        fixture.clock.advance(Duration::minutes(10));

        let first = expire_overdue_orders(&fixture.clock, &fixture.repo, &fixture.locks)
            .await
            .unwrap();
        let second = expire_overdue_orders(&fixture.clock, &fixture.repo, &fixture.locks)
            .await
            .unwrap();

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_apply_pending_orders_skips_applied_orders() {
        // Arrange
        let fixture = Fixture::over_quota().await;
        let order_id = fixture.pending_order().await;
        let external_ref = load_order(order_id, &fixture.repo)
            .await
            .unwrap()
            .external_ref()
            .unwrap()
            .to_owned();
        let outcome = handle_settle_payment(
            &SettlePayment {
                correlation_id: Uuid::new_v4(),
                order_id,
                external_ref,
            },
            &fixture.clock,
            &fixture.repo,
            &fixture.locks,
        )
        .await
        .unwrap();

        // Act
        let applied = apply_pending_orders(&fixture.clock, &fixture.repo, &fixture.locks)
            .await
            .unwrap();

        // Assert
        assert_eq!(outcome, SettlementOutcome::Applied);
        assert!(applied.is_empty());
    }

    #[tokio::test]
    async fn test_sweeps_do_not_load_finished_orders() {
        // Arrange: ten applied orders and one expired order.
        let fixture = Fixture::over_quota().await;
        let mut orders = Vec::new();
        for _ in 0..11 {
            orders.push(fixture.pending_order().await);
        }
        let unpaid = orders.pop().unwrap();
        for order_id in &orders {
            assert_eq!(fixture.settle(*order_id).await, SettlementOutcome::Applied);
        }
        fixture.clock.advance(Duration::minutes(11));
        let expired = expire_overdue_orders(&fixture.clock, &fixture.repo, &fixture.locks)
            .await
            .unwrap();
        assert_eq!(expired, vec![unpaid]);
        let counting = CountingRepository {
            inner: &fixture.repo,
            loads: AtomicUsize::new(0),
        };

        // Act
        let expired = expire_overdue_orders(&fixture.clock, &counting, &fixture.locks)
            .await
            .unwrap();
        let applied = apply_pending_orders(&fixture.clock, &counting, &fixture.locks)
            .await
            .unwrap();

        // Assert
        assert!(expired.is_empty());
        assert!(applied.is_empty());
        assert_eq!(counting.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sweep_surfaces_listing_failure() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap());

        let result = expire_overdue_orders(&clock, &FailingEventRepository, &KeyedLocks::new()).await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }
}
