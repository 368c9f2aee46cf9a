//! Background tasks: the periodic order sweep and per-order capacity
//! re-application after a settlement whose expansion failed.

use std::time::Duration;

use lumen_purchase::application::command_handlers::handle_apply_paid_order;
use lumen_purchase::application::sweeper::{apply_pending_orders, expire_overdue_orders};
use lumen_purchase::domain::commands::ApplyPaidOrder;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::state::AppState;

/// Runs one sweep: expires overdue orders, then re-applies paid orders.
pub async fn sweep_once(state: &AppState) {
    let clock = state.clock.as_ref();
    let repo = &*state.event_repository;
    if let Err(err) = expire_overdue_orders(clock, repo, &state.locks).await {
        error!(error = %err, "expiry sweep failed");
    }
    if let Err(err) = apply_pending_orders(clock, repo, &state.locks).await {
        error!(error = %err, "re-application sweep failed");
    }
}

/// Spawns the periodic sweep.
pub fn spawn_sweeper(state: AppState, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            sweep_once(&state).await;
        }
    })
}

/// Spawns a task that keeps applying the capacity of a paid order with
/// backoff until it succeeds or the retry budget runs out. The periodic
/// sweep picks up anything left over.
pub fn spawn_apply_retry(state: AppState, order_id: Uuid) -> JoinHandle<()> {
    tokio::spawn(async move { apply_with_retry(&state, order_id).await })
}

#[instrument(skip(state))]
async fn apply_with_retry(state: &AppState, order_id: Uuid) {
    let command = ApplyPaidOrder {
        correlation_id: Uuid::new_v4(),
        order_id,
    };
    let command = &command;
    let result = state
        .apply_retry
        .run("apply_paid_order", move |_| async move {
            handle_apply_paid_order(
                command,
                state.clock.as_ref(),
                &*state.event_repository,
                &state.locks,
            )
            .await
        })
        .await;

    match result {
        Ok(true) => info!("capacity applied on retry"),
        Ok(false) => info!("order was already applied"),
        Err(err) => error!(error = %err, "giving up on capacity application until next sweep"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use lumen_billing::PricingSettings;
    use lumen_core::clock::Clock;
    use lumen_core::repository::EventRepository;
    use lumen_purchase::application::command_handlers::CheckoutSettings;
    use lumen_purchase::gateway::SandboxPaymentGateway;
    use lumen_quota::domain::plans::InMemoryPlanCatalog;
    use lumen_test_support::{FailingEventRepository, FixedClock};

    use super::*;

    #[tokio::test]
    async fn test_sweep_survives_repository_failure() {
        let repo: Arc<dyn EventRepository> = Arc::new(FailingEventRepository);
        let clock: Arc<dyn Clock + Send + Sync> =
            Arc::new(FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()));
        let state = AppState::new(
            repo,
            Arc::new(InMemoryPlanCatalog::with_defaults()),
            Arc::new(SandboxPaymentGateway::new()),
            PricingSettings::default(),
            CheckoutSettings::default(),
        )
        .with_clock(clock);

        sweep_once(&state).await;
    }
}
