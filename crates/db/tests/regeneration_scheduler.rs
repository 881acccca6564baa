use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::watch;

use shopsense_core::config::{SchedulerConfig, ViewTriggerMode};
use shopsense_core::domain::activity::{ViewEvent, ViewEventId};
use shopsense_core::domain::product::{Product, ProductId};
use shopsense_core::domain::user::{User, UserId};
use shopsense_core::store::{BehaviorStore, BoundedStore};
use shopsense_core::{PromotionGenerator, PromotionPolicy, RegenerationScheduler, TriggerOutcome};
use shopsense_db::InMemoryBehaviorStore;

type ScenarioResult<T = ()> = Result<T, String>;

macro_rules! require {
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($($arg)*));
        }
    };
}

const INTERVAL_SECS: u64 = 60;

async fn shopper_store() -> ScenarioResult<Arc<InMemoryBehaviorStore>> {
    let store = Arc::new(InMemoryBehaviorStore::new());
    store
        .save_users(vec![User {
            id: UserId("shopper".to_string()),
            name: "Shopper".to_string(),
            email: "shopper@example.com".to_string(),
            registered_at: Utc::now(),
        }])
        .await
        .map_err(|error| error.to_string())?;
    store
        .save_products(
            ["p1", "p2"]
                .into_iter()
                .map(|id| Product {
                    id: ProductId(id.to_string()),
                    name: format!("Product {id}"),
                    category: "Books".to_string(),
                    tags: Default::default(),
                    price: Decimal::new(4_590, 2),
                    description: String::new(),
                })
                .collect(),
        )
        .await
        .map_err(|error| error.to_string())?;
    store
        .record_view(ViewEvent {
            id: ViewEventId("v1".to_string()),
            user_id: UserId("shopper".to_string()),
            product_id: ProductId("p1".to_string()),
            viewed_at: Utc::now(),
            view_duration_secs: 30,
        })
        .await
        .map_err(|error| error.to_string())?;
    Ok(store)
}

fn scheduler(
    store: Arc<InMemoryBehaviorStore>,
    sweep_enabled: bool,
    view_trigger: ViewTriggerMode,
) -> RegenerationScheduler {
    let bounded = BoundedStore::new(store, Duration::from_secs(5));
    RegenerationScheduler::new(
        PromotionGenerator::new(bounded, PromotionPolicy::default(), 10),
        &SchedulerConfig { sweep_enabled, sweep_interval_secs: INTERVAL_SECS, view_trigger },
    )
}

async fn promotion_count(store: &InMemoryBehaviorStore) -> ScenarioResult<usize> {
    store
        .promotions_for_user(&UserId("shopper".to_string()))
        .await
        .map(|promotions| promotions.len())
        .map_err(|error| error.to_string())
}

/// Lets spawned tasks run; with a paused clock each sleep also advances time.
async fn settle(store: &InMemoryBehaviorStore) -> ScenarioResult<usize> {
    for _ in 0..20 {
        let count = promotion_count(store).await?;
        if count > 0 {
            return Ok(count);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    promotion_count(store).await
}

#[tokio::test(start_paused = true)]
async fn periodic_sweep_waits_one_interval_then_writes_promotions() -> ScenarioResult {
    let store = shopper_store().await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = scheduler(store.clone(), true, ViewTriggerMode::Disabled)
        .spawn_periodic_sweep(shutdown_rx)
        .ok_or("sweep should be enabled")?;

    tokio::time::sleep(Duration::from_secs(INTERVAL_SECS / 2)).await;
    tokio::task::yield_now().await;
    require!(
        promotion_count(&store).await? == 0,
        "no sweep may run before the first interval elapses"
    );

    tokio::time::sleep(Duration::from_secs(INTERVAL_SECS)).await;
    let written = settle(&store).await?;
    require!(written == 2, "expected both Books products promoted, got {written}");

    shutdown_tx.send(true).map_err(|error| error.to_string())?;
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .map_err(|_| "sweep task did not stop after shutdown".to_string())?
        .map_err(|error| error.to_string())?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn shutdown_before_first_interval_stops_without_sweeping() -> ScenarioResult {
    let store = shopper_store().await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = scheduler(store.clone(), true, ViewTriggerMode::Disabled)
        .spawn_periodic_sweep(shutdown_rx)
        .ok_or("sweep should be enabled")?;

    shutdown_tx.send(true).map_err(|error| error.to_string())?;
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .map_err(|_| "sweep task did not stop after shutdown".to_string())?
        .map_err(|error| error.to_string())?;

    require!(promotion_count(&store).await? == 0, "a stopped sweep must not write");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn disabled_sweep_spawns_nothing() -> ScenarioResult {
    let store = shopper_store().await?;
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = scheduler(store, false, ViewTriggerMode::Disabled).spawn_periodic_sweep(shutdown_rx);

    require!(handle.is_none(), "disabled sweep must not spawn a task");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn background_trigger_converges_after_spawned_task_runs() -> ScenarioResult {
    let store = shopper_store().await?;
    let scheduler = scheduler(store.clone(), false, ViewTriggerMode::Background);

    let outcome = scheduler.on_view_recorded(&UserId("shopper".to_string())).await;

    require!(outcome == TriggerOutcome::Scheduled, "unexpected trigger outcome {outcome:?}");
    let written = settle(&store).await?;
    require!(written == 2, "background regeneration should promote both products, got {written}");
    Ok(())
}
