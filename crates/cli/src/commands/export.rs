use rust_decimal::Decimal;
use serde::Serialize;

use shopsense_core::domain::activity::{PurchaseEvent, ViewEvent};
use shopsense_core::domain::product::Product;
use shopsense_core::domain::promotion::Promotion;
use shopsense_core::domain::user::{User, UserId};
use shopsense_core::store::{BoundedStore, ProductCount, StoreError};

use crate::commands::{load_config, open_store, runtime, to_data, CommandResult, Failure};

const TOP_VIEWED_LIMIT: usize = 5;

#[derive(Debug, Serialize)]
pub struct Snapshot {
    pub users: Vec<User>,
    pub products: Vec<Product>,
    pub views: Vec<ViewEvent>,
    pub purchases: Vec<PurchaseEvent>,
    pub promotions: Vec<Promotion>,
    pub statistics: Statistics,
}

#[derive(Debug, Serialize)]
pub struct Statistics {
    pub total_users: usize,
    pub total_products: usize,
    pub total_views: usize,
    pub total_purchases: usize,
    pub total_promotions: usize,
    pub purchase_value_sum: Decimal,
    pub top_viewed: Vec<ProductCount>,
}

#[derive(Debug, Serialize)]
pub struct UserSnapshot {
    pub user: Option<User>,
    pub views: Vec<ViewEvent>,
    pub purchases: Vec<PurchaseEvent>,
    pub promotions: Vec<Promotion>,
}

pub fn run(user: Option<&str>) -> CommandResult {
    let config = match load_config("export") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match runtime("export") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let (pool, store) = open_store(&config).await?;
        let exported = match user {
            Some(user_id) => export_user(&store, &UserId(user_id.to_string()))
                .await
                .map(|snapshot| (user_message(&snapshot, user_id), to_data(&snapshot))),
            None => export_all(&store).await.map(|snapshot| {
                let message = format!(
                    "exported {} users, {} products, {} views, {} purchases, {} promotions",
                    snapshot.statistics.total_users,
                    snapshot.statistics.total_products,
                    snapshot.statistics.total_views,
                    snapshot.statistics.total_purchases,
                    snapshot.statistics.total_promotions
                );
                (message, to_data(&snapshot))
            }),
        };
        pool.close().await;
        exported.map_err(|error| -> Failure { ("export", error.to_string(), 5u8) })
    });

    match result {
        Ok((message, data)) => CommandResult::success_with_data("export", message, data),
        Err(failure) => CommandResult::from_failure("export", failure),
    }
}

fn user_message(snapshot: &UserSnapshot, user_id: &str) -> String {
    match &snapshot.user {
        Some(_) => format!(
            "exported {user_id}: {} views, {} purchases, {} promotions",
            snapshot.views.len(),
            snapshot.purchases.len(),
            snapshot.promotions.len()
        ),
        None => format!("user {user_id} is not registered; exported recorded activity only"),
    }
}

pub async fn export_all(store: &BoundedStore) -> Result<Snapshot, StoreError> {
    let users = store.list_users().await?;
    let products = store.list_products().await?;
    let views = store.list_views().await?;
    let purchases = store.list_purchases().await?;
    let promotions = store.list_promotions().await?;

    let statistics = Statistics {
        total_users: users.len(),
        total_products: products.len(),
        total_views: views.len(),
        total_purchases: purchases.len(),
        total_promotions: promotions.len(),
        purchase_value_sum: purchases.iter().map(|purchase| purchase.amount).sum(),
        top_viewed: store.view_counts_by_product(TOP_VIEWED_LIMIT).await?,
    };

    Ok(Snapshot { users, products, views, purchases, promotions, statistics })
}

pub async fn export_user(store: &BoundedStore, user_id: &UserId) -> Result<UserSnapshot, StoreError> {
    Ok(UserSnapshot {
        user: store.find_user(user_id).await?,
        views: store.views_for_users(std::slice::from_ref(user_id)).await?,
        purchases: store.purchases_for_user(user_id).await?,
        promotions: store.promotions_for_user(user_id).await?,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use shopsense_core::domain::product::ProductId;
    use shopsense_core::domain::promotion::{Promotion, PromotionId};
    use shopsense_core::domain::user::UserId;
    use shopsense_core::store::{BehaviorStore, BoundedStore};
    use shopsense_db::{DemoDataset, InMemoryBehaviorStore};

    use super::{export_all, export_user};

    async fn seeded() -> BoundedStore {
        let store = Arc::new(InMemoryBehaviorStore::new());
        DemoDataset::load(store.as_ref()).await.expect("seed");
        BoundedStore::new(store, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn full_export_summarizes_every_collection() {
        let snapshot = export_all(&seeded().await).await.expect("export");
        let expected_sum: Decimal =
            DemoDataset::purchases().iter().map(|purchase| purchase.amount).sum();

        assert_eq!(snapshot.statistics.total_users, DemoDataset::users().len());
        assert_eq!(snapshot.statistics.total_views, DemoDataset::views().len());
        assert_eq!(snapshot.statistics.purchase_value_sum, expected_sum);
        assert_eq!(snapshot.statistics.top_viewed[0].product_id.as_str(), "prod-galaxy-s21");
        assert_eq!(snapshot.statistics.top_viewed[0].count, 2);
        assert!(snapshot.statistics.top_viewed.len() <= 5);
    }

    #[tokio::test]
    async fn full_export_includes_promotions_of_unregistered_users() {
        let store = Arc::new(InMemoryBehaviorStore::new());
        DemoDataset::load(store.as_ref()).await.expect("seed");
        let walk_in = UserId("walk-in".to_string());
        let product_id = ProductId("prod-pixel-8".to_string());
        let generated_at = Utc.with_ymd_and_hms(2026, 1, 20, 9, 0, 0).single().expect("valid");
        store
            .upsert_promotions(vec![Promotion {
                id: PromotionId::for_pair(&walk_in, &product_id),
                user_id: walk_in.clone(),
                product_id,
                discount_pct: 10,
                valid_until: generated_at + chrono::Duration::days(7),
                generated_at,
                reason: "Based on your interest in products from the Electronics category"
                    .to_string(),
            }])
            .await
            .expect("upsert");

        let snapshot =
            export_all(&BoundedStore::new(store, Duration::from_secs(5))).await.expect("export");

        assert_eq!(snapshot.statistics.total_promotions, 1);
        assert_eq!(snapshot.promotions[0].user_id, walk_in);
        assert!(snapshot.users.iter().all(|user| user.id != walk_in));
    }

    #[tokio::test]
    async fn user_export_only_contains_that_user() {
        let snapshot =
            export_user(&seeded().await, &UserId("user-joao".to_string())).await.expect("export");

        assert_eq!(snapshot.user.as_ref().map(|user| user.name.as_str()), Some("João Silva"));
        assert_eq!(snapshot.views.len(), 2);
        assert!(snapshot.views.iter().all(|view| view.user_id.as_str() == "user-joao"));
        assert!(snapshot.purchases.is_empty());
    }
}
