use std::collections::{BTreeMap, HashMap};

use tokio::sync::RwLock;

use shopsense_core::domain::activity::{PurchaseEvent, ViewEvent};
use shopsense_core::domain::product::{Product, ProductId};
use shopsense_core::domain::promotion::Promotion;
use shopsense_core::domain::user::{User, UserId};
use shopsense_core::store::{BehaviorStore, ProductCount, StoreError};

/// Process-local store for tests and demos. Same ordering contract as the SQL store.
#[derive(Default)]
pub struct InMemoryBehaviorStore {
    users: RwLock<BTreeMap<String, User>>,
    products: RwLock<BTreeMap<String, Product>>,
    views: RwLock<Vec<ViewEvent>>,
    purchases: RwLock<Vec<PurchaseEvent>>,
    promotions: RwLock<HashMap<String, Promotion>>,
}

impl InMemoryBehaviorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Newest first; among equal timestamps the latest insert wins.
fn views_newest_first<'a>(views: impl DoubleEndedIterator<Item = &'a ViewEvent>) -> Vec<ViewEvent> {
    let mut ordered: Vec<ViewEvent> = views.rev().cloned().collect();
    ordered.sort_by(|left, right| right.viewed_at.cmp(&left.viewed_at));
    ordered
}

fn top_counts<'a>(ids: impl Iterator<Item = &'a ProductId>, limit: usize) -> Vec<ProductCount> {
    let mut counts: HashMap<&ProductId, u64> = HashMap::new();
    for id in ids {
        *counts.entry(id).or_default() += 1;
    }

    let mut rows: Vec<ProductCount> = counts
        .into_iter()
        .map(|(product_id, count)| ProductCount { product_id: product_id.clone(), count })
        .collect();
    rows.sort_by(|left, right| {
        right.count.cmp(&left.count).then_with(|| left.product_id.cmp(&right.product_id))
    });
    rows.truncate(limit);
    rows
}

#[async_trait::async_trait]
impl BehaviorStore for InMemoryBehaviorStore {
    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.users.read().await.values().cloned().collect())
    }

    async fn find_user(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id.0).cloned())
    }

    async fn save_users(&self, users: Vec<User>) -> Result<(), StoreError> {
        let mut stored = self.users.write().await;
        for user in users {
            stored.insert(user.id.0.clone(), user);
        }
        Ok(())
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        Ok(self.products.read().await.values().cloned().collect())
    }

    async fn products_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        let products = self.products.read().await;
        Ok(products.values().filter(|product| ids.contains(&product.id)).cloned().collect())
    }

    async fn products_in_categories(
        &self,
        categories: &[String],
    ) -> Result<Vec<Product>, StoreError> {
        let products = self.products.read().await;
        Ok(products
            .values()
            .filter(|product| categories.contains(&product.category))
            .cloned()
            .collect())
    }

    async fn save_products(&self, products: Vec<Product>) -> Result<(), StoreError> {
        let mut stored = self.products.write().await;
        for product in products {
            stored.insert(product.id.0.clone(), product);
        }
        Ok(())
    }

    async fn record_view(&self, view: ViewEvent) -> Result<(), StoreError> {
        self.views.write().await.push(view);
        Ok(())
    }

    async fn recent_views_for_user(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<ViewEvent>, StoreError> {
        let views = self.views.read().await;
        let mut recent = views_newest_first(views.iter().filter(|view| &view.user_id == user_id));
        recent.truncate(limit);
        Ok(recent)
    }

    async fn views_for_products(
        &self,
        product_ids: &[ProductId],
    ) -> Result<Vec<ViewEvent>, StoreError> {
        let views = self.views.read().await;
        Ok(views_newest_first(views.iter().filter(|view| product_ids.contains(&view.product_id))))
    }

    async fn views_for_users(&self, user_ids: &[UserId]) -> Result<Vec<ViewEvent>, StoreError> {
        let views = self.views.read().await;
        Ok(views_newest_first(views.iter().filter(|view| user_ids.contains(&view.user_id))))
    }

    async fn list_views(&self) -> Result<Vec<ViewEvent>, StoreError> {
        let views = self.views.read().await;
        Ok(views_newest_first(views.iter()))
    }

    async fn record_purchase(&self, purchase: PurchaseEvent) -> Result<(), StoreError> {
        self.purchases.write().await.push(purchase);
        Ok(())
    }

    async fn purchases_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<PurchaseEvent>, StoreError> {
        let purchases = self.purchases.read().await;
        let mut owned: Vec<PurchaseEvent> =
            purchases.iter().rev().filter(|purchase| &purchase.user_id == user_id).cloned().collect();
        owned.sort_by(|left, right| right.purchased_at.cmp(&left.purchased_at));
        Ok(owned)
    }

    async fn list_purchases(&self) -> Result<Vec<PurchaseEvent>, StoreError> {
        let purchases = self.purchases.read().await;
        let mut all: Vec<PurchaseEvent> = purchases.iter().rev().cloned().collect();
        all.sort_by(|left, right| right.purchased_at.cmp(&left.purchased_at));
        Ok(all)
    }

    async fn upsert_promotions(&self, promotions: Vec<Promotion>) -> Result<(), StoreError> {
        let mut stored = self.promotions.write().await;
        for promotion in promotions {
            stored.insert(promotion.id.0.clone(), promotion);
        }
        Ok(())
    }

    async fn promotions_for_user(&self, user_id: &UserId) -> Result<Vec<Promotion>, StoreError> {
        let stored = self.promotions.read().await;
        let mut owned: Vec<Promotion> =
            stored.values().filter(|promotion| &promotion.user_id == user_id).cloned().collect();
        owned.sort_by(|left, right| {
            right.generated_at.cmp(&left.generated_at).then_with(|| left.id.cmp(&right.id))
        });
        Ok(owned)
    }

    async fn list_promotions(&self) -> Result<Vec<Promotion>, StoreError> {
        let stored = self.promotions.read().await;
        let mut all: Vec<Promotion> = stored.values().cloned().collect();
        all.sort_by(|left, right| {
            left.user_id
                .cmp(&right.user_id)
                .then_with(|| right.generated_at.cmp(&left.generated_at))
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(all)
    }

    async fn view_counts_by_product(&self, limit: usize) -> Result<Vec<ProductCount>, StoreError> {
        let views = self.views.read().await;
        Ok(top_counts(views.iter().map(|view| &view.product_id), limit))
    }

    async fn purchase_counts_by_product(
        &self,
        limit: usize,
    ) -> Result<Vec<ProductCount>, StoreError> {
        let purchases = self.purchases.read().await;
        Ok(top_counts(purchases.iter().map(|purchase| &purchase.product_id), limit))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use shopsense_core::domain::activity::{ViewEvent, ViewEventId};
    use shopsense_core::domain::product::{Product, ProductId};
    use shopsense_core::domain::user::UserId;
    use shopsense_core::store::BehaviorStore;

    use super::InMemoryBehaviorStore;

    fn view(id: &str, user: &str, product_id: &str, minute: u32) -> ViewEvent {
        ViewEvent {
            id: ViewEventId(id.to_string()),
            user_id: UserId(user.to_string()),
            product_id: ProductId(product_id.to_string()),
            viewed_at: Utc.with_ymd_and_hms(2026, 4, 2, 10, minute, 0).single().expect("valid"),
            view_duration_secs: 15,
        }
    }

    #[tokio::test]
    async fn in_memory_product_store_round_trip() {
        let store = InMemoryBehaviorStore::new();
        let product = Product {
            id: ProductId("p-2".to_string()),
            name: "Dell Inspiron".to_string(),
            category: "Electronics".to_string(),
            tags: ["laptop".to_string()].into_iter().collect(),
            price: Decimal::new(459_999, 2),
            description: String::new(),
        };

        store.save_products(vec![product.clone()]).await.expect("save product");
        let found = store.products_by_ids(&[product.id.clone()]).await.expect("find product");

        assert_eq!(found, vec![product]);
    }

    #[tokio::test]
    async fn recent_views_break_ties_by_latest_insert() {
        let store = InMemoryBehaviorStore::new();
        store.record_view(view("v-1", "u-1", "p-1", 4)).await.expect("record");
        store.record_view(view("v-2", "u-1", "p-2", 4)).await.expect("record");
        store.record_view(view("v-3", "u-1", "p-3", 1)).await.expect("record");

        let recent = store.recent_views_for_user(&UserId("u-1".to_string()), 10).await.expect("load");
        let ids: Vec<&str> = recent.iter().map(|view| view.id.0.as_str()).collect();

        assert_eq!(ids, vec!["v-2", "v-1", "v-3"]);
    }

    #[tokio::test]
    async fn view_counts_rank_by_count_then_product_id() {
        let store = InMemoryBehaviorStore::new();
        for (id, product_id) in [("v-1", "p-z"), ("v-2", "p-y"), ("v-3", "p-z"), ("v-4", "p-y")] {
            store.record_view(view(id, "u-1", product_id, 1)).await.expect("record");
        }

        let counts = store.view_counts_by_product(10).await.expect("counts");
        let order: Vec<&str> = counts.iter().map(|row| row.product_id.as_str()).collect();

        assert_eq!(order, vec!["p-y", "p-z"]);
    }
}
