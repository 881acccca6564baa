//! Deterministic demo dataset used by `shopsense seed` and the integration tests.

use std::collections::HashSet;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use shopsense_core::domain::activity::{PurchaseEvent, PurchaseEventId, ViewEvent, ViewEventId};
use shopsense_core::domain::product::{Product, ProductId};
use shopsense_core::domain::user::{User, UserId};
use shopsense_core::store::{BehaviorStore, StoreError};

struct SeedProduct {
    id: &'static str,
    name: &'static str,
    category: &'static str,
    tags: &'static [&'static str],
    price_cents: i64,
    description: &'static str,
}

struct SeedUser {
    id: &'static str,
    name: &'static str,
    email: &'static str,
}

struct SeedView {
    id: &'static str,
    user_id: &'static str,
    product_id: &'static str,
    minutes_after_base: i64,
    duration_secs: u32,
}

struct SeedPurchase {
    id: &'static str,
    user_id: &'static str,
    product_id: &'static str,
    minutes_after_base: i64,
    amount_cents: i64,
}

const SEED_PRODUCTS: &[SeedProduct] = &[
    SeedProduct {
        id: "prod-galaxy-s21",
        name: "Samsung Galaxy S21",
        category: "Electronics",
        tags: &["smartphone", "samsung", "android"],
        price_cents: 399_999,
        description: "Android flagship smartphone",
    },
    SeedProduct {
        id: "prod-dell-inspiron",
        name: "Dell Inspiron Notebook",
        category: "Electronics",
        tags: &["notebook", "dell", "windows"],
        price_cents: 459_999,
        description: "15 inch notebook for work and study",
    },
    SeedProduct {
        id: "prod-pixel-8",
        name: "Google Pixel 8",
        category: "Electronics",
        tags: &["smartphone", "google", "android"],
        price_cents: 349_900,
        description: "Android smartphone with a clean OS build",
    },
    SeedProduct {
        id: "prod-nike-air-max",
        name: "Nike Air Max",
        category: "Footwear",
        tags: &["sneaker", "nike", "running"],
        price_cents: 59_999,
        description: "Cushioned running sneaker",
    },
    SeedProduct {
        id: "prod-ultraboost",
        name: "Adidas Ultraboost",
        category: "Footwear",
        tags: &["sneaker", "adidas", "running"],
        price_cents: 79_990,
        description: "Responsive running shoe",
    },
];

const SEED_USERS: &[SeedUser] = &[
    SeedUser { id: "user-joao", name: "João Silva", email: "joao@example.com" },
    SeedUser { id: "user-maria", name: "Maria Santos", email: "maria@example.com" },
    SeedUser { id: "user-pedro", name: "Pedro Oliveira", email: "pedro@example.com" },
];

const SEED_VIEWS: &[SeedView] = &[
    SeedView {
        id: "view-seed-001",
        user_id: "user-joao",
        product_id: "prod-galaxy-s21",
        minutes_after_base: 10,
        duration_secs: 120,
    },
    SeedView {
        id: "view-seed-002",
        user_id: "user-joao",
        product_id: "prod-dell-inspiron",
        minutes_after_base: 20,
        duration_secs: 45,
    },
    SeedView {
        id: "view-seed-003",
        user_id: "user-maria",
        product_id: "prod-galaxy-s21",
        minutes_after_base: 30,
        duration_secs: 50,
    },
    SeedView {
        id: "view-seed-004",
        user_id: "user-maria",
        product_id: "prod-pixel-8",
        minutes_after_base: 40,
        duration_secs: 300,
    },
    SeedView {
        id: "view-seed-005",
        user_id: "user-pedro",
        product_id: "prod-nike-air-max",
        minutes_after_base: 50,
        duration_secs: 90,
    },
];

const SEED_PURCHASES: &[SeedPurchase] = &[
    SeedPurchase {
        id: "purchase-seed-001",
        user_id: "user-pedro",
        product_id: "prod-nike-air-max",
        minutes_after_base: 55,
        amount_cents: 59_999,
    },
    SeedPurchase {
        id: "purchase-seed-002",
        user_id: "user-maria",
        product_id: "prod-galaxy-s21",
        minutes_after_base: 60,
        amount_cents: 399_999,
    },
];

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SeedResult {
    pub users: usize,
    pub products: usize,
    pub views_inserted: usize,
    pub purchases_inserted: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

pub struct DemoDataset;

impl DemoDataset {
    pub const USER_IDS: &'static [&'static str] = &["user-joao", "user-maria", "user-pedro"];

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).single().unwrap_or(DateTime::UNIX_EPOCH)
    }

    pub fn users() -> Vec<User> {
        SEED_USERS
            .iter()
            .map(|seed| User {
                id: UserId(seed.id.to_string()),
                name: seed.name.to_string(),
                email: seed.email.to_string(),
                registered_at: Self::base_time() - Duration::days(30),
            })
            .collect()
    }

    pub fn products() -> Vec<Product> {
        SEED_PRODUCTS
            .iter()
            .map(|seed| Product {
                id: ProductId(seed.id.to_string()),
                name: seed.name.to_string(),
                category: seed.category.to_string(),
                tags: seed.tags.iter().map(|tag| tag.to_string()).collect(),
                price: Decimal::new(seed.price_cents, 2),
                description: seed.description.to_string(),
            })
            .collect()
    }

    pub fn views() -> Vec<ViewEvent> {
        SEED_VIEWS
            .iter()
            .map(|seed| ViewEvent {
                id: ViewEventId(seed.id.to_string()),
                user_id: UserId(seed.user_id.to_string()),
                product_id: ProductId(seed.product_id.to_string()),
                viewed_at: Self::base_time() + Duration::minutes(seed.minutes_after_base),
                view_duration_secs: seed.duration_secs,
            })
            .collect()
    }

    pub fn purchases() -> Vec<PurchaseEvent> {
        SEED_PURCHASES
            .iter()
            .map(|seed| PurchaseEvent {
                id: PurchaseEventId(seed.id.to_string()),
                user_id: UserId(seed.user_id.to_string()),
                product_id: ProductId(seed.product_id.to_string()),
                purchased_at: Self::base_time() + Duration::minutes(seed.minutes_after_base),
                amount: Decimal::new(seed.amount_cents, 2),
            })
            .collect()
    }

    /// Loads the dataset. Users and products are upserted; events already present are
    /// skipped, so running it twice leaves the store unchanged.
    pub async fn load(store: &dyn BehaviorStore) -> Result<SeedResult, StoreError> {
        let users = Self::users();
        let products = Self::products();
        let result_users = users.len();
        let result_products = products.len();
        store.save_users(users).await?;
        store.save_products(products).await?;

        let known_views: HashSet<String> =
            store.list_views().await?.into_iter().map(|view| view.id.0).collect();
        let mut views_inserted = 0;
        for view in Self::views() {
            if !known_views.contains(&view.id.0) {
                store.record_view(view).await?;
                views_inserted += 1;
            }
        }

        let known_purchases: HashSet<String> =
            store.list_purchases().await?.into_iter().map(|purchase| purchase.id.0).collect();
        let mut purchases_inserted = 0;
        for purchase in Self::purchases() {
            if !known_purchases.contains(&purchase.id.0) {
                store.record_purchase(purchase).await?;
                purchases_inserted += 1;
            }
        }

        Ok(SeedResult {
            users: result_users,
            products: result_products,
            views_inserted,
            purchases_inserted,
        })
    }

    pub async fn verify(store: &dyn BehaviorStore) -> Result<VerificationResult, StoreError> {
        let mut checks = Vec::new();

        let user_ids: HashSet<String> =
            store.list_users().await?.into_iter().map(|user| user.id.0).collect();
        checks.push(("seed-users", SEED_USERS.iter().all(|seed| user_ids.contains(seed.id))));

        let expected_products: Vec<ProductId> =
            SEED_PRODUCTS.iter().map(|seed| ProductId(seed.id.to_string())).collect();
        let found_products = store.products_by_ids(&expected_products).await?;
        checks.push(("seed-products", found_products.len() == expected_products.len()));

        let view_ids: HashSet<String> =
            store.list_views().await?.into_iter().map(|view| view.id.0).collect();
        checks.push(("seed-views", SEED_VIEWS.iter().all(|seed| view_ids.contains(seed.id))));

        let purchase_ids: HashSet<String> =
            store.list_purchases().await?.into_iter().map(|purchase| purchase.id.0).collect();
        checks.push((
            "seed-purchases",
            SEED_PURCHASES.iter().all(|seed| purchase_ids.contains(seed.id)),
        ));

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }
}
