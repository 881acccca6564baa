//! Behavior store contract consumed by the engine.
//!
//! The engine never talks to a database directly: it receives an `Arc<dyn BehaviorStore>`
//! and wraps it in a [`BoundedStore`], which puts a deadline on every call.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::activity::{PurchaseEvent, ViewEvent};
use crate::domain::product::{Product, ProductId};
use crate::domain::promotion::Promotion;
use crate::domain::user::{User, UserId};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store call `{operation}` timed out after {elapsed_ms}ms")]
    Timeout { operation: &'static str, elapsed_ms: u64 },
    #[error("store decode error: {0}")]
    Decode(String),
}

/// Row of a group-by-product count aggregate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCount {
    pub product_id: ProductId,
    pub count: u64,
}

#[async_trait]
pub trait BehaviorStore: Send + Sync {
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
    async fn find_user(&self, id: &UserId) -> Result<Option<User>, StoreError>;
    async fn save_users(&self, users: Vec<User>) -> Result<(), StoreError>;

    /// Ordered by product id.
    async fn list_products(&self) -> Result<Vec<Product>, StoreError>;
    /// Missing ids are omitted from the result rather than reported.
    async fn products_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError>;
    /// Ordered by product id.
    async fn products_in_categories(
        &self,
        categories: &[String],
    ) -> Result<Vec<Product>, StoreError>;
    async fn save_products(&self, products: Vec<Product>) -> Result<(), StoreError>;

    async fn record_view(&self, view: ViewEvent) -> Result<(), StoreError>;
    /// Newest first; ties keep the most recently inserted event first.
    async fn recent_views_for_user(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<ViewEvent>, StoreError>;
    /// Same ordering as `recent_views_for_user`.
    async fn views_for_products(
        &self,
        product_ids: &[ProductId],
    ) -> Result<Vec<ViewEvent>, StoreError>;
    /// Same ordering as `recent_views_for_user`.
    async fn views_for_users(&self, user_ids: &[UserId]) -> Result<Vec<ViewEvent>, StoreError>;
    async fn list_views(&self) -> Result<Vec<ViewEvent>, StoreError>;

    async fn record_purchase(&self, purchase: PurchaseEvent) -> Result<(), StoreError>;
    async fn purchases_for_user(&self, user_id: &UserId)
        -> Result<Vec<PurchaseEvent>, StoreError>;
    async fn list_purchases(&self) -> Result<Vec<PurchaseEvent>, StoreError>;

    /// Inserts or replaces by promotion id, all or nothing.
    async fn upsert_promotions(&self, promotions: Vec<Promotion>) -> Result<(), StoreError>;
    /// Newest `generated_at` first.
    async fn promotions_for_user(&self, user_id: &UserId) -> Result<Vec<Promotion>, StoreError>;
    /// Every stored promotion, registered user or not. Ordered by user id, then newest first.
    async fn list_promotions(&self) -> Result<Vec<Promotion>, StoreError>;

    /// Descending by count, ties by product id.
    async fn view_counts_by_product(&self, limit: usize) -> Result<Vec<ProductCount>, StoreError>;
    async fn purchase_counts_by_product(
        &self,
        limit: usize,
    ) -> Result<Vec<ProductCount>, StoreError>;
}

/// Runs a store future under a deadline, mapping expiry to [`StoreError::Timeout`].
pub async fn with_timeout<T, F>(
    limit: Duration,
    operation: &'static str,
    future: F,
) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout {
            operation,
            elapsed_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

/// Shared store handle whose every call is bounded by `call_timeout`.
#[derive(Clone)]
pub struct BoundedStore {
    inner: Arc<dyn BehaviorStore>,
    call_timeout: Duration,
}

impl BoundedStore {
    pub fn new(inner: Arc<dyn BehaviorStore>, call_timeout: Duration) -> Self {
        Self { inner, call_timeout }
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    pub fn inner(&self) -> &Arc<dyn BehaviorStore> {
        &self.inner
    }

    pub async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        with_timeout(self.call_timeout, "list_users", self.inner.list_users()).await
    }

    pub async fn find_user(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        with_timeout(self.call_timeout, "find_user", self.inner.find_user(id)).await
    }

    pub async fn save_users(&self, users: Vec<User>) -> Result<(), StoreError> {
        with_timeout(self.call_timeout, "save_users", self.inner.save_users(users)).await
    }

    pub async fn save_products(&self, products: Vec<Product>) -> Result<(), StoreError> {
        with_timeout(self.call_timeout, "save_products", self.inner.save_products(products)).await
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        with_timeout(self.call_timeout, "list_products", self.inner.list_products()).await
    }

    pub async fn products_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        with_timeout(self.call_timeout, "products_by_ids", self.inner.products_by_ids(ids)).await
    }

    pub async fn products_in_categories(
        &self,
        categories: &[String],
    ) -> Result<Vec<Product>, StoreError> {
        if categories.is_empty() {
            return Ok(Vec::new());
        }
        with_timeout(
            self.call_timeout,
            "products_in_categories",
            self.inner.products_in_categories(categories),
        )
        .await
    }

    pub async fn record_view(&self, view: ViewEvent) -> Result<(), StoreError> {
        with_timeout(self.call_timeout, "record_view", self.inner.record_view(view)).await
    }

    pub async fn recent_views_for_user(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<ViewEvent>, StoreError> {
        with_timeout(
            self.call_timeout,
            "recent_views_for_user",
            self.inner.recent_views_for_user(user_id, limit),
        )
        .await
    }

    pub async fn views_for_products(
        &self,
        product_ids: &[ProductId],
    ) -> Result<Vec<ViewEvent>, StoreError> {
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }
        with_timeout(
            self.call_timeout,
            "views_for_products",
            self.inner.views_for_products(product_ids),
        )
        .await
    }

    pub async fn views_for_users(&self, user_ids: &[UserId]) -> Result<Vec<ViewEvent>, StoreError> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        with_timeout(self.call_timeout, "views_for_users", self.inner.views_for_users(user_ids))
            .await
    }

    pub async fn list_views(&self) -> Result<Vec<ViewEvent>, StoreError> {
        with_timeout(self.call_timeout, "list_views", self.inner.list_views()).await
    }

    pub async fn record_purchase(&self, purchase: PurchaseEvent) -> Result<(), StoreError> {
        with_timeout(self.call_timeout, "record_purchase", self.inner.record_purchase(purchase))
            .await
    }

    pub async fn purchases_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<PurchaseEvent>, StoreError> {
        with_timeout(
            self.call_timeout,
            "purchases_for_user",
            self.inner.purchases_for_user(user_id),
        )
        .await
    }

    pub async fn list_purchases(&self) -> Result<Vec<PurchaseEvent>, StoreError> {
        with_timeout(self.call_timeout, "list_purchases", self.inner.list_purchases()).await
    }

    pub async fn upsert_promotions(&self, promotions: Vec<Promotion>) -> Result<(), StoreError> {
        if promotions.is_empty() {
            return Ok(());
        }
        with_timeout(
            self.call_timeout,
            "upsert_promotions",
            self.inner.upsert_promotions(promotions),
        )
        .await
    }

    pub async fn promotions_for_user(&self, user_id: &UserId) -> Result<Vec<Promotion>, StoreError> {
        with_timeout(
            self.call_timeout,
            "promotions_for_user",
            self.inner.promotions_for_user(user_id),
        )
        .await
    }

    pub async fn list_promotions(&self) -> Result<Vec<Promotion>, StoreError> {
        with_timeout(self.call_timeout, "list_promotions", self.inner.list_promotions()).await
    }

    pub async fn view_counts_by_product(
        &self,
        limit: usize,
    ) -> Result<Vec<ProductCount>, StoreError> {
        with_timeout(
            self.call_timeout,
            "view_counts_by_product",
            self.inner.view_counts_by_product(limit),
        )
        .await
    }

    pub async fn purchase_counts_by_product(
        &self,
        limit: usize,
    ) -> Result<Vec<ProductCount>, StoreError> {
        with_timeout(
            self.call_timeout,
            "purchase_counts_by_product",
            self.inner.purchase_counts_by_product(limit),
        )
        .await
    }
}

impl std::fmt::Debug for BoundedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedStore").field("call_timeout", &self.call_timeout).finish()
    }
}
