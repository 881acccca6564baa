//! Validation and recording of incoming behavior and catalog writes.

use std::collections::BTreeSet;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::domain::activity::{PurchaseEvent, PurchaseEventId, ViewEvent, ViewEventId};
use crate::domain::product::{Product, ProductId};
use crate::domain::user::UserId;
use crate::errors::EngineError;
use crate::scheduler::{RegenerationScheduler, TriggerOutcome};
use crate::store::BoundedStore;

#[derive(Clone, Debug, Deserialize)]
pub struct NewView {
    pub user_id: String,
    pub product_id: String,
    #[serde(default)]
    pub view_duration_secs: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewPurchase {
    pub user_id: String,
    pub product_id: String,
    pub amount: Decimal,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewProduct {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub price: Decimal,
    #[serde(default)]
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewReceipt {
    pub view: ViewEvent,
    pub trigger: TriggerOutcome,
}

#[derive(Clone, Debug)]
pub struct ActivityIngestor {
    store: BoundedStore,
    scheduler: RegenerationScheduler,
}

impl ActivityIngestor {
    pub fn new(store: BoundedStore, scheduler: RegenerationScheduler) -> Self {
        Self { store, scheduler }
    }

    /// Appends the view, then fires the view trigger for its user.
    ///
    /// A failed regeneration shows up in the receipt; the call still succeeds.
    pub async fn record_view(&self, request: NewView) -> Result<ViewReceipt, EngineError> {
        let user_id = required_id("user_id", &request.user_id)?;
        let product_id = required_id("product_id", &request.product_id)?;

        let view = ViewEvent {
            id: ViewEventId(Uuid::new_v4().to_string()),
            user_id: UserId(user_id),
            product_id: ProductId(product_id),
            viewed_at: Utc::now(),
            view_duration_secs: request.view_duration_secs,
        };
        self.store.record_view(view.clone()).await?;

        info!(
            event_name = "ingest.view.recorded",
            user_id = %view.user_id,
            product_id = %view.product_id,
            view_duration_secs = view.view_duration_secs,
            "view recorded"
        );

        let trigger = self.scheduler.on_view_recorded(&view.user_id).await;
        Ok(ViewReceipt { view, trigger })
    }

    pub async fn record_purchase(&self, request: NewPurchase) -> Result<PurchaseEvent, EngineError> {
        let user_id = required_id("user_id", &request.user_id)?;
        let product_id = required_id("product_id", &request.product_id)?;
        if request.amount.is_sign_negative() {
            return Err(EngineError::InvalidInput("amount must not be negative".to_string()));
        }

        let purchase = PurchaseEvent {
            id: PurchaseEventId(Uuid::new_v4().to_string()),
            user_id: UserId(user_id),
            product_id: ProductId(product_id),
            purchased_at: Utc::now(),
            amount: request.amount,
        };
        self.store.record_purchase(purchase.clone()).await?;

        info!(
            event_name = "ingest.purchase.recorded",
            user_id = %purchase.user_id,
            product_id = %purchase.product_id,
            "purchase recorded"
        );
        Ok(purchase)
    }

    pub async fn create_product(&self, request: NewProduct) -> Result<Product, EngineError> {
        let product = validate_product(request)?;
        self.store.save_products(vec![product.clone()]).await?;

        info!(
            event_name = "ingest.product.created",
            product_id = %product.id,
            category = %product.category,
            "product created"
        );
        Ok(product)
    }
}

fn required_id(field: &str, value: &str) -> Result<String, EngineError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidInput(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn required_text(field: &str, value: String) -> Result<String, EngineError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidInput(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

pub fn validate_product(request: NewProduct) -> Result<Product, EngineError> {
    let name = required_text("name", request.name)?;
    let category = required_text("category", request.category)?;
    if request.price <= Decimal::ZERO {
        return Err(EngineError::InvalidInput("price must be greater than zero".to_string()));
    }

    let id = match request.id {
        Some(id) if !id.trim().is_empty() => id.trim().to_string(),
        _ => Uuid::new_v4().to_string(),
    };

    Ok(Product {
        id: ProductId(id),
        name,
        category,
        tags: request.tags,
        price: request.price,
        description: request.description,
    })
}
