//! Behavioral events recorded by ingestion. Both kinds are append-only.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::ProductId;
use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewEventId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PurchaseEventId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewEvent {
    pub id: ViewEventId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub viewed_at: DateTime<Utc>,
    pub view_duration_secs: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseEvent {
    pub id: PurchaseEventId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub purchased_at: DateTime<Utc>,
    pub amount: Decimal,
}
