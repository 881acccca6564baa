use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::product::ProductId;
use crate::domain::user::UserId;

/// Namespace for promotion identifiers. Changing it re-keys every stored promotion.
const PROMOTION_NAMESPACE: Uuid = Uuid::from_u128(0x5f0c_2a4e_9d1b_4c7a_8e36_1b7d_04a9_c2e1);

/// Separates the two key components; it cannot appear in a well-formed identifier.
const KEY_SEPARATOR: char = '\u{1f}';

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PromotionId(pub String);

impl PromotionId {
    /// Derives the promotion key for a `(user, product)` pair.
    ///
    /// The key is a UUIDv5 over `user_id`, a unit separator, and `product_id`, so the same
    /// pair always yields the same id and a regeneration overwrites the earlier offer
    /// instead of adding a second one. Using a separator that never occurs in ids keeps
    /// `("a_b", "c")` and `("a", "b_c")` apart.
    pub fn for_pair(user_id: &UserId, product_id: &ProductId) -> Self {
        let name = format!("{}{KEY_SEPARATOR}{}", user_id.as_str(), product_id.as_str());
        Self(Uuid::new_v5(&PROMOTION_NAMESPACE, name.as_bytes()).to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promotion {
    pub id: PromotionId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub discount_pct: u8,
    pub valid_until: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    pub reason: String,
}

impl Promotion {
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_until > now
    }
}
