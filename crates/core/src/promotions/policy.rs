use chrono::{DateTime, Duration, Utc};

use crate::config::PromotionConfig;
use crate::domain::product::Product;
use crate::domain::promotion::{Promotion, PromotionId};
use crate::domain::user::UserId;

pub const DEFAULT_DISCOUNT_PCT: u8 = 10;
pub const DEFAULT_VALIDITY_DAYS: u32 = 7;
pub const DEFAULT_MAX_PER_USER: usize = 5;

/// Offer terms applied to every generated promotion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PromotionPolicy {
    pub discount_pct: u8,
    pub validity_days: u32,
    pub max_per_user: usize,
}

impl Default for PromotionPolicy {
    fn default() -> Self {
        Self {
            discount_pct: DEFAULT_DISCOUNT_PCT,
            validity_days: DEFAULT_VALIDITY_DAYS,
            max_per_user: DEFAULT_MAX_PER_USER,
        }
    }
}

impl From<&PromotionConfig> for PromotionPolicy {
    fn from(config: &PromotionConfig) -> Self {
        Self {
            discount_pct: config.discount_pct,
            validity_days: config.validity_days,
            max_per_user: config.max_per_user,
        }
    }
}

impl PromotionPolicy {
    pub fn validity(&self) -> Duration {
        Duration::days(i64::from(self.validity_days))
    }

    pub fn offer_for(&self, user_id: &UserId, product: &Product, now: DateTime<Utc>) -> Promotion {
        Promotion {
            id: PromotionId::for_pair(user_id, &product.id),
            user_id: user_id.clone(),
            product_id: product.id.clone(),
            discount_pct: self.discount_pct,
            valid_until: now + self.validity(),
            generated_at: now,
            reason: format!(
                "Based on your interest in products from the {} category",
                product.category
            ),
        }
    }
}
