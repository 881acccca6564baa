use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::{Product, ProductId};
use crate::domain::user::UserId;

pub const EMPTY_PROFILE_MESSAGE: &str =
    "No recent views or purchases to base recommendations on yet";

pub const NO_SIMILAR_USERS_MESSAGE: &str =
    "No other shoppers have viewed the products this user viewed";

/// Outcome of a peer-scored recommendation request.
///
/// `EmptyProfile` and `NoSimilarUsers` are terminal states, not failures.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecommendationResult {
    Ok { user_id: UserId, recommendations: Vec<Recommendation> },
    EmptyProfile { user_id: UserId, message: String },
    NoSimilarUsers { user_id: UserId, message: String },
}

impl RecommendationResult {
    pub fn status(&self) -> &'static str {
        match self {
            Self::Ok { .. } => "ok",
            Self::EmptyProfile { .. } => "empty_profile",
            Self::NoSimilarUsers { .. } => "no_similar_users",
        }
    }

    pub fn recommendations(&self) -> &[Recommendation] {
        match self {
            Self::Ok { recommendations, .. } => recommendations,
            Self::EmptyProfile { .. } | Self::NoSimilarUsers { .. } => &[],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub product: Product,
    pub score: u64,
    pub peer_view_count: u64,
    pub peer_view_secs: u64,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowseSuggestion {
    pub product: Product,
    pub reason: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBand {
    pub min: Decimal,
    pub max: Decimal,
    pub mean: Decimal,
}

impl PriceBand {
    pub fn contains(&self, price: Decimal) -> bool {
        price >= self.min && price <= self.max
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowseStats {
    pub total_views: usize,
    pub distinct_categories: usize,
    pub price_band: Option<PriceBand>,
}

/// Self-history suggestions built from the user's most recent views.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BrowseResult {
    Ok {
        user_id: UserId,
        recently_viewed: Vec<Product>,
        similar_products: Vec<BrowseSuggestion>,
        price_band_products: Vec<BrowseSuggestion>,
        stats: BrowseStats,
    },
    EmptyProfile { user_id: UserId, message: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopularProduct {
    pub product_id: ProductId,
    pub purchase_count: u64,
    /// `None` when the product no longer exists in the catalog.
    pub product: Option<Product>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendingProduct {
    pub product: Product,
    pub view_count: u64,
}
