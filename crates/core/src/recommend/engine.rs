use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use tracing::info;

use crate::domain::product::{Product, ProductId};
use crate::domain::user::UserId;
use crate::errors::EngineError;
use crate::recommend::affinity::{self, AffinityProfile};
use crate::recommend::candidates::{self, Exclusion};
use crate::recommend::scoring;
use crate::recommend::types::{
    BrowseResult, BrowseStats, BrowseSuggestion, PopularProduct, PriceBand, Recommendation,
    RecommendationResult, TrendingProduct, EMPTY_PROFILE_MESSAGE, NO_SIMILAR_USERS_MESSAGE,
};
use crate::recommend::{
    RecommendationSettings, BROWSE_PRICE_BAND_LIMIT, BROWSE_SIMILAR_LIMIT, PRICE_BAND_SPREAD_PCT,
};
use crate::store::BoundedStore;

#[derive(Clone, Debug)]
pub struct RecommendationEngine {
    store: BoundedStore,
    settings: RecommendationSettings,
}

impl RecommendationEngine {
    pub fn new(store: BoundedStore, settings: RecommendationSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> RecommendationSettings {
        self.settings
    }

    /// Ranks products viewed by similar shoppers.
    ///
    /// A store failure anywhere in the pipeline fails the whole call; no partial ranking is
    /// returned.
    pub async fn recommend(&self, user_id: &UserId) -> Result<RecommendationResult, EngineError> {
        let profile =
            affinity::extract(&self.store, user_id, self.settings.recent_view_window).await?;
        if profile.is_empty() {
            info!(
                event_name = "engine.recommend.empty_profile",
                user_id = %user_id,
                "no basis for personalization"
            );
            return Ok(RecommendationResult::EmptyProfile {
                user_id: user_id.clone(),
                message: EMPTY_PROFILE_MESSAGE.to_string(),
            });
        }

        let overlapping = self.store.views_for_products(&profile.viewed_list()).await?;
        let peers = candidates::similar_users(&overlapping, user_id);
        if peers.is_empty() {
            info!(
                event_name = "engine.recommend.no_similar_users",
                user_id = %user_id,
                viewed_products = profile.viewed_product_ids.len(),
                "no peer overlap"
            );
            return Ok(RecommendationResult::NoSimilarUsers {
                user_id: user_id.clone(),
                message: NO_SIMILAR_USERS_MESSAGE.to_string(),
            });
        }

        let peer_views: Vec<_> = self
            .store
            .views_for_users(&peers)
            .await?
            .into_iter()
            .filter(|view| !profile.viewed_product_ids.contains(&view.product_id))
            .collect();
        let referenced = candidates::distinct_product_ids(&peer_views);
        let products = self.store.products_by_ids(&referenced).await?;

        let selected =
            candidates::peer_candidates(&peer_views, &products, &profile, self.settings.candidate_cap);
        let mut ranked = scoring::rank(selected, &peer_views);
        ranked.truncate(self.settings.max_results);

        let recommendations: Vec<Recommendation> = ranked
            .into_iter()
            .map(|candidate| Recommendation {
                reason: format!(
                    "Viewed {} time(s) by similar shoppers for a total of {}s",
                    candidate.evidence.frequency, candidate.evidence.total_time_secs
                ),
                score: candidate.score,
                peer_view_count: candidate.evidence.frequency,
                peer_view_secs: candidate.evidence.total_time_secs,
                product: candidate.product,
            })
            .collect();

        info!(
            event_name = "engine.recommend.completed",
            user_id = %user_id,
            similar_users = peers.len(),
            recommendations = recommendations.len(),
            dropped_references = profile.dropped_references,
            "recommendations ranked"
        );

        Ok(RecommendationResult::Ok { user_id: user_id.clone(), recommendations })
    }

    /// Suggestions drawn from the user's own recent browsing.
    pub async fn browse(&self, user_id: &UserId) -> Result<BrowseResult, EngineError> {
        let profile =
            affinity::extract(&self.store, user_id, self.settings.browse_view_window)
                .await?
                .views_only();
        if profile.recent_views.is_empty() {
            return Ok(BrowseResult::EmptyProfile {
                user_id: user_id.clone(),
                message: EMPTY_PROFILE_MESSAGE.to_string(),
            });
        }

        let in_categories = self.store.products_in_categories(&profile.category_list()).await?;
        let similar_products = candidates::self_history_candidates(
            &in_categories,
            &profile,
            Exclusion::Seen,
            BROWSE_SIMILAR_LIMIT,
        )
        .into_iter()
        .map(|product| BrowseSuggestion {
            reason: format!(
                "Based on your views of products in the {} category",
                product.category
            ),
            product,
        })
        .collect();

        let price_band = price_band_of(&profile);
        let price_band_products = match price_band {
            Some(band) => {
                let catalog = self.store.list_products().await?;
                within_price_band(&catalog, &profile, &band)
            }
            None => Vec::new(),
        };

        let recently_viewed = distinct_recent_products(&profile);
        let stats = BrowseStats {
            total_views: profile.recent_views.len(),
            distinct_categories: profile.categories.len(),
            price_band,
        };

        info!(
            event_name = "engine.browse.completed",
            user_id = %user_id,
            recent_views = stats.total_views,
            "browse suggestions built"
        );

        Ok(BrowseResult::Ok {
            user_id: user_id.clone(),
            recently_viewed,
            similar_products,
            price_band_products,
            stats,
        })
    }

    /// Products with the most purchases, descending, ties by product id.
    pub async fn popular(&self, limit: usize) -> Result<Vec<PopularProduct>, EngineError> {
        let counts = self.store.purchase_counts_by_product(limit).await?;
        let ids: Vec<ProductId> = counts.iter().map(|row| row.product_id.clone()).collect();
        let mut catalog = by_id(self.store.products_by_ids(&ids).await?);

        Ok(counts
            .into_iter()
            .map(|row| PopularProduct {
                product: catalog.remove(&row.product_id),
                product_id: row.product_id,
                purchase_count: row.count,
            })
            .collect())
    }

    /// Most viewed products joined with catalog data; unknown products are dropped.
    pub async fn trending(&self, limit: usize) -> Result<Vec<TrendingProduct>, EngineError> {
        let counts = self.store.view_counts_by_product(limit).await?;
        let ids: Vec<ProductId> = counts.iter().map(|row| row.product_id.clone()).collect();
        let mut catalog = by_id(self.store.products_by_ids(&ids).await?);

        Ok(counts
            .into_iter()
            .filter_map(|row| {
                catalog
                    .remove(&row.product_id)
                    .map(|product| TrendingProduct { product, view_count: row.count })
            })
            .collect())
    }
}

fn by_id(products: Vec<Product>) -> HashMap<ProductId, Product> {
    products.into_iter().map(|product| (product.id.clone(), product)).collect()
}

fn distinct_recent_products(profile: &AffinityProfile) -> Vec<Product> {
    let mut seen = HashSet::new();
    profile
        .recent_views
        .iter()
        .filter(|resolved| seen.insert(resolved.product.id.clone()))
        .map(|resolved| resolved.product.clone())
        .collect()
}

/// Band of +/- `PRICE_BAND_SPREAD_PCT` around the mean price of the recently viewed products.
fn price_band_of(profile: &AffinityProfile) -> Option<PriceBand> {
    if profile.recent_views.is_empty() {
        return None;
    }
    let total: Decimal = profile.recent_views.iter().map(|resolved| resolved.product.price).sum();
    let mean = total / Decimal::from(profile.recent_views.len());
    let spread = Decimal::new(PRICE_BAND_SPREAD_PCT, 2);

    Some(PriceBand {
        min: (mean * (Decimal::ONE - spread)).round_dp(2),
        max: (mean * (Decimal::ONE + spread)).round_dp(2),
        mean: mean.round_dp(2),
    })
}

fn within_price_band(
    catalog: &[Product],
    profile: &AffinityProfile,
    band: &PriceBand,
) -> Vec<BrowseSuggestion> {
    catalog
        .iter()
        .filter(|product| !profile.viewed_product_ids.contains(&product.id))
        .filter(|product| !profile.purchased_product_ids.contains(&product.id))
        .filter(|product| band.contains(product.price))
        .take(BROWSE_PRICE_BAND_LIMIT)
        .map(|product| BrowseSuggestion {
            product: product.clone(),
            reason: "Priced similarly to products you viewed".to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::price_band_of;
    use crate::domain::product::{Product, ProductId};
    use crate::domain::user::UserId;
    use crate::recommend::affinity::{AffinityProfile, ResolvedView};

    fn resolved(id: &str, price: Decimal) -> ResolvedView {
        ResolvedView {
            product: Product {
                id: ProductId(id.to_string()),
                name: id.to_string(),
                category: "Electronics".to_string(),
                tags: Default::default(),
                price,
                description: String::new(),
            },
            viewed_at: Utc.with_ymd_and_hms(2026, 6, 2, 10, 0, 0).single().expect("valid"),
            view_duration_secs: 30,
        }
    }

    #[test]
    fn price_band_spans_thirty_percent_around_mean() {
        let mut profile = AffinityProfile::empty(UserId("u-1".to_string()));
        profile.recent_views =
            vec![resolved("p-1", Decimal::new(100, 0)), resolved("p-2", Decimal::new(300, 0))];

        let band = price_band_of(&profile).expect("band");

        assert_eq!(band.mean, Decimal::new(200, 0));
        assert_eq!(band.min, Decimal::new(140, 0));
        assert_eq!(band.max, Decimal::new(260, 0));
        assert!(band.contains(Decimal::new(260, 0)));
        assert!(!band.contains(Decimal::new(26001, 2)));
    }

    #[test]
    fn no_recent_views_means_no_price_band() {
        let profile = AffinityProfile::empty(UserId("u-1".to_string()));

        assert!(price_band_of(&profile).is_none());
    }
}
