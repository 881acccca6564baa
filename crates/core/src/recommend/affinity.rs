//! Affinity extraction: what a user has recently shown interest in.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::domain::activity::{PurchaseEvent, ViewEvent};
use crate::domain::product::{Product, ProductId};
use crate::domain::user::UserId;
use crate::store::{BoundedStore, StoreError};

/// A recent view joined with the product it refers to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResolvedView {
    pub product: Product,
    pub viewed_at: DateTime<Utc>,
    pub view_duration_secs: u32,
}

/// Interest summary over the recent view window and the full purchase history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AffinityProfile {
    pub user_id: UserId,
    pub categories: BTreeSet<String>,
    pub tags: BTreeSet<String>,
    pub viewed_product_ids: BTreeSet<ProductId>,
    pub purchased_product_ids: BTreeSet<ProductId>,
    /// Newest first, only views whose product still resolves.
    pub recent_views: Vec<ResolvedView>,
    /// Views and purchases skipped because their product no longer exists.
    pub dropped_references: usize,
}

impl AffinityProfile {
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            categories: BTreeSet::new(),
            tags: BTreeSet::new(),
            viewed_product_ids: BTreeSet::new(),
            purchased_product_ids: BTreeSet::new(),
            recent_views: Vec::new(),
            dropped_references: 0,
        }
    }

    /// No resolved views and no resolved purchases: nothing to personalize on.
    pub fn is_empty(&self) -> bool {
        self.viewed_product_ids.is_empty() && self.purchased_product_ids.is_empty()
    }

    pub fn category_list(&self) -> Vec<String> {
        self.categories.iter().cloned().collect()
    }

    pub fn viewed_list(&self) -> Vec<ProductId> {
        self.viewed_product_ids.iter().cloned().collect()
    }

    /// Same profile with categories and tags drawn from the recent views alone.
    ///
    /// Purchased ids are kept so callers can still exclude them.
    pub fn views_only(&self) -> Self {
        let mut profile = Self {
            categories: BTreeSet::new(),
            tags: BTreeSet::new(),
            ..self.clone()
        };
        for resolved in &self.recent_views {
            absorb(&mut profile, &resolved.product);
        }
        profile
    }
}

/// Builds the profile from already-fetched events and the products they reference.
///
/// `views` must already be limited to the recent window and ordered newest first.
pub fn build_profile(
    user_id: &UserId,
    views: &[ViewEvent],
    purchases: &[PurchaseEvent],
    products: &[Product],
) -> AffinityProfile {
    let catalog: HashMap<&ProductId, &Product> =
        products.iter().map(|product| (&product.id, product)).collect();
    let mut profile = AffinityProfile::empty(user_id.clone());

    for view in views {
        let Some(product) = catalog.get(&view.product_id) else {
            debug!(
                event_name = "engine.affinity.dangling_view",
                user_id = %user_id,
                product_id = %view.product_id,
                "skipping view of unknown product"
            );
            profile.dropped_references += 1;
            continue;
        };
        absorb(&mut profile, product);
        profile.viewed_product_ids.insert(product.id.clone());
        profile.recent_views.push(ResolvedView {
            product: (*product).clone(),
            viewed_at: view.viewed_at,
            view_duration_secs: view.view_duration_secs,
        });
    }

    for purchase in purchases {
        let Some(product) = catalog.get(&purchase.product_id) else {
            debug!(
                event_name = "engine.affinity.dangling_purchase",
                user_id = %user_id,
                product_id = %purchase.product_id,
                "skipping purchase of unknown product"
            );
            profile.dropped_references += 1;
            continue;
        };
        absorb(&mut profile, product);
        profile.purchased_product_ids.insert(product.id.clone());
    }

    profile
}

fn absorb(profile: &mut AffinityProfile, product: &Product) {
    profile.categories.insert(product.category.clone());
    profile.tags.extend(product.tags.iter().cloned());
}

/// Reads the user's recent views and purchases and builds their profile.
pub async fn extract(
    store: &BoundedStore,
    user_id: &UserId,
    view_window: usize,
) -> Result<AffinityProfile, StoreError> {
    let views = store.recent_views_for_user(user_id, view_window).await?;
    let purchases = store.purchases_for_user(user_id).await?;

    let mut referenced: Vec<ProductId> = views
        .iter()
        .map(|view| view.product_id.clone())
        .chain(purchases.iter().map(|purchase| purchase.product_id.clone()))
        .collect();
    referenced.sort();
    referenced.dedup();

    let products = store.products_by_ids(&referenced).await?;
    Ok(build_profile(user_id, &views, &purchases, &products))
}
