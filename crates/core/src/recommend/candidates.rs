//! Candidate selection. Every function here is pure and works on already-fetched rows.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::domain::activity::ViewEvent;
use crate::domain::product::{Product, ProductId};
use crate::domain::user::UserId;
use crate::recommend::affinity::AffinityProfile;

/// Which part of the user's own history is removed from self-history candidates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Exclusion {
    /// Drop products the user already bought. Used for promotions.
    Purchased,
    /// Drop products the user already looked at or bought. Used for browse suggestions.
    Seen,
}

/// Products from the profile's categories, minus the excluded part of the history.
///
/// Keeps the order of `products` and returns at most `cap` items.
pub fn self_history_candidates(
    products: &[Product],
    profile: &AffinityProfile,
    exclusion: Exclusion,
    cap: usize,
) -> Vec<Product> {
    let excluded = |id: &ProductId| match exclusion {
        Exclusion::Purchased => profile.purchased_product_ids.contains(id),
        Exclusion::Seen => {
            profile.viewed_product_ids.contains(id) || profile.purchased_product_ids.contains(id)
        }
    };

    products
        .iter()
        .filter(|product| profile.categories.contains(&product.category))
        .filter(|product| !excluded(&product.id))
        .take(cap)
        .cloned()
        .collect()
}

/// Every other user appearing in `views`, which are views of the target's viewed products.
pub fn similar_users(views: &[ViewEvent], target: &UserId) -> Vec<UserId> {
    views
        .iter()
        .filter(|view| &view.user_id != target)
        .map(|view| view.user_id.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Product ids referenced by `views`, distinct, in first-appearance order.
pub fn distinct_product_ids(views: &[ViewEvent]) -> Vec<ProductId> {
    let mut seen = HashSet::new();
    views
        .iter()
        .filter(|view| seen.insert(view.product_id.clone()))
        .map(|view| view.product_id.clone())
        .collect()
}

/// Products viewed by similar users that the target has not viewed and that share a
/// category or a tag with the target's profile.
///
/// Distinct, in first-appearance order within `peer_views`, at most `cap` items.
/// Views of products missing from `products` are skipped.
pub fn peer_candidates(
    peer_views: &[ViewEvent],
    products: &[Product],
    profile: &AffinityProfile,
    cap: usize,
) -> Vec<Product> {
    let catalog: HashMap<&ProductId, &Product> =
        products.iter().map(|product| (&product.id, product)).collect();

    distinct_product_ids(peer_views)
        .into_iter()
        .filter(|id| !profile.viewed_product_ids.contains(id))
        .filter_map(|id| catalog.get(&id).copied())
        .filter(|product| {
            profile.categories.contains(&product.category) || product.shares_tag_with(&profile.tags)
        })
        .take(cap)
        .cloned()
        .collect()
}
