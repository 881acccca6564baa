//! Recommendation engine
//!
//! Turns recorded views and purchases into ranked product suggestions. The pipeline is
//! split into pure stages so each can be exercised without a store:
//!
//! - [`affinity`]: the user's category/tag interest profile
//! - [`candidates`]: unscored candidate sets (own history, similar users)
//! - [`scoring`]: `frequency * total view time` ranking
//! - [`engine`]: orchestration against a [`crate::store::BoundedStore`]

pub mod affinity;
pub mod candidates;
mod engine;
pub mod scoring;
mod types;

pub use affinity::AffinityProfile;
pub use candidates::Exclusion;
pub use engine::RecommendationEngine;
pub use scoring::{PeerEvidence, ScoredCandidate};
pub use types::*;

/// Number of most recent views the affinity profile is built from.
pub const DEFAULT_RECENT_VIEW_WINDOW: usize = 10;

/// Number of most recent views the browse path looks at.
pub const DEFAULT_BROWSE_VIEW_WINDOW: usize = 5;

/// Candidates kept per selection strategy before scoring.
pub const DEFAULT_CANDIDATE_CAP: usize = 10;

/// Ranked items returned by `recommend`.
pub const DEFAULT_MAX_RESULTS: usize = 10;

/// Items returned by popularity reads.
pub const DEFAULT_POPULARITY_LIMIT: usize = 10;

/// Same-category suggestions on the browse path.
pub const BROWSE_SIMILAR_LIMIT: usize = 5;

/// Price-band suggestions on the browse path.
pub const BROWSE_PRICE_BAND_LIMIT: usize = 3;

/// Half-width of the browse price band, in percent of the mean viewed price.
pub const PRICE_BAND_SPREAD_PCT: i64 = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecommendationSettings {
    pub recent_view_window: usize,
    pub browse_view_window: usize,
    pub candidate_cap: usize,
    pub max_results: usize,
}

impl Default for RecommendationSettings {
    fn default() -> Self {
        Self {
            recent_view_window: DEFAULT_RECENT_VIEW_WINDOW,
            browse_view_window: DEFAULT_BROWSE_VIEW_WINDOW,
            candidate_cap: DEFAULT_CANDIDATE_CAP,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

impl From<&crate::config::RecommendationConfig> for RecommendationSettings {
    fn from(config: &crate::config::RecommendationConfig) -> Self {
        Self {
            recent_view_window: config.recent_view_window,
            browse_view_window: config.browse_view_window,
            candidate_cap: config.candidate_cap,
            max_results: config.max_results,
        }
    }
}
