//! Engagement scoring: `frequency * total view time` over peer views.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::activity::ViewEvent;
use crate::domain::product::{Product, ProductId};

/// Aggregated peer engagement with a single product.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerEvidence {
    pub frequency: u64,
    pub total_time_secs: u64,
}

impl PeerEvidence {
    pub fn score(&self) -> u64 {
        self.frequency.saturating_mul(self.total_time_secs)
    }

    fn absorb(&mut self, view: &ViewEvent) {
        self.frequency = self.frequency.saturating_add(1);
        self.total_time_secs =
            self.total_time_secs.saturating_add(u64::from(view.view_duration_secs));
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScoredCandidate {
    pub product: Product,
    pub evidence: PeerEvidence,
    pub score: u64,
}

pub fn evidence_for(candidate: &ProductId, peer_views: &[ViewEvent]) -> PeerEvidence {
    let mut evidence = PeerEvidence::default();
    for view in peer_views.iter().filter(|view| &view.product_id == candidate) {
        evidence.absorb(view);
    }
    evidence
}

/// Score of one candidate. Zero when no peer view references it.
pub fn score(candidate: &ProductId, peer_views: &[ViewEvent]) -> u64 {
    evidence_for(candidate, peer_views).score()
}

/// Scores every candidate and orders them by descending score.
///
/// The sort is stable, so equal scores keep the order of `candidates`.
pub fn rank(candidates: Vec<Product>, peer_views: &[ViewEvent]) -> Vec<ScoredCandidate> {
    let mut evidence: HashMap<&ProductId, PeerEvidence> = HashMap::new();
    for view in peer_views {
        evidence.entry(&view.product_id).or_default().absorb(view);
    }

    let mut scored: Vec<ScoredCandidate> = candidates
        .into_iter()
        .map(|product| {
            let evidence = evidence.get(&product.id).copied().unwrap_or_default();
            ScoredCandidate { score: evidence.score(), evidence, product }
        })
        .collect();
    scored.sort_by(|left, right| right.score.cmp(&left.score));
    scored
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::{evidence_for, rank, score, PeerEvidence};
    use crate::domain::activity::{ViewEvent, ViewEventId};
    use crate::domain::product::{Product, ProductId};
    use crate::domain::user::UserId;

    fn view(product_id: &str, secs: u32) -> ViewEvent {
        ViewEvent {
            id: ViewEventId(format!("v-{product_id}-{secs}")),
            user_id: UserId("peer".to_string()),
            product_id: ProductId(product_id.to_string()),
            viewed_at: Utc.with_ymd_and_hms(2026, 1, 5, 18, 30, 0).single().expect("valid"),
            view_duration_secs: secs,
        }
    }

    fn product(id: &str) -> Product {
        Product {
            id: ProductId(id.to_string()),
            name: id.to_string(),
            category: "Electronics".to_string(),
            tags: Default::default(),
            price: Decimal::new(100, 0),
            description: String::new(),
        }
    }

    #[test]
    fn score_is_frequency_times_total_time() {
        let views = vec![view("p-3", 300), view("p-3", 100), view("p-9", 999)];

        let evidence = evidence_for(&ProductId("p-3".to_string()), &views);

        assert_eq!(evidence, PeerEvidence { frequency: 2, total_time_secs: 400 });
        assert_eq!(score(&ProductId("p-3".to_string()), &views), 800);
    }

    #[test]
    fn candidate_without_evidence_scores_zero_and_stays_ranked() {
        let ranked = rank(vec![product("p-1"), product("p-2")], &[view("p-2", 10)]);

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].product.id.as_str(), "p-2");
        assert_eq!(ranked[1].score, 0);
    }

    #[test]
    fn score_is_monotonic_in_view_time_at_equal_frequency() {
        let shorter = score(&ProductId("p-1".to_string()), &[view("p-1", 60), view("p-1", 60)]);
        let longer = score(&ProductId("p-1".to_string()), &[view("p-1", 60), view("p-1", 61)]);

        assert!(longer > shorter);
    }

    #[test]
    fn ties_keep_candidate_order() {
        let views = vec![view("p-1", 50), view("p-2", 50), view("p-3", 70)];

        let ranked = rank(vec![product("p-2"), product("p-1"), product("p-3")], &views);
        let order: Vec<&str> = ranked.iter().map(|item| item.product.id.as_str()).collect();

        assert_eq!(order, vec!["p-3", "p-2", "p-1"]);
    }

    #[test]
    fn score_saturates_instead_of_overflowing() {
        let evidence = PeerEvidence { frequency: u64::MAX, total_time_secs: 2 };

        assert_eq!(evidence.score(), u64::MAX);
    }
}
