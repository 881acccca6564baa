use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::promotion::Promotion;
use crate::domain::user::UserId;
use crate::errors::EngineError;
use crate::promotions::policy::PromotionPolicy;
use crate::recommend::affinity;
use crate::recommend::candidates::{self_history_candidates, Exclusion};
use crate::store::BoundedStore;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepFailure {
    pub user_id: UserId,
    pub error: String,
}

/// Summary of one pass over every user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub users_total: usize,
    pub users_with_promotions: usize,
    /// Users whose generation succeeded but produced nothing.
    pub users_without_basis: usize,
    pub promotions_written: usize,
    pub failures: Vec<SweepFailure>,
}

impl SweepReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct PromotionGenerator {
    store: BoundedStore,
    policy: PromotionPolicy,
    view_window: usize,
}

impl PromotionGenerator {
    pub fn new(store: BoundedStore, policy: PromotionPolicy, view_window: usize) -> Self {
        Self { store, policy, view_window }
    }

    pub fn policy(&self) -> PromotionPolicy {
        self.policy
    }

    pub async fn generate_for_user(&self, user_id: &UserId) -> Result<Vec<Promotion>, EngineError> {
        self.generate_for_user_at(user_id, Utc::now()).await
    }

    /// Builds and persists the user's promotions as of `now`.
    ///
    /// Products the user already bought never get an offer. All promotions are written in a
    /// single upsert at the end, so a store failure leaves nothing half-written.
    pub async fn generate_for_user_at(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Promotion>, EngineError> {
        let profile = affinity::extract(&self.store, user_id, self.view_window).await?;
        if profile.categories.is_empty() {
            info!(
                event_name = "promotion.generate.noop",
                user_id = %user_id,
                "no category affinity; nothing to generate"
            );
            return Ok(Vec::new());
        }

        let in_categories = self.store.products_in_categories(&profile.category_list()).await?;
        let promotions: Vec<Promotion> = self_history_candidates(
            &in_categories,
            &profile,
            Exclusion::Purchased,
            self.policy.max_per_user,
        )
        .iter()
        .map(|product| self.policy.offer_for(user_id, product, now))
        .collect();

        self.store.upsert_promotions(promotions.clone()).await?;

        info!(
            event_name = "promotion.generate.completed",
            user_id = %user_id,
            categories = profile.categories.len(),
            promotions = promotions.len(),
            "promotions generated"
        );
        Ok(promotions)
    }

    pub async fn generate_for_all_users(&self) -> Result<SweepReport, EngineError> {
        self.generate_for_all_users_at(Utc::now()).await
    }

    /// Regenerates promotions for every user, one at a time.
    ///
    /// Only a failure to list users aborts the sweep. A failure for one user is recorded in
    /// the report and the sweep moves on. `started_at` is `now`; `finished_at` adds the
    /// elapsed wall-clock time.
    pub async fn generate_for_all_users_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, EngineError> {
        let wall_start = Utc::now();
        let users = self.store.list_users().await?;

        let mut report = SweepReport {
            started_at: now,
            finished_at: now,
            users_total: users.len(),
            users_with_promotions: 0,
            users_without_basis: 0,
            promotions_written: 0,
            failures: Vec::new(),
        };

        for user in users {
            match self.generate_for_user_at(&user.id, now).await {
                Ok(promotions) if promotions.is_empty() => report.users_without_basis += 1,
                Ok(promotions) => {
                    report.users_with_promotions += 1;
                    report.promotions_written += promotions.len();
                }
                Err(error) => {
                    warn!(
                        event_name = "promotion.sweep.user_failed",
                        user_id = %user.id,
                        error = %error,
                        "promotion generation failed for user; continuing sweep"
                    );
                    report.failures.push(SweepFailure { user_id: user.id, error: error.to_string() });
                }
            }
        }

        report.finished_at = now + (Utc::now() - wall_start);
        Ok(report)
    }

    /// The user's promotions still valid at `now`, newest first.
    pub async fn live_promotions(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Promotion>, EngineError> {
        let mut live: Vec<Promotion> = self
            .store
            .promotions_for_user(user_id)
            .await?
            .into_iter()
            .filter(|promotion| promotion.is_live_at(now))
            .collect();
        live.sort_by(|left, right| right.generated_at.cmp(&left.generated_at));
        Ok(live)
    }
}
