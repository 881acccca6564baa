//! Promotion regeneration triggers: per-view and periodic.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::config::{SchedulerConfig, ViewTriggerMode};
use crate::domain::user::UserId;
use crate::errors::EngineError;
use crate::promotions::{PromotionGenerator, SweepReport};

/// What the view trigger did after a view was recorded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TriggerOutcome {
    Regenerated { promotions: usize },
    Scheduled,
    Disabled,
    Failed { error: String },
}

#[derive(Clone, Debug)]
pub struct RegenerationScheduler {
    generator: PromotionGenerator,
    view_trigger: ViewTriggerMode,
    sweep_enabled: bool,
    sweep_interval: Duration,
}

impl RegenerationScheduler {
    pub fn new(generator: PromotionGenerator, config: &SchedulerConfig) -> Self {
        Self {
            generator,
            view_trigger: config.view_trigger,
            sweep_enabled: config.sweep_enabled,
            sweep_interval: Duration::from_secs(config.sweep_interval_secs),
        }
    }

    pub fn view_trigger(&self) -> ViewTriggerMode {
        self.view_trigger
    }

    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    /// Regenerates the user's promotions according to the trigger mode.
    ///
    /// Never returns an error: the view that caused the trigger is already recorded.
    pub async fn on_view_recorded(&self, user_id: &UserId) -> TriggerOutcome {
        match self.view_trigger {
            ViewTriggerMode::Disabled => TriggerOutcome::Disabled,
            ViewTriggerMode::Inline => match self.generator.generate_for_user(user_id).await {
                Ok(promotions) => TriggerOutcome::Regenerated { promotions: promotions.len() },
                Err(error) => {
                    warn!(
                        event_name = "promotion.trigger.failed",
                        user_id = %user_id,
                        error = %error,
                        "view-triggered regeneration failed"
                    );
                    TriggerOutcome::Failed { error: error.to_string() }
                }
            },
            ViewTriggerMode::Background => {
                let generator = self.generator.clone();
                let user_id = user_id.clone();
                tokio::spawn(async move {
                    if let Err(error) = generator.generate_for_user(&user_id).await {
                        warn!(
                            event_name = "promotion.trigger.failed",
                            user_id = %user_id,
                            error = %error,
                            "background regeneration failed"
                        );
                    }
                });
                TriggerOutcome::Scheduled
            }
        }
    }

    pub async fn run_sweep(&self) -> Result<SweepReport, EngineError> {
        let report = self.generator.generate_for_all_users().await?;
        info!(
            event_name = "promotion.sweep.completed",
            users_total = report.users_total,
            users_with_promotions = report.users_with_promotions,
            promotions_written = report.promotions_written,
            failures = report.failures.len(),
            "promotion sweep finished"
        );
        Ok(report)
    }

    /// Runs one sweep on a detached task.
    pub fn spawn_sweep(&self) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            if let Err(error) = scheduler.run_sweep().await {
                warn!(event_name = "promotion.sweep.failed", error = %error, "sweep aborted");
            }
        })
    }

    /// Sweeps every `sweep_interval` until `shutdown` flips to `true`.
    ///
    /// The first sweep runs one full interval after spawning. Returns `None` when the sweep is
    /// disabled.
    pub fn spawn_periodic_sweep(
        &self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Option<JoinHandle<()>> {
        if !self.sweep_enabled {
            info!(event_name = "promotion.sweep.disabled", "periodic sweep disabled");
            return None;
        }

        let scheduler = self.clone();
        Some(tokio::spawn(async move {
            let period = scheduler.sweep_interval;
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(
                event_name = "promotion.sweep.scheduled",
                interval_secs = period.as_secs(),
                "periodic sweep started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(error) = scheduler.run_sweep().await {
                            warn!(
                                event_name = "promotion.sweep.failed",
                                error = %error,
                                "sweep aborted; will retry on next interval"
                            );
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            info!(event_name = "promotion.sweep.stopped", "periodic sweep stopped");
        }))
    }
}
