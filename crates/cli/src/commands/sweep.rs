use shopsense_core::{PromotionGenerator, PromotionPolicy, RegenerationScheduler};

use crate::commands::{load_config, open_store, runtime, to_data, CommandResult};

/// One full promotion sweep over every user, reported as JSON.
pub fn run() -> CommandResult {
    let config = match load_config("sweep") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match runtime("sweep") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let (pool, store) = open_store(&config).await?;
        let generator = PromotionGenerator::new(
            store,
            PromotionPolicy::from(&config.promotion),
            config.recommendation.recent_view_window,
        );
        let report = RegenerationScheduler::new(generator, &config.scheduler)
            .run_sweep()
            .await
            .map_err(|error| ("sweep_execution", error.to_string(), 5u8));
        pool.close().await;
        report
    });

    match result {
        Ok(report) => CommandResult::success_with_data(
            "sweep",
            format!(
                "swept {} users: {} promotions written, {} without basis, {} failed",
                report.users_total,
                report.promotions_written,
                report.users_without_basis,
                report.failures.len()
            ),
            to_data(&report),
        ),
        Err(failure) => CommandResult::from_failure("sweep", failure),
    }
}
