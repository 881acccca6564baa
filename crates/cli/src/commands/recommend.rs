use shopsense_core::domain::user::UserId;
use shopsense_core::{RecommendationEngine, RecommendationResult, RecommendationSettings};

use crate::commands::{load_config, open_store, runtime, to_data, CommandResult};

pub fn run(user_id: &str) -> CommandResult {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return CommandResult::failure("recommend", "invalid_input", "user_id is required", 2);
    }

    let config = match load_config("recommend") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match runtime("recommend") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let (pool, store) = open_store(&config).await?;
        let engine =
            RecommendationEngine::new(store, RecommendationSettings::from(&config.recommendation));
        let outcome = engine
            .recommend(&UserId(user_id.to_string()))
            .await
            .map_err(|error| ("store_unavailable", error.to_string(), 4u8));
        pool.close().await;
        outcome
    });

    match result {
        Ok(outcome) => {
            CommandResult::success_with_data("recommend", summary(&outcome), to_data(&outcome))
        }
        Err(failure) => CommandResult::from_failure("recommend", failure),
    }
}

fn summary(outcome: &RecommendationResult) -> String {
    match outcome {
        RecommendationResult::Ok { user_id, recommendations } => {
            format!("{} recommendations for {user_id}", recommendations.len())
        }
        RecommendationResult::EmptyProfile { message, .. }
        | RecommendationResult::NoSimilarUsers { message, .. } => message.clone(),
    }
}
