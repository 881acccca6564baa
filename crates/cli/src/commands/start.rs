use shopsense_db::ping;

use crate::commands::{load_config, open_store, runtime, CommandResult};

/// Preflight for `shopsense-server`: config, database reachability, schema.
pub fn run() -> CommandResult {
    let config = match load_config("start") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match runtime("start") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let (pool, _) = open_store(&config).await?;
        let probe = ping(&pool).await.map_err(|error| ("db_connectivity", error.to_string(), 4u8));
        pool.close().await;
        probe
    });

    match result {
        Ok(()) => CommandResult::success(
            "start",
            format!(
                "preflight passed; server will bind {} (view trigger: {}, periodic sweep: {})",
                config.server_address(),
                config.scheduler.view_trigger,
                if config.scheduler.sweep_enabled {
                    format!("every {}s", config.scheduler.sweep_interval_secs)
                } else {
                    "disabled".to_string()
                }
            ),
        ),
        Err(failure) => CommandResult::from_failure("start", failure),
    }
}
