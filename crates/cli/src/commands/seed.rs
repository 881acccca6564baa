use shopsense_db::{DemoDataset, SeedResult};

use crate::commands::{load_config, open_store, runtime, to_data, CommandResult, Failure};

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match runtime("seed") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let (pool, store) = open_store(&config).await?;

        let run_result = async {
            let seed_result = DemoDataset::load(store.inner().as_ref())
                .await
                .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
            let verification = DemoDataset::verify(store.inner().as_ref())
                .await
                .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

            if !verification.all_present {
                return Err(("seed_verification", verification_message(&verification.checks), 6u8));
            }
            Ok::<SeedResult, Failure>(seed_result)
        }
        .await;

        pool.close().await;
        run_result
    });

    match result {
        Ok(seed_result) => CommandResult::success_with_data(
            "seed",
            format!(
                "demo dataset ready: {} users, {} products, {} views, {} purchases",
                DemoDataset::users().len(),
                DemoDataset::products().len(),
                DemoDataset::views().len(),
                DemoDataset::purchases().len(),
            ),
            to_data(&seed_result),
        ),
        Err(failure) => CommandResult::from_failure("seed", failure),
    }
}

fn verification_message(checks: &[(&str, bool)]) -> String {
    let failed_checks =
        checks.iter().filter_map(|(check, passed)| (!passed).then_some(*check)).collect::<Vec<_>>();

    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::verification_message;

    #[test]
    fn verification_error_message_targets_failed_checks() {
        let checks = [("seed-users", true), ("seed-views", false), ("seed-purchases", false)];

        assert_eq!(
            verification_message(&checks),
            "Seed verification failed for checks: seed-views, seed-purchases"
        );
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        let checks = [("seed-users", true), ("seed-products", true)];

        assert_eq!(verification_message(&checks), "Some seed data failed to load");
    }
}
