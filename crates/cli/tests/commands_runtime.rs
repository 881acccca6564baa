use std::env;
use std::sync::{Mutex, OnceLock};

use shopsense_cli::commands::{export, migrate, recommend, seed, start, sweep};
use serde_json::Value;

#[test]
fn start_returns_success_with_valid_env() {
    with_database(|| {
        let result = start::run();
        assert_eq!(result.exit_code, 0, "expected successful start preflight");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "start");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn start_returns_config_failure_with_invalid_log_level() {
    with_env(&[("SHOPSENSE_LOGGING_LEVEL", "loud")], || {
        let result = start::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "start");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn migrate_returns_success_with_valid_env() {
    with_database(|| {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    with_database(|| {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");
        let first_payload = parse_payload(&first.output);
        assert_eq!(first_payload["data"]["views_inserted"], 5);

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");
        let second_payload = parse_payload(&second.output);
        assert_eq!(second_payload["data"]["views_inserted"], 0);
        assert_eq!(second_payload["data"]["purchases_inserted"], 0);

        assert_eq!(first_payload["message"], second_payload["message"]);
    });
}

#[test]
fn recommend_scores_peer_views_after_seed() {
    with_database(|| {
        assert_eq!(seed::run().exit_code, 0, "expected seed success");

        let result = recommend::run("user-joao");
        assert_eq!(result.exit_code, 0, "expected recommend success");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["data"]["status"], "ok");
        let first = &payload["data"]["recommendations"][0];
        assert_eq!(first["product"]["id"], "prod-pixel-8");
        assert_eq!(first["score"], 300);
    });
}

#[test]
fn recommend_rejects_blank_user_id() {
    with_database(|| {
        let result = recommend::run("   ");
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "invalid_input");
    });
}

#[test]
fn sweep_reports_every_seeded_user() {
    with_database(|| {
        assert_eq!(seed::run().exit_code, 0, "expected seed success");

        let result = sweep::run();
        assert_eq!(result.exit_code, 0, "expected sweep success");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "sweep");
        assert_eq!(payload["data"]["users_total"], 3);
        assert_eq!(payload["data"]["failures"].as_array().map(Vec::len), Some(0));
    });
}

#[test]
fn export_includes_statistics_and_user_filter() {
    with_database(|| {
        assert_eq!(seed::run().exit_code, 0, "expected seed success");

        let all = parse_payload(&export::run(None).output);
        assert_eq!(all["status"], "ok");
        assert_eq!(all["data"]["statistics"]["total_products"], 5);
        assert_eq!(all["data"]["statistics"]["top_viewed"][0]["product_id"], "prod-galaxy-s21");

        let one = parse_payload(&export::run(Some("user-maria")).output);
        assert_eq!(one["data"]["views"].as_array().map(Vec::len), Some(2));
        assert_eq!(one["data"]["purchases"].as_array().map(Vec::len), Some(1));
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_database(test_fn: impl FnOnce()) {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("cli.db").display());
    with_env(&[("SHOPSENSE_DATABASE_URL", url.as_str())], test_fn);
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "SHOPSENSE_DATABASE_URL",
        "SHOPSENSE_DATABASE_MAX_CONNECTIONS",
        "SHOPSENSE_DATABASE_TIMEOUT_SECS",
        "SHOPSENSE_STORE_CALL_TIMEOUT_MS",
        "SHOPSENSE_SERVER_BIND_ADDRESS",
        "SHOPSENSE_SERVER_PORT",
        "SHOPSENSE_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "SHOPSENSE_RECOMMENDATION_RECENT_VIEW_WINDOW",
        "SHOPSENSE_RECOMMENDATION_BROWSE_VIEW_WINDOW",
        "SHOPSENSE_RECOMMENDATION_CANDIDATE_CAP",
        "SHOPSENSE_RECOMMENDATION_MAX_RESULTS",
        "SHOPSENSE_PROMOTION_DISCOUNT_PCT",
        "SHOPSENSE_PROMOTION_VALIDITY_DAYS",
        "SHOPSENSE_PROMOTION_MAX_PER_USER",
        "SHOPSENSE_SCHEDULER_SWEEP_ENABLED",
        "SHOPSENSE_SCHEDULER_SWEEP_INTERVAL_SECS",
        "SHOPSENSE_SCHEDULER_VIEW_TRIGGER",
        "SHOPSENSE_LOGGING_LEVEL",
        "SHOPSENSE_LOGGING_FORMAT",
        "SHOPSENSE_LOG_LEVEL",
        "SHOPSENSE_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
