use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub store: StoreConfig,
    pub server: ServerConfig,
    pub recommendation: RecommendationConfig,
    pub promotion: PromotionConfig,
    pub scheduler: SchedulerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub call_timeout_ms: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct RecommendationConfig {
    pub recent_view_window: usize,
    pub browse_view_window: usize,
    pub candidate_cap: usize,
    pub max_results: usize,
}

#[derive(Clone, Debug)]
pub struct PromotionConfig {
    pub discount_pct: u8,
    pub validity_days: u32,
    pub max_per_user: usize,
}

#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    pub sweep_enabled: bool,
    pub sweep_interval_secs: u64,
    pub view_trigger: ViewTriggerMode,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// How recording a view kicks off promotion regeneration for its user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewTriggerMode {
    /// Regenerate before the ingest call returns.
    Inline,
    /// Regenerate on a spawned task.
    Background,
    Disabled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub server_port: Option<u16>,
    pub sweep_enabled: Option<bool>,
    pub view_trigger: Option<ViewTriggerMode>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://shopsense.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            store: StoreConfig { call_timeout_ms: 5_000 },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            recommendation: RecommendationConfig {
                recent_view_window: 10,
                browse_view_window: 5,
                candidate_cap: 10,
                max_results: 10,
            },
            promotion: PromotionConfig { discount_pct: 10, validity_days: 7, max_per_user: 5 },
            scheduler: SchedulerConfig {
                sweep_enabled: true,
                sweep_interval_secs: 86_400,
                view_trigger: ViewTriggerMode::Inline,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl std::str::FromStr for ViewTriggerMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "inline" => Ok(Self::Inline),
            "background" => Ok(Self::Background),
            "disabled" | "off" => Ok(Self::Disabled),
            other => Err(ConfigError::Validation(format!(
                "unsupported view trigger `{other}` (expected inline|background|disabled)"
            ))),
        }
    }
}

impl std::fmt::Display for ViewTriggerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Inline => "inline",
            Self::Background => "background",
            Self::Disabled => "disabled",
        })
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("shopsense.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(store) = patch.store {
            if let Some(call_timeout_ms) = store.call_timeout_ms {
                self.store.call_timeout_ms = call_timeout_ms;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(recommendation) = patch.recommendation {
            if let Some(window) = recommendation.recent_view_window {
                self.recommendation.recent_view_window = window;
            }
            if let Some(window) = recommendation.browse_view_window {
                self.recommendation.browse_view_window = window;
            }
            if let Some(cap) = recommendation.candidate_cap {
                self.recommendation.candidate_cap = cap;
            }
            if let Some(max_results) = recommendation.max_results {
                self.recommendation.max_results = max_results;
            }
        }

        if let Some(promotion) = patch.promotion {
            if let Some(discount_pct) = promotion.discount_pct {
                self.promotion.discount_pct = discount_pct;
            }
            if let Some(validity_days) = promotion.validity_days {
                self.promotion.validity_days = validity_days;
            }
            if let Some(max_per_user) = promotion.max_per_user {
                self.promotion.max_per_user = max_per_user;
            }
        }

        if let Some(scheduler) = patch.scheduler {
            if let Some(sweep_enabled) = scheduler.sweep_enabled {
                self.scheduler.sweep_enabled = sweep_enabled;
            }
            if let Some(sweep_interval_secs) = scheduler.sweep_interval_secs {
                self.scheduler.sweep_interval_secs = sweep_interval_secs;
            }
            if let Some(view_trigger) = scheduler.view_trigger {
                self.scheduler.view_trigger = view_trigger;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SHOPSENSE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("SHOPSENSE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("SHOPSENSE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("SHOPSENSE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("SHOPSENSE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SHOPSENSE_STORE_CALL_TIMEOUT_MS") {
            self.store.call_timeout_ms = parse_u64("SHOPSENSE_STORE_CALL_TIMEOUT_MS", &value)?;
        }

        if let Some(value) = read_env("SHOPSENSE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("SHOPSENSE_SERVER_PORT") {
            self.server.port = parse_u16("SHOPSENSE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("SHOPSENSE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("SHOPSENSE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("SHOPSENSE_RECOMMENDATION_RECENT_VIEW_WINDOW") {
            self.recommendation.recent_view_window =
                parse_usize("SHOPSENSE_RECOMMENDATION_RECENT_VIEW_WINDOW", &value)?;
        }
        if let Some(value) = read_env("SHOPSENSE_RECOMMENDATION_BROWSE_VIEW_WINDOW") {
            self.recommendation.browse_view_window =
                parse_usize("SHOPSENSE_RECOMMENDATION_BROWSE_VIEW_WINDOW", &value)?;
        }
        if let Some(value) = read_env("SHOPSENSE_RECOMMENDATION_CANDIDATE_CAP") {
            self.recommendation.candidate_cap =
                parse_usize("SHOPSENSE_RECOMMENDATION_CANDIDATE_CAP", &value)?;
        }
        if let Some(value) = read_env("SHOPSENSE_RECOMMENDATION_MAX_RESULTS") {
            self.recommendation.max_results =
                parse_usize("SHOPSENSE_RECOMMENDATION_MAX_RESULTS", &value)?;
        }

        if let Some(value) = read_env("SHOPSENSE_PROMOTION_DISCOUNT_PCT") {
            self.promotion.discount_pct = parse_u8("SHOPSENSE_PROMOTION_DISCOUNT_PCT", &value)?;
        }
        if let Some(value) = read_env("SHOPSENSE_PROMOTION_VALIDITY_DAYS") {
            self.promotion.validity_days = parse_u32("SHOPSENSE_PROMOTION_VALIDITY_DAYS", &value)?;
        }
        if let Some(value) = read_env("SHOPSENSE_PROMOTION_MAX_PER_USER") {
            self.promotion.max_per_user = parse_usize("SHOPSENSE_PROMOTION_MAX_PER_USER", &value)?;
        }

        if let Some(value) = read_env("SHOPSENSE_SCHEDULER_SWEEP_ENABLED") {
            self.scheduler.sweep_enabled = parse_bool("SHOPSENSE_SCHEDULER_SWEEP_ENABLED", &value)?;
        }
        if let Some(value) = read_env("SHOPSENSE_SCHEDULER_SWEEP_INTERVAL_SECS") {
            self.scheduler.sweep_interval_secs =
                parse_u64("SHOPSENSE_SCHEDULER_SWEEP_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = read_env("SHOPSENSE_SCHEDULER_VIEW_TRIGGER") {
            self.scheduler.view_trigger = value.parse()?;
        }

        let log_level =
            read_env("SHOPSENSE_LOGGING_LEVEL").or_else(|| read_env("SHOPSENSE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SHOPSENSE_LOGGING_FORMAT").or_else(|| read_env("SHOPSENSE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(sweep_enabled) = overrides.sweep_enabled {
            self.scheduler.sweep_enabled = sweep_enabled;
        }
        if let Some(view_trigger) = overrides.view_trigger {
            self.scheduler.view_trigger = view_trigger;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_store(&self.store)?;
        validate_server(&self.server)?;
        validate_recommendation(&self.recommendation)?;
        validate_promotion(&self.promotion)?;
        validate_scheduler(&self.scheduler)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("shopsense.toml"), PathBuf::from("config/shopsense.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_store(store: &StoreConfig) -> Result<(), ConfigError> {
    if store.call_timeout_ms == 0 || store.call_timeout_ms > 60_000 {
        return Err(ConfigError::Validation(
            "store.call_timeout_ms must be in range 1..=60000".to_string(),
        ));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_recommendation(recommendation: &RecommendationConfig) -> Result<(), ConfigError> {
    let fields = [
        ("recommendation.recent_view_window", recommendation.recent_view_window),
        ("recommendation.browse_view_window", recommendation.browse_view_window),
        ("recommendation.candidate_cap", recommendation.candidate_cap),
        ("recommendation.max_results", recommendation.max_results),
    ];
    for (key, value) in fields {
        if value == 0 {
            return Err(ConfigError::Validation(format!("{key} must be greater than zero")));
        }
    }
    Ok(())
}

fn validate_promotion(promotion: &PromotionConfig) -> Result<(), ConfigError> {
    if promotion.discount_pct == 0 || promotion.discount_pct > 100 {
        return Err(ConfigError::Validation(
            "promotion.discount_pct must be in range 1..=100".to_string(),
        ));
    }

    if promotion.validity_days == 0 || promotion.validity_days > 365 {
        return Err(ConfigError::Validation(
            "promotion.validity_days must be in range 1..=365".to_string(),
        ));
    }

    if promotion.max_per_user == 0 {
        return Err(ConfigError::Validation(
            "promotion.max_per_user must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_scheduler(scheduler: &SchedulerConfig) -> Result<(), ConfigError> {
    if scheduler.sweep_interval_secs < 60 {
        return Err(ConfigError::Validation(
            "scheduler.sweep_interval_secs must be at least 60; disable the sweep with scheduler.sweep_enabled = false instead"
                .to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u8(key: &str, value: &str) -> Result<u8, ConfigError> {
    value.parse::<u8>().map_err(|_| invalid_override(key, value))
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| invalid_override(key, value))
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| invalid_override(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    store: Option<StorePatch>,
    server: Option<ServerPatch>,
    recommendation: Option<RecommendationPatch>,
    promotion: Option<PromotionPatch>,
    scheduler: Option<SchedulerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct StorePatch {
    call_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RecommendationPatch {
    recent_view_window: Option<usize>,
    browse_view_window: Option<usize>,
    candidate_cap: Option<usize>,
    max_results: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct PromotionPatch {
    discount_pct: Option<u8>,
    validity_days: Option<u32>,
    max_per_user: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct SchedulerPatch {
    sweep_enabled: Option<bool>,
    sweep_interval_secs: Option<u64>,
    view_trigger: Option<ViewTriggerMode>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat, ViewTriggerMode};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_match_documented_policy() -> Result<(), String> {
        let config = AppConfig::default();
        config.validate().map_err(|err| format!("defaults should validate: {err}"))?;

        ensure(config.promotion.discount_pct == 10, "default discount is 10 percent")?;
        ensure(config.promotion.validity_days == 7, "default validity is 7 days")?;
        ensure(config.promotion.max_per_user == 5, "default cap is 5 promotions")?;
        ensure(config.recommendation.recent_view_window == 10, "default view window is 10")?;
        ensure(config.store.call_timeout_ms == 5_000, "default store timeout is 5s")?;
        ensure(
            config.scheduler.view_trigger == ViewTriggerMode::Inline,
            "view trigger defaults to inline",
        )?;
        ensure(config.server_address() == "127.0.0.1:8080", "default address")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_SHOPSENSE_DB_PATH", "/tmp/interpolated.db");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("shopsense.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://${TEST_SHOPSENSE_DB_PATH}"

[promotion]
discount_pct = 15
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite:///tmp/interpolated.db",
                "database url should be interpolated from environment",
            )?;
            ensure(config.promotion.discount_pct == 15, "discount should come from file")?;
            Ok(())
        })();

        clear_vars(&["TEST_SHOPSENSE_DB_PATH"]);
        result
    }

    #[test]
    fn missing_interpolation_variable_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&["TEST_SHOPSENSE_UNSET_VAR"]);

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("shopsense.toml");
        fs::write(&path, "[database]\nurl = \"${TEST_SHOPSENSE_UNSET_VAR}\"\n")
            .map_err(|err| err.to_string())?;

        let outcome = AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() });
        ensure(
            matches!(
                outcome,
                Err(ConfigError::MissingEnvInterpolation { ref var }) if var == "TEST_SHOPSENSE_UNSET_VAR"
            ),
            "missing interpolation variable should be named",
        )
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SHOPSENSE_LOG_LEVEL", "warn");
        env::set_var("SHOPSENSE_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["SHOPSENSE_LOG_LEVEL", "SHOPSENSE_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SHOPSENSE_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("SHOPSENSE_PROMOTION_VALIDITY_DAYS", "14");
        env::set_var("SHOPSENSE_SCHEDULER_VIEW_TRIGGER", "background");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("shopsense.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[promotion]
validity_days = 3
max_per_user = 2

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    view_trigger: Some(ViewTriggerMode::Disabled),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.promotion.validity_days == 14, "env validity should win over file")?;
            ensure(config.promotion.max_per_user == 2, "file cap should win over default")?;
            ensure(
                config.scheduler.view_trigger == ViewTriggerMode::Disabled,
                "override trigger mode should win over env",
            )?;
            Ok(())
        })();

        clear_vars(&[
            "SHOPSENSE_DATABASE_URL",
            "SHOPSENSE_PROMOTION_VALIDITY_DAYS",
            "SHOPSENSE_SCHEDULER_VIEW_TRIGGER",
        ]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SHOPSENSE_PROMOTION_DISCOUNT_PCT", "0");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("promotion.discount_pct")
            );
            ensure(has_message, "validation failure should mention promotion.discount_pct")
        })();

        clear_vars(&["SHOPSENSE_PROMOTION_DISCOUNT_PCT"]);
        result
    }

    #[test]
    fn malformed_env_override_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SHOPSENSE_STORE_CALL_TIMEOUT_MS", "soon");

        let outcome = AppConfig::load(LoadOptions::default());
        clear_vars(&["SHOPSENSE_STORE_CALL_TIMEOUT_MS"]);

        ensure(
            matches!(
                outcome,
                Err(ConfigError::InvalidEnvOverride { ref key, .. }) if key == "SHOPSENSE_STORE_CALL_TIMEOUT_MS"
            ),
            "non-numeric timeout should be rejected with the variable name",
        )
    }

    #[test]
    fn sweep_interval_below_a_minute_is_rejected() -> Result<(), String> {
        let mut config = AppConfig::default();
        config.scheduler.sweep_interval_secs = 5;

        ensure(
            matches!(
                config.validate(),
                Err(ConfigError::Validation(ref message)) if message.contains("scheduler.sweep_interval_secs")
            ),
            "short sweep interval should fail validation",
        )
    }

    #[test]
    fn required_file_missing_is_reported() -> Result<(), String> {
        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("absent.toml");

        let outcome = AppConfig::load(LoadOptions {
            config_path: Some(path),
            require_file: true,
            ..LoadOptions::default()
        });

        ensure(
            matches!(outcome, Err(ConfigError::MissingConfigFile(_))),
            "missing required file should fail",
        )
    }
}
