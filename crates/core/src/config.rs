use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::request::EntityKind;
use crate::levels::{FixedLevels, LevelPolicy, LevelTier};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub levels: LevelsConfig,
    pub escalation: EscalationConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
    /// How long a connection waits on a locked database before giving up.
    pub busy_timeout_ms: u64,
}

impl DatabaseConfig {
    /// Connection settings for `url` with the stock pool limits.
    pub fn for_url(url: impl Into<String>) -> Self {
        Self { url: url.into(), max_connections: 5, timeout_secs: 30, busy_timeout_ms: 5000 }
    }
}

#[derive(Clone, Debug)]
pub struct LevelsConfig {
    pub max_levels: u8,
    pub tiers: Vec<TierConfig>,
    pub fixed: Vec<FixedLevelConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TierConfig {
    pub min_amount: Decimal,
    pub levels: u8,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FixedLevelConfig {
    pub entity: String,
    pub levels: u8,
    #[serde(default = "default_entry_level")]
    pub entry_level: u8,
}

#[derive(Clone, Debug)]
pub struct EscalationConfig {
    pub stale_after_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
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
    pub stale_after_secs: Option<u64>,
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

fn default_entry_level() -> u8 {
    1
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::for_url("sqlite://aprova.db"),
            levels: LevelsConfig {
                max_levels: 4,
                tiers: vec![
                    TierConfig { min_amount: Decimal::ZERO, levels: 1 },
                    TierConfig { min_amount: Decimal::new(10_000, 0), levels: 2 },
                    TierConfig { min_amount: Decimal::new(100_000, 0), levels: 3 },
                    TierConfig { min_amount: Decimal::new(500_000, 0), levels: 4 },
                ],
                fixed: vec![
                    FixedLevelConfig { entity: "leave".to_string(), levels: 1, entry_level: 1 },
                    FixedLevelConfig { entity: "transfer".to_string(), levels: 2, entry_level: 1 },
                ],
            },
            escalation: EscalationConfig { stale_after_secs: 72 * 60 * 60 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl FromStr for LogFormat {
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

impl LevelsConfig {
    /// Builds the resolver the engine runs with. Entity names are checked
    /// during `validate`, so a failure here means the config was never
    /// validated.
    pub fn policy(&self) -> Result<LevelPolicy, ConfigError> {
        let tiers = self
            .tiers
            .iter()
            .map(|tier| LevelTier { min_amount: tier.min_amount, levels: tier.levels })
            .collect();

        let mut fixed = HashMap::new();
        for entry in &self.fixed {
            let kind = EntityKind::parse(&entry.entity).ok_or_else(|| {
                ConfigError::Validation(format!(
                    "levels.fixed entity `{}` is not a known entity kind",
                    entry.entity
                ))
            })?;
            fixed.insert(
                kind,
                FixedLevels { levels: entry.levels, entry_level: entry.entry_level },
            );
        }

        Ok(LevelPolicy::new(tiers, fixed, self.max_levels))
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("aprova.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
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
            if let Some(busy_timeout_ms) = database.busy_timeout_ms {
                self.database.busy_timeout_ms = busy_timeout_ms;
            }
        }

        if let Some(levels) = patch.levels {
            if let Some(max_levels) = levels.max_levels {
                self.levels.max_levels = max_levels;
            }
            if let Some(tiers) = levels.tiers {
                self.levels.tiers = tiers;
            }
            if let Some(fixed) = levels.fixed {
                self.levels.fixed = fixed;
            }
        }

        if let Some(escalation) = patch.escalation {
            if let Some(stale_after_secs) = escalation.stale_after_secs {
                self.escalation.stale_after_secs = stale_after_secs;
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
        if let Some(value) = read_env("APROVA_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("APROVA_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("APROVA_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("APROVA_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("APROVA_DATABASE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("APROVA_DATABASE_BUSY_TIMEOUT_MS") {
            self.database.busy_timeout_ms = parse_u64("APROVA_DATABASE_BUSY_TIMEOUT_MS", &value)?;
        }

        if let Some(value) = read_env("APROVA_LEVELS_MAX") {
            self.levels.max_levels = parse_u8("APROVA_LEVELS_MAX", &value)?;
        }

        if let Some(value) = read_env("APROVA_ESCALATION_STALE_AFTER_SECS") {
            self.escalation.stale_after_secs =
                parse_u64("APROVA_ESCALATION_STALE_AFTER_SECS", &value)?;
        }

        let log_level = read_env("APROVA_LOGGING_LEVEL").or_else(|| read_env("APROVA_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("APROVA_LOGGING_FORMAT").or_else(|| read_env("APROVA_LOG_FORMAT"));
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
        if let Some(stale_after_secs) = overrides.stale_after_secs {
            self.escalation.stale_after_secs = stale_after_secs;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_levels(&self.levels)?;
        validate_escalation(&self.escalation)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("aprova.toml"), PathBuf::from("config/aprova.toml")]
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

    if database.busy_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "database.busy_timeout_ms must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_levels(levels: &LevelsConfig) -> Result<(), ConfigError> {
    if levels.max_levels == 0 {
        return Err(ConfigError::Validation(
            "levels.max_levels must be greater than zero".to_string(),
        ));
    }

    let mut previous: Option<&TierConfig> = None;
    for tier in &levels.tiers {
        if tier.levels == 0 || tier.levels > levels.max_levels {
            return Err(ConfigError::Validation(format!(
                "levels.tiers levels must be in range 1..={}",
                levels.max_levels
            )));
        }
        if tier.min_amount.is_sign_negative() {
            return Err(ConfigError::Validation(
                "levels.tiers min_amount must not be negative".to_string(),
            ));
        }
        if let Some(prev) = previous {
            if tier.min_amount <= prev.min_amount {
                return Err(ConfigError::Validation(
                    "levels.tiers must be sorted by strictly ascending min_amount".to_string(),
                ));
            }
            if tier.levels <= prev.levels {
                return Err(ConfigError::Validation(
                    "levels.tiers must require strictly more levels as amounts grow".to_string(),
                ));
            }
        }
        previous = Some(tier);
    }

    let mut seen = Vec::new();
    for entry in &levels.fixed {
        let Some(kind) = EntityKind::parse(&entry.entity) else {
            return Err(ConfigError::Validation(format!(
                "levels.fixed entity `{}` is not a known entity kind",
                entry.entity
            )));
        };
        if seen.contains(&kind) {
            return Err(ConfigError::Validation(format!(
                "levels.fixed lists entity `{}` more than once",
                entry.entity
            )));
        }
        seen.push(kind);

        if entry.levels == 0 || entry.levels > levels.max_levels {
            return Err(ConfigError::Validation(format!(
                "levels.fixed levels for `{}` must be in range 1..={}",
                entry.entity, levels.max_levels
            )));
        }
        if entry.entry_level == 0 || entry.entry_level > entry.levels {
            return Err(ConfigError::Validation(format!(
                "levels.fixed entry_level for `{}` must be in range 1..={}",
                entry.entity, entry.levels
            )));
        }
    }

    Ok(())
}

fn validate_escalation(escalation: &EscalationConfig) -> Result<(), ConfigError> {
    if escalation.stale_after_secs == 0 {
        return Err(ConfigError::Validation(
            "escalation.stale_after_secs must be greater than zero".to_string(),
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

fn parse_u8(key: &str, value: &str) -> Result<u8, ConfigError> {
    value.parse::<u8>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    levels: Option<LevelsPatch>,
    escalation: Option<EscalationPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
    busy_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LevelsPatch {
    max_levels: Option<u8>,
    tiers: Option<Vec<TierConfig>>,
    fixed: Option<Vec<FixedLevelConfig>>,
}

#[derive(Debug, Default, Deserialize)]
struct EscalationPatch {
    stale_after_secs: Option<u64>,
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

    use rust_decimal::Decimal;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
    use crate::domain::request::EntityKind;

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
    fn defaults_validate_and_produce_a_policy() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;
        let policy =
            config.levels.policy().map_err(|err| format!("policy build failed: {err}"))?;

        ensure(policy.max_levels() == 4, "default ceiling should be four levels")?;
        ensure(
            config.database.busy_timeout_ms == 5000,
            "default busy timeout should be five seconds",
        )?;
        let fixed = policy.resolve(EntityKind::Leave, None);
        ensure(fixed.required_level == 1, "leave should resolve to one fixed level")?;
        let tiered = policy.resolve(EntityKind::Expense, Some(Decimal::new(250_000, 0)));
        ensure(tiered.required_level == 3, "250k should land in the third tier")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_APROVA_DB_NAME", "interpolated");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("aprova.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://${TEST_APROVA_DB_NAME}.db"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://interpolated.db",
                "database url should be interpolated from the environment",
            )
        })();

        clear_vars(&["TEST_APROVA_DB_NAME"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("APROVA_LOG_LEVEL", "warn");
        env::set_var("APROVA_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )
        })();

        clear_vars(&["APROVA_LOG_LEVEL", "APROVA_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("APROVA_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("APROVA_DATABASE_BUSY_TIMEOUT_MS", "2500");
        env::set_var("APROVA_ESCALATION_STALE_AFTER_SECS", "3600");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("aprova.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"
busy_timeout_ms = 1500

[escalation]
stale_after_secs = 60

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
            ensure(
                config.database.busy_timeout_ms == 2500,
                "env busy timeout should win over the file",
            )?;
            ensure(
                config.escalation.stale_after_secs == 3600,
                "env staleness window should win over the file",
            )
        })();

        clear_vars(&[
            "APROVA_DATABASE_URL",
            "APROVA_DATABASE_BUSY_TIMEOUT_MS",
            "APROVA_ESCALATION_STALE_AFTER_SECS",
        ]);
        result
    }

    #[test]
    fn missing_required_file_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("absent.toml");
        let error = match AppConfig::load(LoadOptions {
            config_path: Some(path),
            require_file: true,
            ..LoadOptions::default()
        }) {
            Ok(_) => return Err("expected a missing-file failure".to_string()),
            Err(error) => error,
        };

        ensure(
            matches!(error, ConfigError::MissingConfigFile(_)),
            "missing required file should surface as MissingConfigFile",
        )
    }

    #[test]
    fn non_monotonic_tiers_fail_validation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("aprova.toml");
        fs::write(
            &path,
            r#"
[levels]
max_levels = 3

[[levels.tiers]]
min_amount = 0
levels = 2

[[levels.tiers]]
min_amount = 10000
levels = 1
"#,
        )
        .map_err(|err| err.to_string())?;

        let error = match AppConfig::load(LoadOptions {
            config_path: Some(path),
            ..LoadOptions::default()
        }) {
            Ok(_) => return Err("expected tier validation failure".to_string()),
            Err(error) => error,
        };

        let has_message = matches!(
            error,
            ConfigError::Validation(ref message) if message.contains("strictly more levels")
        );
        ensure(has_message, "validation failure should mention tier monotonicity")
    }

    #[test]
    fn unknown_fixed_entity_fails_validation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("aprova.toml");
        fs::write(
            &path,
            r#"
[[levels.fixed]]
entity = "vacation"
levels = 1
"#,
        )
        .map_err(|err| err.to_string())?;

        let error = match AppConfig::load(LoadOptions {
            config_path: Some(path),
            ..LoadOptions::default()
        }) {
            Ok(_) => return Err("expected fixed-entity validation failure".to_string()),
            Err(error) => error,
        };

        let has_message = matches!(
            error,
            ConfigError::Validation(ref message) if message.contains("vacation")
        );
        ensure(has_message, "validation failure should name the unknown entity")
    }

    #[test]
    fn invalid_env_override_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("APROVA_DATABASE_MAX_CONNECTIONS", "many");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected an env override failure".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(
                    error,
                    ConfigError::InvalidEnvOverride { ref key, .. }
                        if key == "APROVA_DATABASE_MAX_CONNECTIONS"
                ),
                "the failing key should be reported",
            )
        })();

        clear_vars(&["APROVA_DATABASE_MAX_CONNECTIONS"]);
        result
    }
}
