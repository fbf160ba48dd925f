use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use aprova_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    let mut push = |key_path: &str, value: &str, env_keys: &[&str]| {
        lines.push(render_line(
            key_path,
            value,
            field_source(
                key_path,
                env_keys,
                config_file_doc.as_ref(),
                config_file_path.as_deref(),
            ),
        ));
    };

    push("database.url", &config.database.url, &["APROVA_DATABASE_URL"]);
    push(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        &["APROVA_DATABASE_MAX_CONNECTIONS"],
    );
    push(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        &["APROVA_DATABASE_TIMEOUT_SECS"],
    );
    push(
        "database.busy_timeout_ms",
        &config.database.busy_timeout_ms.to_string(),
        &["APROVA_DATABASE_BUSY_TIMEOUT_MS"],
    );
    push(
        "levels.max_levels",
        &config.levels.max_levels.to_string(),
        &["APROVA_LEVELS_MAX"],
    );
    push(
        "escalation.stale_after_secs",
        &config.escalation.stale_after_secs.to_string(),
        &["APROVA_ESCALATION_STALE_AFTER_SECS"],
    );
    push(
        "logging.level",
        &config.logging.level,
        &["APROVA_LOGGING_LEVEL", "APROVA_LOG_LEVEL"],
    );
    push(
        "logging.format",
        &format!("{:?}", config.logging.format),
        &["APROVA_LOGGING_FORMAT", "APROVA_LOG_FORMAT"],
    );

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("aprova.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/aprova.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    for env_key in env_keys {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
