use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::commands::CommandResult;
use aprova_core::config::{AppConfig, LoadOptions, LogFormat};
use aprova_core::engine::ValidationEngine;
use aprova_db::{
    connect, migrations, SqlRequestRepository, SqlRuleRepository, SqlTemplateRepository,
};
use aprova_service::ValidationService;

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "sweep",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };
    init_logging(&config);

    let policy = match config.levels.policy() {
        Ok(policy) => policy,
        Err(error) => {
            return CommandResult::failure(
                "sweep",
                "config_validation",
                format!("level policy issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "sweep",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let stale_after =
        Duration::seconds(i64::try_from(config.escalation.stale_after_secs).unwrap_or(i64::MAX));

    let result = runtime.block_on(async {
        let pool = connect(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let service = ValidationService::new(
            ValidationEngine::new(policy),
            Arc::new(SqlRequestRepository::new(pool.clone())),
            Arc::new(SqlRuleRepository::new(pool.clone())),
            Arc::new(SqlTemplateRepository::new(pool.clone())),
            stale_after,
        );

        let escalated = service
            .sweep_stale(Utc::now())
            .await
            .map_err(|error| ("sweep_execution", error.to_string(), 6u8))?;

        pool.close().await;
        Ok::<Vec<_>, (&'static str, String, u8)>(escalated)
    });

    match result {
        Ok(escalated) if escalated.is_empty() => CommandResult::success_with(
            "sweep",
            "no stale pending requests",
            serde_json::json!({ "escalated": [] }),
        ),
        Ok(escalated) => {
            let ids = escalated.iter().map(|id| id.0.as_str()).collect::<Vec<_>>();
            let message = format!("escalated {} stale request(s): {}", ids.len(), ids.join(", "));
            CommandResult::success_with("sweep", message, serde_json::json!({ "escalated": ids }))
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("sweep", error_class, message, exit_code)
        }
    }
}

/// Structured logs go to stderr so stdout stays a single JSON payload.
fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let initialized = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    // A second sweep in the same process keeps the first subscriber.
    let _ = initialized;
}
