use crate::commands::CommandResult;
use aprova_core::config::{AppConfig, LoadOptions};
use aprova_db::{connect, migrations, SeedReport, SqlTemplateRepository, TemplateCatalog};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let repository = SqlTemplateRepository::new(pool.clone());
        let report = TemplateCatalog::seed(&repository)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = TemplateCatalog::verify(&repository)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let run_result: Result<SeedReport, (&'static str, String, u8)> =
            if verification.iter().all(|(_, present)| *present) {
                Ok(report)
            } else {
                let missing = verification
                    .iter()
                    .filter_map(|(id, present)| (!present).then_some(*id))
                    .collect::<Vec<_>>();
                Err((
                    "seed_verification",
                    format!("templates missing after seed: {}", missing.join(", ")),
                    6u8,
                ))
            };

        pool.close().await;
        run_result
    });

    match result {
        Ok(report) => {
            let message = format!(
                "template catalog seeded: {} installed, {} already present ({} total)",
                report.inserted.len(),
                report.skipped.len(),
                report.total(),
            );
            CommandResult::success_with(
                "seed",
                message,
                serde_json::json!({
                    "installed": report.inserted.len(),
                    "already_present": report.skipped.len(),
                    "total": report.total(),
                }),
            )
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}
