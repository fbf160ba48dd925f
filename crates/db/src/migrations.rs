use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

/// Number of distinct migration versions this binary ships with. Reversible
/// migrations carry an up and a down entry per version, so the raw iterator
/// length over-counts.
pub fn known_version_count() -> usize {
    let mut versions: Vec<i64> = MIGRATOR.iter().map(|migration| migration.version).collect();
    versions.sort_unstable();
    versions.dedup();
    versions.len()
}

/// How many migrations the database records as applied; zero on a fresh
/// database where the bookkeeping table does not exist yet.
pub async fn applied_version_count(pool: &DbPool) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(1) FROM _sqlx_migrations WHERE success = 1")
        .fetch_one(pool)
        .await
        .unwrap_or(0)
}
