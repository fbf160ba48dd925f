use aprova_core::config::DatabaseConfig;
use aprova_core::domain::request::EntityKind;
use aprova_core::domain::rule::{RuleCategory, RuleId};
use aprova_db::fixtures::BUILTIN_TEMPLATE_IDS;
use aprova_db::{connect, migrations, SqlTemplateRepository, TemplateCatalog, TemplateRepository};

async fn setup_pool() -> aprova_db::DbPool {
    let config =
        DatabaseConfig { max_connections: 1, ..DatabaseConfig::for_url("sqlite::memory:") };
    let pool = connect(&config).await.expect("connect test pool");
    migrations::run_pending(&pool).await.expect("run migrations");
    pool
}

#[tokio::test]
async fn seeding_is_idempotent_and_satisfies_the_contract() {
    let pool = setup_pool().await;
    let repo = SqlTemplateRepository::new(pool.clone());

    let first = TemplateCatalog::seed(&repo).await.expect("first seed");
    assert_eq!(first.inserted.len(), BUILTIN_TEMPLATE_IDS.len());
    assert!(first.skipped.is_empty());

    let checks = TemplateCatalog::verify(&repo).await.expect("verify");
    assert!(checks.iter().all(|(_, present)| *present), "all templates present: {checks:?}");

    let second = TemplateCatalog::seed(&repo).await.expect("second seed");
    assert!(second.inserted.is_empty());
    assert_eq!(second.skipped.len(), BUILTIN_TEMPLATE_IDS.len());

    pool.close().await;
}

#[tokio::test]
async fn reseeding_preserves_usage_counters() {
    let pool = setup_pool().await;
    let repo = SqlTemplateRepository::new(pool.clone());

    TemplateCatalog::seed(&repo).await.expect("seed");

    let fast_track =
        aprova_core::domain::template::TemplateId("tpl-expense-fast-track".to_string());
    assert!(repo.record_use(&fast_track).await.expect("record use"));

    TemplateCatalog::seed(&repo).await.expect("reseed");

    let stored = repo.find_by_id(&fast_track).await.expect("find").expect("exists");
    assert_eq!(stored.usage_count, 1);

    pool.close().await;
}

#[tokio::test]
async fn seeded_templates_instantiate_into_valid_rules() {
    let pool = setup_pool().await;
    let repo = SqlTemplateRepository::new(pool.clone());

    TemplateCatalog::seed(&repo).await.expect("seed");

    let expense = repo
        .list(Some(RuleCategory::Entity(EntityKind::Expense)), None)
        .await
        .expect("list expense templates");
    assert_eq!(expense.len(), 2);

    for template in expense {
        let values: Vec<String> =
            template.conditions.iter().map(|_| "100.00".to_string()).collect();
        let rule = template
            .instantiate(
                RuleId(format!("r-from-{}", template.id.0)),
                &values,
                10,
                chrono::Utc::now(),
            )
            .expect("instantiate with numeric values");
        assert!(rule.active);
        assert_eq!(rule.category, template.category);
    }

    pool.close().await;
}
