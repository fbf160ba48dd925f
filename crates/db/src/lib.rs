pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, DbPool};
pub use fixtures::{SeedReport, TemplateCatalog};
pub use repositories::{
    InMemoryRequestRepository, InMemoryRuleRepository, InMemoryTemplateRepository,
    RepositoryError, RequestRepository, RuleRepository, SqlRequestRepository, SqlRuleRepository,
    SqlTemplateRepository, TemplateRepository,
};
