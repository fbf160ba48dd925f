use async_trait::async_trait;
use thiserror::Error;

use aprova_core::domain::request::{EntityKind, RequestId, RequestStatus, ValidationRequest};
use aprova_core::domain::rule::{Rule, RuleCategory, RuleId};
use aprova_core::domain::template::{RuleTemplate, TemplateId};
use aprova_core::domain::validation::Validation;

pub mod memory;
pub mod request;
pub mod rule;

pub use memory::{InMemoryRequestRepository, InMemoryRuleRepository, InMemoryTemplateRepository};
pub use request::SqlRequestRepository;
pub use rule::{SqlRuleRepository, SqlTemplateRepository};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Storage for validation requests and their embedded audit trail.
///
/// Validation rows are append-only; nothing in this trait (or its
/// implementations) can rewrite or remove one once inserted.
#[async_trait]
pub trait RequestRepository: Send + Sync {
    /// Persists a freshly created request together with any validations it
    /// already carries (the synthetic record of an auto-decision), in one
    /// transaction.
    async fn insert(&self, request: &ValidationRequest) -> Result<(), RepositoryError>;

    async fn find_by_id(
        &self,
        id: &RequestId,
    ) -> Result<Option<ValidationRequest>, RepositoryError>;

    /// Compare-and-set write: persists `request` (and appends `appended`, if
    /// any) only if the stored row still carries `expected_version`. Returns
    /// `false` when another writer got there first; nothing is written in
    /// that case.
    async fn update_guarded(
        &self,
        request: &ValidationRequest,
        appended: Option<&Validation>,
        expected_version: u32,
    ) -> Result<bool, RepositoryError>;

    async fn list_by_status(
        &self,
        statuses: &[RequestStatus],
    ) -> Result<Vec<ValidationRequest>, RepositoryError>;

    async fn find_by_entity(
        &self,
        kind: EntityKind,
        entity_id: &str,
    ) -> Result<Vec<ValidationRequest>, RepositoryError>;
}

#[async_trait]
pub trait RuleRepository: Send + Sync {
    /// Active rules applicable to `kind`: its own category plus `general`,
    /// ordered by position ascending (ties by id).
    async fn list_active_for(&self, kind: EntityKind) -> Result<Vec<Rule>, RepositoryError>;

    async fn list(&self, category: Option<RuleCategory>) -> Result<Vec<Rule>, RepositoryError>;

    async fn find_by_id(&self, id: &RuleId) -> Result<Option<Rule>, RepositoryError>;

    async fn upsert(&self, rule: &Rule) -> Result<(), RepositoryError>;

    /// Flips the active flag. Returns `false` when no such rule exists.
    async fn set_active(&self, id: &RuleId, active: bool) -> Result<bool, RepositoryError>;

    /// Highest configured position within a category, `None` when the
    /// category has no rules yet.
    async fn max_position(&self, category: RuleCategory) -> Result<Option<u32>, RepositoryError>;
}

#[async_trait]
pub trait TemplateRepository: Send + Sync {
    /// Optionally filtered by category and by case-insensitive substring
    /// match over the template name.
    async fn list(
        &self,
        category: Option<RuleCategory>,
        search: Option<&str>,
    ) -> Result<Vec<RuleTemplate>, RepositoryError>;

    async fn find_by_id(&self, id: &TemplateId) -> Result<Option<RuleTemplate>, RepositoryError>;

    /// Bumps the usage counter. Returns `false` when no such template exists.
    async fn record_use(&self, id: &TemplateId) -> Result<bool, RepositoryError>;

    /// Seeding helper: inserts the template unless its id is already
    /// present. Returns `true` when a row was inserted.
    async fn insert_if_absent(&self, template: &RuleTemplate) -> Result<bool, RepositoryError>;
}
