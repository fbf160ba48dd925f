//! Map-backed repositories for tests and ephemeral tooling. Semantics
//! (ordering, guarded writes, idempotent seeding) mirror the SQL
//! implementations.

use std::collections::HashMap;

use tokio::sync::RwLock;

use aprova_core::domain::request::{EntityKind, RequestId, RequestStatus, ValidationRequest};
use aprova_core::domain::rule::{Rule, RuleCategory, RuleId};
use aprova_core::domain::template::{RuleTemplate, TemplateId};
use aprova_core::domain::validation::Validation;

use super::{
    RepositoryError, RequestRepository, RuleRepository, TemplateRepository,
};

#[derive(Default)]
pub struct InMemoryRequestRepository {
    requests: RwLock<HashMap<RequestId, ValidationRequest>>,
}

impl InMemoryRequestRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl RequestRepository for InMemoryRequestRepository {
    async fn insert(&self, request: &ValidationRequest) -> Result<(), RepositoryError> {
        let mut requests = self.requests.write().await;
        requests.insert(request.id.clone(), request.clone());
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &RequestId,
    ) -> Result<Option<ValidationRequest>, RepositoryError> {
        let requests = self.requests.read().await;
        Ok(requests.get(id).cloned())
    }

    async fn update_guarded(
        &self,
        request: &ValidationRequest,
        _appended: Option<&Validation>,
        expected_version: u32,
    ) -> Result<bool, RepositoryError> {
        let mut requests = self.requests.write().await;
        match requests.get_mut(&request.id) {
            Some(stored) if stored.version == expected_version => {
                *stored = request.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_by_status(
        &self,
        statuses: &[RequestStatus],
    ) -> Result<Vec<ValidationRequest>, RepositoryError> {
        let requests = self.requests.read().await;
        let mut matches: Vec<ValidationRequest> = requests
            .values()
            .filter(|request| statuses.contains(&request.status))
            .cloned()
            .collect();
        matches.sort_by(|a, b| {
            a.created_at.cmp(&b.created_at).then_with(|| a.id.0.cmp(&b.id.0))
        });
        Ok(matches)
    }

    async fn find_by_entity(
        &self,
        kind: EntityKind,
        entity_id: &str,
    ) -> Result<Vec<ValidationRequest>, RepositoryError> {
        let requests = self.requests.read().await;
        let mut matches: Vec<ValidationRequest> = requests
            .values()
            .filter(|request| request.entity_kind == kind && request.entity_id == entity_id)
            .cloned()
            .collect();
        matches.sort_by(|a, b| {
            a.created_at.cmp(&b.created_at).then_with(|| a.id.0.cmp(&b.id.0))
        });
        Ok(matches)
    }
}

#[derive(Default)]
pub struct InMemoryRuleRepository {
    rules: RwLock<HashMap<RuleId, Rule>>,
}

impl InMemoryRuleRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_by_position(mut rules: Vec<Rule>) -> Vec<Rule> {
    rules.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.0.cmp(&b.id.0)));
    rules
}

#[async_trait::async_trait]
impl RuleRepository for InMemoryRuleRepository {
    async fn list_active_for(&self, kind: EntityKind) -> Result<Vec<Rule>, RepositoryError> {
        let rules = self.rules.read().await;
        let matches = rules
            .values()
            .filter(|rule| rule.active && rule.category.applies_to(kind))
            .cloned()
            .collect();
        Ok(sorted_by_position(matches))
    }

    async fn list(&self, category: Option<RuleCategory>) -> Result<Vec<Rule>, RepositoryError> {
        let rules = self.rules.read().await;
        let matches = rules
            .values()
            .filter(|rule| category.map_or(true, |category| rule.category == category))
            .cloned()
            .collect();
        Ok(sorted_by_position(matches))
    }

    async fn find_by_id(&self, id: &RuleId) -> Result<Option<Rule>, RepositoryError> {
        let rules = self.rules.read().await;
        Ok(rules.get(id).cloned())
    }

    async fn upsert(&self, rule: &Rule) -> Result<(), RepositoryError> {
        let mut rules = self.rules.write().await;
        rules.insert(rule.id.clone(), rule.clone());
        Ok(())
    }

    async fn set_active(&self, id: &RuleId, active: bool) -> Result<bool, RepositoryError> {
        let mut rules = self.rules.write().await;
        match rules.get_mut(id) {
            Some(rule) => {
                rule.active = active;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn max_position(&self, category: RuleCategory) -> Result<Option<u32>, RepositoryError> {
        let rules = self.rules.read().await;
        Ok(rules
            .values()
            .filter(|rule| rule.category == category)
            .map(|rule| rule.position)
            .max())
    }
}

#[derive(Default)]
pub struct InMemoryTemplateRepository {
    templates: RwLock<HashMap<TemplateId, RuleTemplate>>,
}

impl InMemoryTemplateRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl TemplateRepository for InMemoryTemplateRepository {
    async fn list(
        &self,
        category: Option<RuleCategory>,
        search: Option<&str>,
    ) -> Result<Vec<RuleTemplate>, RepositoryError> {
        let templates = self.templates.read().await;
        let needle = search.map(str::to_lowercase);
        let mut matches: Vec<RuleTemplate> = templates
            .values()
            .filter(|template| {
                category.map_or(true, |category| template.category == category)
                    && needle
                        .as_deref()
                        .map_or(true, |needle| template.name.to_lowercase().contains(needle))
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.0.cmp(&b.id.0)));
        Ok(matches)
    }

    async fn find_by_id(&self, id: &TemplateId) -> Result<Option<RuleTemplate>, RepositoryError> {
        let templates = self.templates.read().await;
        Ok(templates.get(id).cloned())
    }

    async fn record_use(&self, id: &TemplateId) -> Result<bool, RepositoryError> {
        let mut templates = self.templates.write().await;
        match templates.get_mut(id) {
            Some(template) => {
                template.usage_count += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_if_absent(&self, template: &RuleTemplate) -> Result<bool, RepositoryError> {
        let mut templates = self.templates.write().await;
        if templates.contains_key(&template.id) {
            return Ok(false);
        }
        templates.insert(template.id.clone(), template.clone());
        Ok(true)
    }
}
