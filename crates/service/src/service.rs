use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use aprova_core::domain::request::{
    EntityKind, RequestId, RequestStatus, ValidationRequest,
};
use aprova_core::domain::rule::{
    Rule, RuleAction, RuleCategory, RuleCondition, RuleId,
};
use aprova_core::domain::template::{RuleTemplate, TemplateId};
use aprova_core::engine::{DecisionInput, NewRequest, ValidationEngine};
use aprova_db::repositories::{RequestRepository, RuleRepository, TemplateRepository};

use crate::error::ServiceError;

/// Filter for the pending-work queue. `validator_level` keeps only requests
/// the given level is allowed to act on; `workspace` is an exact match.
#[derive(Clone, Debug, Default)]
pub struct PendingFilter {
    pub validator_level: Option<u8>,
    pub workspace: Option<String>,
}

/// Client-supplied rule content. Without an id a new rule is created; with
/// one the stored rule is replaced, keeping its creation timestamp. An id
/// that matches no stored rule inserts under that id.
#[derive(Clone, Debug)]
pub struct RuleDraft {
    pub id: Option<RuleId>,
    pub category: RuleCategory,
    pub name: String,
    pub conditions: Vec<RuleCondition>,
    pub action: RuleAction,
    pub action_reason: String,
    pub position: Option<u32>,
    pub active: bool,
}

/// Gap left between rule positions so later inserts can slot in between
/// without renumbering.
const POSITION_GAP: u32 = 10;

/// Application facade over the lifecycle engine and the repositories.
/// Mutations persist through guarded writes; a lost race surfaces as
/// [`ServiceError::ConcurrentModification`] and is never retried here.
pub struct ValidationService {
    engine: ValidationEngine,
    requests: Arc<dyn RequestRepository>,
    rules: Arc<dyn RuleRepository>,
    templates: Arc<dyn TemplateRepository>,
    stale_after: Duration,
}

impl ValidationService {
    pub fn new(
        engine: ValidationEngine,
        requests: Arc<dyn RequestRepository>,
        rules: Arc<dyn RuleRepository>,
        templates: Arc<dyn TemplateRepository>,
        stale_after: Duration,
    ) -> Self {
        Self { engine, requests, rules, templates, stale_after }
    }

    pub async fn create_request(
        &self,
        input: NewRequest,
    ) -> Result<ValidationRequest, ServiceError> {
        let rules = self.rules.list_active_for(input.entity_kind).await?;
        let transition = self.engine.create(
            RequestId(Uuid::new_v4().to_string()),
            input,
            &rules,
            Utc::now(),
        );
        self.requests.insert(&transition.request).await?;

        tracing::info!(
            event_name = "validation.request_created",
            request_id = %transition.request.id.0,
            entity_kind = transition.request.entity_kind.as_str(),
            status = transition.request.status.as_str(),
            required_level = transition.request.required_level,
            auto_decided = transition.appended.is_some(),
            "validation request created"
        );
        Ok(transition.request)
    }

    pub async fn process(
        &self,
        request_id: &RequestId,
        input: DecisionInput,
    ) -> Result<ValidationRequest, ServiceError> {
        let stored = self.load_request(request_id).await?;
        let expected_version = stored.version;
        let transition = self.engine.process(&stored, input, Utc::now())?;

        let applied = self
            .requests
            .update_guarded(&transition.request, transition.appended.as_ref(), expected_version)
            .await?;
        if !applied {
            return Err(ServiceError::ConcurrentModification { id: request_id.0.clone() });
        }

        tracing::info!(
            event_name = "validation.decision_processed",
            request_id = %request_id.0,
            status = transition.request.status.as_str(),
            current_level = transition.request.current_level,
            "decision processed"
        );
        Ok(transition.request)
    }

    /// No-op for requests already escalated or finalized: the stored
    /// request comes back unchanged.
    pub async fn escalate(
        &self,
        request_id: &RequestId,
    ) -> Result<ValidationRequest, ServiceError> {
        let stored = self.load_request(request_id).await?;
        let expected_version = stored.version;

        let Some(updated) = self.engine.escalate(&stored, Utc::now()) else {
            return Ok(stored);
        };

        let applied = self.requests.update_guarded(&updated, None, expected_version).await?;
        if !applied {
            return Err(ServiceError::ConcurrentModification { id: request_id.0.clone() });
        }

        tracing::info!(
            event_name = "validation.escalated",
            request_id = %request_id.0,
            minimum_validator_level = updated.minimum_validator_level(),
            "request escalated"
        );
        Ok(updated)
    }

    pub async fn cancel(
        &self,
        request_id: &RequestId,
        cancelled_by: &str,
    ) -> Result<ValidationRequest, ServiceError> {
        let stored = self.load_request(request_id).await?;
        let expected_version = stored.version;
        let updated = self.engine.cancel(&stored, cancelled_by, Utc::now())?;

        let applied = self.requests.update_guarded(&updated, None, expected_version).await?;
        if !applied {
            return Err(ServiceError::ConcurrentModification { id: request_id.0.clone() });
        }

        tracing::info!(
            event_name = "validation.cancelled",
            request_id = %request_id.0,
            cancelled_by,
            "request cancelled"
        );
        Ok(updated)
    }

    /// Open requests (`pending` and `escalated`), most urgent first and
    /// oldest first within a priority.
    pub async fn list_pending(
        &self,
        filter: PendingFilter,
    ) -> Result<Vec<ValidationRequest>, ServiceError> {
        let mut pending = self
            .requests
            .list_by_status(&[RequestStatus::Pending, RequestStatus::Escalated])
            .await?;

        if let Some(workspace) = &filter.workspace {
            pending.retain(|request| &request.workspace == workspace);
        }
        if let Some(level) = filter.validator_level {
            pending.retain(|request| request.minimum_validator_level() <= level);
        }

        pending.sort_by(|a, b| {
            b.priority
                .rank()
                .cmp(&a.priority.rank())
                .then_with(|| a.created_at.cmp(&b.created_at))
        });

        tracing::info!(
            event_name = "validation.pending_listed",
            count = pending.len(),
            "pending requests listed"
        );
        Ok(pending)
    }

    /// Every request ever raised for the entity, oldest first, with full
    /// audit trails.
    pub async fn history(
        &self,
        entity_kind: EntityKind,
        entity_id: &str,
    ) -> Result<Vec<ValidationRequest>, ServiceError> {
        let history = self.requests.find_by_entity(entity_kind, entity_id).await?;

        tracing::info!(
            event_name = "validation.history_listed",
            entity_kind = entity_kind.as_str(),
            entity_id,
            count = history.len(),
            "entity history listed"
        );
        Ok(history)
    }

    pub async fn list_templates(
        &self,
        category: Option<RuleCategory>,
        search: Option<&str>,
    ) -> Result<Vec<RuleTemplate>, ServiceError> {
        let templates = self.templates.list(category, search).await?;

        tracing::info!(
            event_name = "validation.templates_listed",
            count = templates.len(),
            "rule templates listed"
        );
        Ok(templates)
    }

    /// Turns a template plus concrete values into a live rule, placed after
    /// the last rule of its category.
    pub async fn instantiate_template(
        &self,
        template_id: &TemplateId,
        values: &[String],
    ) -> Result<Rule, ServiceError> {
        let template = self
            .templates
            .find_by_id(template_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound {
                kind: "template",
                id: template_id.0.clone(),
            })?;

        let position = self
            .rules
            .max_position(template.category)
            .await?
            .map_or(POSITION_GAP, |max| max.saturating_add(POSITION_GAP));

        let rule = template.instantiate(
            RuleId(Uuid::new_v4().to_string()),
            values,
            position,
            Utc::now(),
        )?;
        self.rules.upsert(&rule).await?;
        self.templates.record_use(template_id).await?;

        tracing::info!(
            event_name = "validation.template_instantiated",
            template_id = %template_id.0,
            rule_id = %rule.id.0,
            position = rule.position,
            "template instantiated into rule"
        );
        Ok(rule)
    }

    pub async fn list_rules(
        &self,
        category: Option<RuleCategory>,
    ) -> Result<Vec<Rule>, ServiceError> {
        let rules = self.rules.list(category).await?;

        tracing::info!(
            event_name = "validation.rules_listed",
            count = rules.len(),
            "decision rules listed"
        );
        Ok(rules)
    }

    pub async fn upsert_rule(&self, draft: RuleDraft) -> Result<Rule, ServiceError> {
        let now = Utc::now();

        // A draft id that matches nothing inserts under that id.
        let existing = match &draft.id {
            Some(id) => self.rules.find_by_id(id).await?,
            None => None,
        };

        let position = match draft.position {
            Some(position) => position,
            None => match &existing {
                Some(rule) => rule.position,
                None => self
                    .rules
                    .max_position(draft.category)
                    .await?
                    .map_or(POSITION_GAP, |max| max.saturating_add(POSITION_GAP)),
            },
        };

        let rule = Rule {
            id: draft
                .id
                .unwrap_or_else(|| RuleId(Uuid::new_v4().to_string())),
            category: draft.category,
            name: draft.name,
            conditions: draft.conditions,
            action: draft.action,
            action_reason: draft.action_reason,
            position,
            active: draft.active,
            created_at: existing.as_ref().map_or(now, |rule| rule.created_at),
            updated_at: now,
        };
        rule.validate()?;
        self.rules.upsert(&rule).await?;

        tracing::info!(
            event_name = "validation.rule_upserted",
            rule_id = %rule.id.0,
            category = rule.category.as_str(),
            active = rule.active,
            "decision rule upserted"
        );
        Ok(rule)
    }

    pub async fn deactivate_rule(&self, rule_id: &RuleId) -> Result<Rule, ServiceError> {
        let deactivated = self.rules.set_active(rule_id, false).await?;
        if !deactivated {
            return Err(ServiceError::NotFound { kind: "rule", id: rule_id.0.clone() });
        }

        let rule = self.rules.find_by_id(rule_id).await?.ok_or_else(|| ServiceError::NotFound {
            kind: "rule",
            id: rule_id.0.clone(),
        })?;

        tracing::info!(
            event_name = "validation.rule_deactivated",
            rule_id = %rule_id.0,
            "decision rule deactivated"
        );
        Ok(rule)
    }

    /// Escalates every pending request untouched for longer than the
    /// configured staleness window. Requests that lose their guarded write
    /// (someone acted on them mid-sweep) are skipped, not retried.
    pub async fn sweep_stale(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<RequestId>, ServiceError> {
        let pending = self.requests.list_by_status(&[RequestStatus::Pending]).await?;
        let cutoff = now - self.stale_after;

        let mut escalated = Vec::new();
        for request in pending {
            if request.updated_at > cutoff {
                continue;
            }
            let Some(updated) = self.engine.escalate(&request, now) else {
                continue;
            };
            if self.requests.update_guarded(&updated, None, request.version).await? {
                escalated.push(updated.id);
            }
        }

        tracing::info!(
            event_name = "validation.sweep_completed",
            escalated = escalated.len(),
            stale_after_secs = self.stale_after.num_seconds(),
            "stale request sweep completed"
        );
        Ok(escalated)
    }

    async fn load_request(
        &self,
        request_id: &RequestId,
    ) -> Result<ValidationRequest, ServiceError> {
        self.requests.find_by_id(request_id).await?.ok_or_else(|| ServiceError::NotFound {
            kind: "request",
            id: request_id.0.clone(),
        })
    }
}
