use chrono::{DateTime, Utc};

use aprova_core::domain::request::EntityKind;
use aprova_core::domain::rule::{ComparisonOp, ConditionField, RuleAction, RuleCategory};
use aprova_core::domain::template::{RuleTemplate, TemplateCondition, TemplateId};

use crate::repositories::{RepositoryError, TemplateRepository};

/// Stable ids of the built-in template catalog. Seeding is keyed on these,
/// so re-running the seeder never duplicates or overwrites a template.
pub const BUILTIN_TEMPLATE_IDS: &[&str] = &[
    "tpl-expense-fast-track",
    "tpl-expense-ceiling",
    "tpl-advance-small",
    "tpl-po-trusted-requester",
    "tpl-debt-review",
    "tpl-urgent-escalation",
    "tpl-leave-keyword",
];

/// Timestamp stamped on every built-in template. Fixed so the catalog is
/// byte-for-byte deterministic across environments.
const CATALOG_STAMP: &str = "2026-01-01T00:00:00Z";

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub inserted: Vec<String>,
    pub skipped: Vec<String>,
}

impl SeedReport {
    pub fn total(&self) -> usize {
        self.inserted.len() + self.skipped.len()
    }
}

/// The built-in rule templates shipped with every deployment.
pub struct TemplateCatalog;

impl TemplateCatalog {
    pub fn builtin() -> Vec<RuleTemplate> {
        let stamp = catalog_stamp();
        vec![
            template(
                "tpl-expense-fast-track",
                RuleCategory::Entity(EntityKind::Expense),
                "Small expense fast-track",
                "Auto-approve expenses below a fixed ceiling",
                vec![slot(ConditionField::Amount, ComparisonOp::Lt, "Maximum amount")],
                RuleAction::Approve,
                "below the fast-track ceiling",
                15,
                stamp,
            ),
            template(
                "tpl-expense-ceiling",
                RuleCategory::Entity(EntityKind::Expense),
                "Expense hard ceiling",
                "Auto-reject expenses at or above a hard limit",
                vec![slot(ConditionField::Amount, ComparisonOp::Gte, "Rejection threshold")],
                RuleAction::Reject,
                "exceeds the expense ceiling",
                10,
                stamp,
            ),
            template(
                "tpl-advance-small",
                RuleCategory::Entity(EntityKind::Advance),
                "Small advance fast-track",
                "Auto-approve cash advances below a fixed amount",
                vec![slot(ConditionField::Amount, ComparisonOp::Lt, "Maximum advance")],
                RuleAction::Approve,
                "small advance within policy",
                12,
                stamp,
            ),
            template(
                "tpl-po-trusted-requester",
                RuleCategory::Entity(EntityKind::PurchaseOrder),
                "Trusted requester purchase orders",
                "Auto-approve purchase orders raised by a named requester under a cap",
                vec![
                    slot(ConditionField::RequesterId, ComparisonOp::Eq, "Requester id"),
                    slot(ConditionField::Amount, ComparisonOp::Lte, "Maximum amount"),
                ],
                RuleAction::Approve,
                "trusted requester within cap",
                20,
                stamp,
            ),
            template(
                "tpl-debt-review",
                RuleCategory::Entity(EntityKind::Debt),
                "Large debt review",
                "Escalate debt acknowledgements above a threshold for senior review",
                vec![slot(ConditionField::Amount, ComparisonOp::Gte, "Escalation threshold")],
                RuleAction::Escalate,
                "large debt needs senior review",
                8,
                stamp,
            ),
            template(
                "tpl-urgent-escalation",
                RuleCategory::General,
                "Urgent priority escalation",
                "Escalate any urgent-priority request for immediate attention",
                vec![slot(ConditionField::Priority, ComparisonOp::Eq, "Priority value")],
                RuleAction::Escalate,
                "urgent requests go straight to a senior validator",
                5,
                stamp,
            ),
            template(
                "tpl-leave-keyword",
                RuleCategory::Entity(EntityKind::Leave),
                "Routine leave keyword",
                "Auto-approve leave requests whose reason mentions a routine keyword",
                vec![slot(ConditionField::Reason, ComparisonOp::Contains, "Keyword")],
                RuleAction::Approve,
                "routine leave per policy",
                10,
                stamp,
            ),
        ]
    }

    /// Idempotent seed: inserts every built-in template that is not already
    /// present, leaving existing rows (and their usage counters) untouched.
    pub async fn seed(
        repository: &dyn TemplateRepository,
    ) -> Result<SeedReport, RepositoryError> {
        let mut report = SeedReport::default();
        for template in Self::builtin() {
            let id = template.id.0.clone();
            if repository.insert_if_absent(&template).await? {
                report.inserted.push(id);
            } else {
                report.skipped.push(id);
            }
        }
        Ok(report)
    }

    /// Confirms every catalog template is present in storage.
    pub async fn verify(
        repository: &dyn TemplateRepository,
    ) -> Result<Vec<(&'static str, bool)>, RepositoryError> {
        let mut checks = Vec::with_capacity(BUILTIN_TEMPLATE_IDS.len());
        for id in BUILTIN_TEMPLATE_IDS {
            let present =
                repository.find_by_id(&TemplateId(id.to_string())).await?.is_some();
            checks.push((*id, present));
        }
        Ok(checks)
    }
}

fn catalog_stamp() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(CATALOG_STAMP)
        .map(|stamp| stamp.with_timezone(&Utc))
        .unwrap_or_default()
}

#[allow(clippy::too_many_arguments)]
fn template(
    id: &str,
    category: RuleCategory,
    name: &str,
    description: &str,
    conditions: Vec<TemplateCondition>,
    action: RuleAction,
    action_reason: &str,
    estimated_minutes_saved: u32,
    stamp: DateTime<Utc>,
) -> RuleTemplate {
    RuleTemplate {
        id: TemplateId(id.to_string()),
        category,
        name: name.to_string(),
        description: description.to_string(),
        conditions,
        action,
        action_reason: action_reason.to_string(),
        estimated_minutes_saved,
        usage_count: 0,
        created_at: stamp,
        updated_at: stamp,
    }
}

fn slot(field: ConditionField, op: ComparisonOp, label: &str) -> TemplateCondition {
    TemplateCondition { field, op, label: label.to_string() }
}
