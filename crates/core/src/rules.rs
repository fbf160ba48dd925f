//! Condition evaluation and first-match rule selection.
//!
//! Evaluation is total: any comparison that cannot be made (absent
//! attribute, type drift in stored data) is a non-match, never a panic.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::request::ValidationRequest;
use crate::domain::rule::{
    ComparisonOp, ConditionField, ConditionValue, Rule, RuleCondition,
};

/// A request attribute read through the closed field enumeration.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue<'a> {
    Number(Decimal),
    Text(&'a str),
    Date(DateTime<Utc>),
}

/// Typed accessor for the attributes conditions may inspect. `None` means
/// the attribute is absent on this request (an amountless request has no
/// `amount`).
pub fn field_value<'a>(request: &'a ValidationRequest, field: ConditionField) -> Option<FieldValue<'a>> {
    match field {
        ConditionField::Amount => request.amount.map(FieldValue::Number),
        ConditionField::Reason => Some(FieldValue::Text(&request.reason)),
        ConditionField::RequesterId => Some(FieldValue::Text(&request.requester_id)),
        ConditionField::EntityId => Some(FieldValue::Text(&request.entity_id)),
        ConditionField::Priority => Some(FieldValue::Text(request.priority.as_str())),
        ConditionField::CreatedAt => Some(FieldValue::Date(request.created_at)),
    }
}

pub fn condition_matches(condition: &RuleCondition, request: &ValidationRequest) -> bool {
    let Some(actual) = field_value(request, condition.field) else {
        return false;
    };

    match (&actual, &condition.value) {
        (FieldValue::Number(lhs), ConditionValue::Number(rhs)) => {
            compare_ordered(lhs, rhs, condition.op)
        }
        (FieldValue::Date(lhs), ConditionValue::Date(rhs)) => {
            compare_ordered(lhs, rhs, condition.op)
        }
        (FieldValue::Text(lhs), ConditionValue::Text(rhs)) => {
            compare_text(lhs, rhs, condition.op)
        }
        _ => false,
    }
}

/// AND over all conditions. A rule that somehow reached the evaluator with
/// no conditions never matches; save-time validation forbids such rules.
pub fn rule_matches(rule: &Rule, request: &ValidationRequest) -> bool {
    !rule.conditions.is_empty()
        && rule
            .conditions
            .iter()
            .all(|condition| condition_matches(condition, request))
}

/// First-match-wins over the active rules applicable to the request's
/// entity kind, in `position` order (ties broken by id so the outcome does
/// not depend on storage order).
pub fn first_match<'a>(rules: &'a [Rule], request: &ValidationRequest) -> Option<&'a Rule> {
    let mut applicable: Vec<&Rule> = rules
        .iter()
        .filter(|rule| rule.active && rule.category.applies_to(request.entity_kind))
        .collect();
    applicable.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.0.cmp(&b.id.0)));
    applicable.into_iter().find(|rule| rule_matches(rule, request))
}

fn compare_ordered<T: PartialOrd>(lhs: &T, rhs: &T, op: ComparisonOp) -> bool {
    match op {
        ComparisonOp::Eq => lhs == rhs,
        ComparisonOp::NotEq => lhs != rhs,
        ComparisonOp::Gt => lhs > rhs,
        ComparisonOp::Gte => lhs >= rhs,
        ComparisonOp::Lt => lhs < rhs,
        ComparisonOp::Lte => lhs <= rhs,
        ComparisonOp::Contains | ComparisonOp::StartsWith => false,
    }
}

fn compare_text(lhs: &str, rhs: &str, op: ComparisonOp) -> bool {
    match op {
        ComparisonOp::Eq => lhs == rhs,
        ComparisonOp::NotEq => lhs != rhs,
        ComparisonOp::Contains => lhs.contains(rhs),
        ComparisonOp::StartsWith => lhs.starts_with(rhs),
        ComparisonOp::Gt | ComparisonOp::Gte | ComparisonOp::Lt | ComparisonOp::Lte => false,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::{condition_matches, first_match, rule_matches};
    use crate::domain::request::{
        EntityKind, Priority, RequestId, RequestStatus, ValidationRequest,
    };
    use crate::domain::rule::{
        ComparisonOp, ConditionField, ConditionValue, Rule, RuleAction, RuleCategory,
        RuleCondition, RuleId,
    };

    fn sample_request(amount: Option<Decimal>) -> ValidationRequest {
        ValidationRequest {
            id: RequestId("vr-1".to_string()),
            workspace: "acme".to_string(),
            entity_kind: EntityKind::Expense,
            entity_id: "exp-42".to_string(),
            amount,
            reason: "travel to supplier audit".to_string(),
            requester_id: "u-7".to_string(),
            priority: Priority::High,
            status: RequestStatus::Pending,
            current_level: 1,
            required_level: 2,
            entry_level: 1,
            validations: Vec::new(),
            version: 1,
            cancelled_by: None,
            created_at: Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap(),
        }
    }

    fn amount_condition(op: ComparisonOp, value: i64) -> RuleCondition {
        RuleCondition {
            field: ConditionField::Amount,
            op,
            value: ConditionValue::Number(Decimal::new(value, 0)),
        }
    }

    fn rule(id: &str, position: u32, conditions: Vec<RuleCondition>, action: RuleAction) -> Rule {
        Rule {
            id: RuleId(id.to_string()),
            category: RuleCategory::Entity(EntityKind::Expense),
            name: format!("rule {id}"),
            conditions,
            action,
            action_reason: "policy".to_string(),
            position,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn number_comparisons_follow_the_operator() {
        let request = sample_request(Some(Decimal::new(500, 0)));

        assert!(condition_matches(&amount_condition(ComparisonOp::Eq, 500), &request));
        assert!(condition_matches(&amount_condition(ComparisonOp::Gte, 500), &request));
        assert!(condition_matches(&amount_condition(ComparisonOp::Lt, 501), &request));
        assert!(!condition_matches(&amount_condition(ComparisonOp::Gt, 500), &request));
        assert!(!condition_matches(&amount_condition(ComparisonOp::NotEq, 500), &request));
    }

    #[test]
    fn missing_amount_never_matches() {
        let request = sample_request(None);
        for op in [
            ComparisonOp::Eq,
            ComparisonOp::NotEq,
            ComparisonOp::Gt,
            ComparisonOp::Lt,
        ] {
            assert!(!condition_matches(&amount_condition(op, 0), &request));
        }
    }

    #[test]
    fn text_comparisons_cover_contains_and_prefix() {
        let request = sample_request(None);
        let contains = RuleCondition {
            field: ConditionField::Reason,
            op: ComparisonOp::Contains,
            value: ConditionValue::Text("supplier".to_string()),
        };
        let prefix = RuleCondition {
            field: ConditionField::Reason,
            op: ComparisonOp::StartsWith,
            value: ConditionValue::Text("travel".to_string()),
        };
        let wrong_prefix = RuleCondition {
            field: ConditionField::Reason,
            op: ComparisonOp::StartsWith,
            value: ConditionValue::Text("supplier".to_string()),
        };

        assert!(condition_matches(&contains, &request));
        assert!(condition_matches(&prefix, &request));
        assert!(!condition_matches(&wrong_prefix, &request));
    }

    #[test]
    fn priority_compares_through_its_text_name() {
        let request = sample_request(None);
        let condition = RuleCondition {
            field: ConditionField::Priority,
            op: ComparisonOp::Eq,
            value: ConditionValue::Text("high".to_string()),
        };
        assert!(condition_matches(&condition, &request));
    }

    #[test]
    fn date_comparisons_follow_the_operator() {
        let request = sample_request(None);
        let before = RuleCondition {
            field: ConditionField::CreatedAt,
            op: ComparisonOp::Lt,
            value: ConditionValue::Date(Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap()),
        };
        let after = RuleCondition {
            field: ConditionField::CreatedAt,
            op: ComparisonOp::Gt,
            value: ConditionValue::Date(Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap()),
        };
        assert!(condition_matches(&before, &request));
        assert!(!condition_matches(&after, &request));
    }

    #[test]
    fn mismatched_stored_type_is_a_non_match() {
        let request = sample_request(Some(Decimal::new(500, 0)));
        let drifted = RuleCondition {
            field: ConditionField::Amount,
            op: ComparisonOp::Eq,
            value: ConditionValue::Text("500".to_string()),
        };
        assert!(!condition_matches(&drifted, &request));
    }

    #[test]
    fn all_conditions_must_hold() {
        let request = sample_request(Some(Decimal::new(500, 0)));
        let both = rule(
            "r-1",
            10,
            vec![
                amount_condition(ComparisonOp::Lt, 1_000),
                RuleCondition {
                    field: ConditionField::Reason,
                    op: ComparisonOp::Contains,
                    value: ConditionValue::Text("audit".to_string()),
                },
            ],
            RuleAction::Approve,
        );
        let one_fails = rule(
            "r-2",
            10,
            vec![
                amount_condition(ComparisonOp::Lt, 1_000),
                RuleCondition {
                    field: ConditionField::Reason,
                    op: ComparisonOp::Contains,
                    value: ConditionValue::Text("conference".to_string()),
                },
            ],
            RuleAction::Approve,
        );

        assert!(rule_matches(&both, &request));
        assert!(!rule_matches(&one_fails, &request));
    }

    #[test]
    fn first_match_respects_position_order() {
        let request = sample_request(Some(Decimal::new(500, 0)));
        let later = rule(
            "r-b",
            20,
            vec![amount_condition(ComparisonOp::Lt, 1_000)],
            RuleAction::Reject,
        );
        let earlier = rule(
            "r-a",
            10,
            vec![amount_condition(ComparisonOp::Lt, 1_000)],
            RuleAction::Approve,
        );

        let rules = [later, earlier];
        let matched = first_match(&rules, &request).unwrap();
        assert_eq!(matched.id.0, "r-a");
        assert_eq!(matched.action, RuleAction::Approve);
    }

    #[test]
    fn inactive_rules_are_skipped() {
        let request = sample_request(Some(Decimal::new(500, 0)));
        let mut winner = rule(
            "r-a",
            10,
            vec![amount_condition(ComparisonOp::Lt, 1_000)],
            RuleAction::Reject,
        );
        winner.active = false;
        let fallback = rule(
            "r-b",
            20,
            vec![amount_condition(ComparisonOp::Lt, 1_000)],
            RuleAction::Escalate,
        );

        let rules = [winner, fallback];
        let matched = first_match(&rules, &request).unwrap();
        assert_eq!(matched.id.0, "r-b");
    }

    #[test]
    fn general_rules_apply_to_any_entity_kind() {
        let request = sample_request(Some(Decimal::new(500, 0)));
        let mut general = rule(
            "r-g",
            5,
            vec![amount_condition(ComparisonOp::Gte, 0)],
            RuleAction::Escalate,
        );
        general.category = RuleCategory::General;
        let mut other_kind = rule(
            "r-o",
            1,
            vec![amount_condition(ComparisonOp::Gte, 0)],
            RuleAction::Reject,
        );
        other_kind.category = RuleCategory::Entity(EntityKind::Debt);

        let rules = [general, other_kind];
        let matched = first_match(&rules, &request).unwrap();
        assert_eq!(matched.id.0, "r-g");
    }

    #[test]
    fn position_ties_break_by_id_for_determinism() {
        let request = sample_request(Some(Decimal::new(500, 0)));
        let second = rule(
            "r-z",
            10,
            vec![amount_condition(ComparisonOp::Lt, 1_000)],
            RuleAction::Reject,
        );
        let first = rule(
            "r-a",
            10,
            vec![amount_condition(ComparisonOp::Lt, 1_000)],
            RuleAction::Approve,
        );

        let rules = [second.clone(), first.clone()];
        let matched = first_match(&rules, &request).unwrap();
        assert_eq!(matched.id.0, "r-a");
        let rules_reversed = [first, second];
        let matched_reversed = first_match(&rules_reversed, &request).unwrap();
        assert_eq!(matched_reversed.id.0, "r-a");
    }

    #[test]
    fn no_applicable_rule_yields_none() {
        let request = sample_request(None);
        let unmatched = rule(
            "r-a",
            10,
            vec![amount_condition(ComparisonOp::Gt, 10)],
            RuleAction::Approve,
        );
        assert!(first_match(&[unmatched], &request).is_none());
        assert!(first_match(&[], &request).is_none());
    }
}
