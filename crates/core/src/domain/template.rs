use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::rule::{
    ComparisonOp, ConditionField, ConditionValue, FieldType, Rule, RuleAction, RuleCategory,
    RuleCondition, RuleConfigError, RuleId,
};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateId(pub String);

/// A condition slot: the shape of a rule condition without its concrete
/// comparison value. `label` is the prompt shown when collecting the value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateCondition {
    pub field: ConditionField,
    pub op: ComparisonOp,
    pub label: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTemplate {
    pub id: TemplateId,
    pub category: RuleCategory,
    pub name: String,
    pub description: String,
    pub conditions: Vec<TemplateCondition>,
    pub action: RuleAction,
    pub action_reason: String,
    pub estimated_minutes_saved: u32,
    pub usage_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RuleTemplate {
    /// Copies the template's condition shape into a concrete rule, one
    /// supplied raw value per condition slot in order. Values are parsed
    /// according to each field's type; the assembled rule is validated
    /// before it is returned.
    pub fn instantiate(
        &self,
        id: RuleId,
        values: &[String],
        position: u32,
        now: DateTime<Utc>,
    ) -> Result<Rule, RuleConfigError> {
        if values.len() != self.conditions.len() {
            return Err(RuleConfigError::ValueCount {
                expected: self.conditions.len(),
                got: values.len(),
            });
        }

        let mut conditions = Vec::with_capacity(self.conditions.len());
        for (slot, raw) in self.conditions.iter().zip(values) {
            conditions.push(RuleCondition {
                field: slot.field,
                op: slot.op,
                value: parse_condition_value(slot.field, raw)?,
            });
        }

        let rule = Rule {
            id,
            category: self.category,
            name: self.name.clone(),
            conditions,
            action: self.action,
            action_reason: self.action_reason.clone(),
            position,
            active: true,
            created_at: now,
            updated_at: now,
        };
        rule.validate()?;
        Ok(rule)
    }
}

fn parse_condition_value(field: ConditionField, raw: &str) -> Result<ConditionValue, RuleConfigError> {
    let trimmed = raw.trim();
    match field.field_type() {
        FieldType::Number => Decimal::from_str(trimmed).map(ConditionValue::Number).map_err(|_| {
            RuleConfigError::UnparsableValue {
                field: field.as_str(),
                field_type: "number",
                raw: raw.to_string(),
            }
        }),
        FieldType::Date => DateTime::parse_from_rfc3339(trimmed)
            .map(|parsed| ConditionValue::Date(parsed.with_timezone(&Utc)))
            .map_err(|_| RuleConfigError::UnparsableValue {
                field: field.as_str(),
                field_type: "date",
                raw: raw.to_string(),
            }),
        FieldType::Text => Ok(ConditionValue::Text(trimmed.to_string())),
    }
}
