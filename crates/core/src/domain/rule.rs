use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::request::EntityKind;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    General,
    Entity(EntityKind),
}

impl RuleCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Entity(kind) => kind.as_str(),
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        if normalized == "general" {
            return Some(Self::General);
        }
        EntityKind::parse(&normalized).map(Self::Entity)
    }

    /// Whether rules in this category apply to requests of `kind`.
    pub fn applies_to(&self, kind: EntityKind) -> bool {
        match self {
            Self::General => true,
            Self::Entity(own) => *own == kind,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Approve,
    Reject,
    Escalate,
}

impl RuleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Escalate => "escalate",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "approve" => Some(Self::Approve),
            "reject" => Some(Self::Reject),
            "escalate" => Some(Self::Escalate),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Number,
    Text,
    Date,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::Text => "text",
            Self::Date => "date",
        }
    }
}

/// Closed set of request attributes a rule condition may inspect. Each
/// field carries exactly one comparison type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionField {
    Amount,
    Reason,
    RequesterId,
    EntityId,
    Priority,
    CreatedAt,
}

impl ConditionField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Amount => "amount",
            Self::Reason => "reason",
            Self::RequesterId => "requester_id",
            Self::EntityId => "entity_id",
            Self::Priority => "priority",
            Self::CreatedAt => "created_at",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "amount" => Some(Self::Amount),
            "reason" => Some(Self::Reason),
            "requester_id" => Some(Self::RequesterId),
            "entity_id" => Some(Self::EntityId),
            "priority" => Some(Self::Priority),
            "created_at" => Some(Self::CreatedAt),
            _ => None,
        }
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Amount => FieldType::Number,
            Self::Reason | Self::RequesterId | Self::EntityId | Self::Priority => FieldType::Text,
            Self::CreatedAt => FieldType::Date,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOp {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    StartsWith,
}

impl ComparisonOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::NotEq => "not_eq",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Contains => "contains",
            Self::StartsWith => "starts_with",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "eq" => Some(Self::Eq),
            "not_eq" => Some(Self::NotEq),
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            "contains" => Some(Self::Contains),
            "starts_with" => Some(Self::StartsWith),
            _ => None,
        }
    }

    pub fn supports(&self, field_type: FieldType) -> bool {
        match field_type {
            FieldType::Number | FieldType::Date => matches!(
                self,
                Self::Eq | Self::NotEq | Self::Gt | Self::Gte | Self::Lt | Self::Lte
            ),
            FieldType::Text => {
                matches!(self, Self::Eq | Self::NotEq | Self::Contains | Self::StartsWith)
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ConditionValue {
    Number(Decimal),
    Text(String),
    Date(DateTime<Utc>),
}

impl ConditionValue {
    pub fn value_type(&self) -> FieldType {
        match self {
            Self::Number(_) => FieldType::Number,
            Self::Text(_) => FieldType::Text,
            Self::Date(_) => FieldType::Date,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuleCondition {
    pub field: ConditionField,
    pub op: ComparisonOp,
    pub value: ConditionValue,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleConfigError {
    #[error("rule has no conditions; at least one is required")]
    EmptyConditions,
    #[error("condition on {field} expects a {expected} value, got {got}")]
    TypeMismatch {
        field: &'static str,
        expected: &'static str,
        got: &'static str,
    },
    #[error("operator {op} is not supported for {field_type} field {field}")]
    UnsupportedOperator {
        field: &'static str,
        field_type: &'static str,
        op: &'static str,
    },
    #[error("expected {expected} condition values, got {got}")]
    ValueCount { expected: usize, got: usize },
    #[error("value {raw:?} cannot be parsed for {field_type} field {field}")]
    UnparsableValue {
        field: &'static str,
        field_type: &'static str,
        raw: String,
    },
}

impl RuleCondition {
    pub fn validate(&self) -> Result<(), RuleConfigError> {
        let expected = self.field.field_type();
        let got = self.value.value_type();
        if expected != got {
            return Err(RuleConfigError::TypeMismatch {
                field: self.field.as_str(),
                expected: expected.as_str(),
                got: got.as_str(),
            });
        }
        if !self.op.supports(expected) {
            return Err(RuleConfigError::UnsupportedOperator {
                field: self.field.as_str(),
                field_type: expected.as_str(),
                op: self.op.as_str(),
            });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub category: RuleCategory,
    pub name: String,
    pub conditions: Vec<RuleCondition>,
    pub action: RuleAction,
    pub action_reason: String,
    pub position: u32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    /// Save-time configuration check. Rules that fail here never reach the
    /// evaluator, so evaluation can assume well-typed conditions.
    pub fn validate(&self) -> Result<(), RuleConfigError> {
        if self.conditions.is_empty() {
            return Err(RuleConfigError::EmptyConditions);
        }
        for condition in &self.conditions {
            condition.validate()?;
        }
        Ok(())
    }
}
