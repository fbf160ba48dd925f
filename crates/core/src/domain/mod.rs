pub mod request;
pub mod rule;
pub mod template;
pub mod validation;

pub use request::{EntityKind, Priority, RequestId, RequestStatus, ValidationRequest};
pub use rule::{
    ComparisonOp, ConditionField, ConditionValue, FieldType, Rule, RuleAction, RuleCategory,
    RuleCondition, RuleConfigError, RuleId,
};
pub use template::{RuleTemplate, TemplateCondition, TemplateId};
pub use validation::{
    Decision, DecisionEvidence, GeoFix, Validation, ValidationId, ValidatorIdentity,
};
