pub mod config;
pub mod domain;
pub mod engine;
pub mod levels;
pub mod rules;

pub use config::{
    AppConfig, ConfigError, ConfigOverrides, DatabaseConfig, EscalationConfig, LevelsConfig,
    LoadOptions, LogFormat, LoggingConfig,
};
pub use domain::request::{EntityKind, Priority, RequestId, RequestStatus, ValidationRequest};
pub use domain::rule::{
    ComparisonOp, ConditionField, ConditionValue, FieldType, Rule, RuleAction, RuleCategory,
    RuleCondition, RuleConfigError, RuleId,
};
pub use domain::template::{RuleTemplate, TemplateCondition, TemplateId};
pub use domain::validation::{
    Decision, DecisionEvidence, GeoFix, Validation, ValidationId, ValidatorIdentity,
};
pub use engine::{DecisionInput, NewRequest, Transition, TransitionError, ValidationEngine};
pub use levels::{FixedLevels, LevelPolicy, LevelResolution, LevelTier};
pub use rules::{condition_matches, field_value, first_match, rule_matches, FieldValue};
