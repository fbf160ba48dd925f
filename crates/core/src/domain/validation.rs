use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::request::RequestId;
use crate::domain::rule::RuleId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidationId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Who rendered a decision: a person in the hierarchy, or the rule engine
/// acting on a matched rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidatorIdentity {
    Human { user_id: String },
    RuleEngine { rule_id: RuleId },
}

impl ValidatorIdentity {
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::Human { .. } => "human",
            Self::RuleEngine { .. } => "rule_engine",
        }
    }

    pub fn id_str(&self) -> &str {
        match self {
            Self::Human { user_id } => user_id,
            Self::RuleEngine { rule_id } => &rule_id.0,
        }
    }

    pub fn from_parts(kind: &str, id: &str) -> Option<Self> {
        match kind.trim().to_ascii_lowercase().as_str() {
            "human" => Some(Self::Human {
                user_id: id.to_string(),
            }),
            "rule_engine" => Some(Self::RuleEngine {
                rule_id: RuleId(id.to_string()),
            }),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoFix {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_m: Option<f64>,
    pub address: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionEvidence {
    pub geolocation: Option<GeoFix>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub signature_ref: Option<String>,
}

impl DecisionEvidence {
    pub fn is_empty(&self) -> bool {
        self.geolocation.is_none()
            && self.ip_address.is_none()
            && self.user_agent.is_none()
            && self.signature_ref.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Validation {
    pub id: ValidationId,
    pub request_id: RequestId,
    pub decision: Decision,
    pub level: u8,
    pub validator: ValidatorIdentity,
    pub comment: Option<String>,
    pub evidence: DecisionEvidence,
    pub seq: u32,
    pub decided_at: DateTime<Utc>,
}
