use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::validation::Validation;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Expense,
    PurchaseOrder,
    ProductionOrder,
    Advance,
    Debt,
    Leave,
    Transfer,
    PriceAdjustment,
    CreditApproval,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expense => "expense",
            Self::PurchaseOrder => "purchase_order",
            Self::ProductionOrder => "production_order",
            Self::Advance => "advance",
            Self::Debt => "debt",
            Self::Leave => "leave",
            Self::Transfer => "transfer",
            Self::PriceAdjustment => "price_adjustment",
            Self::CreditApproval => "credit_approval",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "expense" => Some(Self::Expense),
            "purchase_order" => Some(Self::PurchaseOrder),
            "production_order" => Some(Self::ProductionOrder),
            "advance" => Some(Self::Advance),
            "debt" => Some(Self::Debt),
            "leave" => Some(Self::Leave),
            "transfer" => Some(Self::Transfer),
            "price_adjustment" => Some(Self::PriceAdjustment),
            "credit_approval" => Some(Self::CreditApproval),
            _ => None,
        }
    }

    pub fn all() -> [Self; 9] {
        [
            Self::Expense,
            Self::PurchaseOrder,
            Self::ProductionOrder,
            Self::Advance,
            Self::Debt,
            Self::Leave,
            Self::Transfer,
            Self::PriceAdjustment,
            Self::CreditApproval,
        ]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }

    pub fn rank(&self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
            Self::Urgent => 3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Escalated,
    AutoApproved,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Escalated => "escalated",
            Self::AutoApproved => "auto_approved",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "escalated" => Some(Self::Escalated),
            "auto_approved" => Some(Self::AutoApproved),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Approved | Self::Rejected | Self::AutoApproved | Self::Cancelled
        )
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Escalated)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationRequest {
    pub id: RequestId,
    pub workspace: String,
    pub entity_kind: EntityKind,
    pub entity_id: String,
    pub amount: Option<Decimal>,
    pub reason: String,
    pub requester_id: String,
    pub priority: Priority,
    pub status: RequestStatus,
    pub current_level: u8,
    pub required_level: u8,
    pub entry_level: u8,
    pub validations: Vec<Validation>,
    pub version: u32,
    pub cancelled_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ValidationRequest {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Lowest validator level that may decide on this request right now.
    ///
    /// While escalated the bar moves one tier above whatever the request
    /// would otherwise accept.
    pub fn minimum_validator_level(&self) -> u8 {
        let tier = self.current_level.max(self.entry_level);
        if self.status == RequestStatus::Escalated {
            tier.saturating_add(1)
        } else {
            tier
        }
    }

    pub fn next_seq(&self) -> u32 {
        self.validations
            .iter()
            .map(|validation| validation.seq)
            .max()
            .unwrap_or(0)
            + 1
    }
}

#[cfg(test)]
mod tests {
    use super::{EntityKind, Priority, RequestStatus};

    #[test]
    fn entity_kind_round_trips_from_storage_encoding() {
        for kind in EntityKind::all() {
            let decoded = EntityKind::parse(kind.as_str());
            assert_eq!(decoded, Some(kind));
        }
    }

    #[test]
    fn request_status_round_trips_from_storage_encoding() {
        let cases = [
            RequestStatus::Pending,
            RequestStatus::Approved,
            RequestStatus::Rejected,
            RequestStatus::Escalated,
            RequestStatus::AutoApproved,
            RequestStatus::Cancelled,
        ];

        for status in cases {
            let decoded = RequestStatus::parse(status.as_str());
            assert_eq!(decoded, Some(status));
        }
    }

    #[test]
    fn terminal_statuses_are_exactly_the_closed_ones() {
        assert!(RequestStatus::Approved.is_terminal());
        assert!(RequestStatus::Rejected.is_terminal());
        assert!(RequestStatus::AutoApproved.is_terminal());
        assert!(RequestStatus::Cancelled.is_terminal());
        assert!(!RequestStatus::Pending.is_terminal());
        assert!(!RequestStatus::Escalated.is_terminal());
    }

    #[test]
    fn priority_ordering_follows_urgency() {
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::Medium < Priority::High);
        assert!(Priority::High < Priority::Urgent);
        assert_eq!(Priority::Urgent.rank(), 3);
    }
}
