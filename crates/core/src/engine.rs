use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::request::{
    EntityKind, Priority, RequestId, RequestStatus, ValidationRequest,
};
use crate::domain::rule::{Rule, RuleAction};
use crate::domain::validation::{
    Decision, DecisionEvidence, Validation, ValidationId, ValidatorIdentity,
};
use crate::levels::LevelPolicy;
use crate::rules::first_match;

/// Everything needed to open a validation request.
#[derive(Clone, Debug, PartialEq)]
pub struct NewRequest {
    pub workspace: String,
    pub entity_kind: EntityKind,
    pub entity_id: String,
    pub amount: Option<Decimal>,
    pub reason: String,
    pub requester_id: String,
    pub priority: Priority,
}

/// A human validator's decision on a pending request.
#[derive(Clone, Debug, PartialEq)]
pub struct DecisionInput {
    pub decision: Decision,
    pub validator_id: String,
    pub validator_level: u8,
    pub comment: Option<String>,
    pub evidence: DecisionEvidence,
}

/// Result of a lifecycle step: the request as it should be persisted and
/// the audit record appended by the step, if the step produced one.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub request: ValidationRequest,
    pub appended: Option<Validation>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("request is already finalized as {status:?}")]
    AlreadyFinalized { status: RequestStatus },
    #[error("validator level {actual} is below the level {required} required to act")]
    InsufficientLevel { required: u8, actual: u8 },
}

/// Pure lifecycle engine: creation outcomes, decision processing,
/// escalation and cancellation. Persistence and clocks stay outside; every
/// operation takes `now` and returns the next value of the request.
#[derive(Clone, Debug)]
pub struct ValidationEngine {
    policy: LevelPolicy,
}

impl ValidationEngine {
    pub fn new(policy: LevelPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &LevelPolicy {
        &self.policy
    }

    /// Opens a request: stamps the level requirement, then lets the first
    /// matching rule decide. `approve` and `reject` finalize immediately
    /// with a synthetic audit record; `escalate` and no-match both leave
    /// the request pending at its entry level.
    pub fn create(
        &self,
        id: RequestId,
        input: NewRequest,
        rules: &[Rule],
        now: DateTime<Utc>,
    ) -> Transition {
        let resolution = self.policy.resolve(input.entity_kind, input.amount);
        let mut request = ValidationRequest {
            id,
            workspace: input.workspace,
            entity_kind: input.entity_kind,
            entity_id: input.entity_id,
            amount: input.amount,
            reason: input.reason,
            requester_id: input.requester_id,
            priority: input.priority,
            status: RequestStatus::Pending,
            current_level: resolution.entry_level,
            required_level: resolution.required_level,
            entry_level: resolution.entry_level,
            validations: Vec::new(),
            version: 1,
            cancelled_by: None,
            created_at: now,
            updated_at: now,
        };

        let verdict = first_match(rules, &request).map(|rule| {
            (rule.id.clone(), rule.action, rule.action_reason.clone())
        });

        let appended = match verdict {
            Some((rule_id, RuleAction::Approve, reason)) => {
                request.status = RequestStatus::AutoApproved;
                Some(engine_validation(&request, Decision::Approved, rule_id, reason, now))
            }
            Some((rule_id, RuleAction::Reject, reason)) => {
                request.status = RequestStatus::Rejected;
                Some(engine_validation(&request, Decision::Rejected, rule_id, reason, now))
            }
            // An escalate rule firing at creation does not skip any tier;
            // the request enters the hierarchy exactly as an unmatched one.
            Some((_, RuleAction::Escalate, _)) | None => None,
        };

        if let Some(validation) = &appended {
            request.validations.push(validation.clone());
        }

        Transition { request, appended }
    }

    /// Applies one human decision. The decision is recorded whichever way
    /// it goes; rejection at any tier is final, approval either advances
    /// the chain or closes it.
    pub fn process(
        &self,
        request: &ValidationRequest,
        input: DecisionInput,
        now: DateTime<Utc>,
    ) -> Result<Transition, TransitionError> {
        if request.is_terminal() {
            return Err(TransitionError::AlreadyFinalized { status: request.status });
        }

        let required = request.minimum_validator_level();
        if input.validator_level < required {
            return Err(TransitionError::InsufficientLevel {
                required,
                actual: input.validator_level,
            });
        }

        let tier = request.current_level.max(request.entry_level);
        let mut updated = request.clone();
        let validation = Validation {
            id: ValidationId(Uuid::new_v4().to_string()),
            request_id: request.id.clone(),
            decision: input.decision,
            level: tier,
            validator: ValidatorIdentity::Human { user_id: input.validator_id },
            comment: input.comment,
            evidence: input.evidence,
            seq: request.next_seq(),
            decided_at: now,
        };

        match input.decision {
            Decision::Rejected => {
                updated.status = RequestStatus::Rejected;
            }
            Decision::Approved => {
                if tier >= updated.required_level {
                    updated.status = RequestStatus::Approved;
                } else {
                    updated.current_level = tier + 1;
                    updated.status = RequestStatus::Pending;
                }
            }
        }

        updated.validations.push(validation.clone());
        updated.version += 1;
        updated.updated_at = now;

        Ok(Transition { request: updated, appended: Some(validation) })
    }

    /// Flags a pending request for attention one tier up. Requests already
    /// escalated or finalized are left untouched.
    pub fn escalate(
        &self,
        request: &ValidationRequest,
        now: DateTime<Utc>,
    ) -> Option<ValidationRequest> {
        if request.status != RequestStatus::Pending {
            return None;
        }

        let mut updated = request.clone();
        updated.status = RequestStatus::Escalated;
        updated.version += 1;
        updated.updated_at = now;
        Some(updated)
    }

    /// Withdraws an open request. Cancellation is not a decision, so no
    /// audit record is appended; the canceller is kept on the request.
    pub fn cancel(
        &self,
        request: &ValidationRequest,
        cancelled_by: &str,
        now: DateTime<Utc>,
    ) -> Result<ValidationRequest, TransitionError> {
        if request.is_terminal() {
            return Err(TransitionError::AlreadyFinalized { status: request.status });
        }

        let mut updated = request.clone();
        updated.status = RequestStatus::Cancelled;
        updated.cancelled_by = Some(cancelled_by.to_string());
        updated.version += 1;
        updated.updated_at = now;
        Ok(updated)
    }
}

fn engine_validation(
    request: &ValidationRequest,
    decision: Decision,
    rule_id: crate::domain::rule::RuleId,
    reason: String,
    now: DateTime<Utc>,
) -> Validation {
    Validation {
        id: ValidationId(Uuid::new_v4().to_string()),
        request_id: request.id.clone(),
        decision,
        level: 0,
        validator: ValidatorIdentity::RuleEngine { rule_id },
        comment: Some(reason),
        evidence: DecisionEvidence::default(),
        seq: 1,
        decided_at: now,
    }
}
