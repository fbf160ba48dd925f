use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row};

use aprova_core::domain::request::{
    EntityKind, Priority, RequestId, RequestStatus, ValidationRequest,
};
use aprova_core::domain::validation::{
    Decision, DecisionEvidence, Validation, ValidationId, ValidatorIdentity,
};

use super::{RepositoryError, RequestRepository};
use crate::DbPool;

const REQUEST_COLUMNS: &str = "id, workspace, entity_kind, entity_id, amount, reason, \
     requester_id, priority, status, current_level, required_level, entry_level, version, \
     cancelled_by, created_at, updated_at";

const VALIDATION_COLUMNS: &str = "id, request_id, decision, level, validator_kind, validator_id, \
     comment, evidence_json, seq, decided_at";

pub struct SqlRequestRepository {
    pool: DbPool,
}

impl SqlRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_validations(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<Validation>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {VALIDATION_COLUMNS} FROM validation WHERE request_id = ? ORDER BY seq ASC",
        ))
        .bind(&request_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(validation_from_row).collect()
    }

    async fn hydrate(
        &self,
        rows: Vec<SqliteRow>,
    ) -> Result<Vec<ValidationRequest>, RepositoryError> {
        let mut requests = Vec::with_capacity(rows.len());
        for row in rows {
            let mut request = request_from_row(row)?;
            request.validations = self.load_validations(&request.id).await?;
            requests.push(request);
        }
        Ok(requests)
    }
}

#[async_trait::async_trait]
impl RequestRepository for SqlRequestRepository {
    async fn insert(&self, request: &ValidationRequest) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            "INSERT INTO validation_request ({REQUEST_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        ))
        .bind(&request.id.0)
        .bind(&request.workspace)
        .bind(request.entity_kind.as_str())
        .bind(&request.entity_id)
        .bind(request.amount.map(|amount| amount.to_string()))
        .bind(&request.reason)
        .bind(&request.requester_id)
        .bind(request.priority.as_str())
        .bind(request.status.as_str())
        .bind(i64::from(request.current_level))
        .bind(i64::from(request.required_level))
        .bind(i64::from(request.entry_level))
        .bind(i64::from(request.version))
        .bind(request.cancelled_by.as_deref())
        .bind(request.created_at.to_rfc3339())
        .bind(request.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for validation in &request.validations {
            insert_validation(&mut tx, validation).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &RequestId,
    ) -> Result<Option<ValidationRequest>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM validation_request WHERE id = ?",
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut request = request_from_row(row)?;
        request.validations = self.load_validations(&request.id).await?;
        Ok(Some(request))
    }

    async fn update_guarded(
        &self,
        request: &ValidationRequest,
        appended: Option<&Validation>,
        expected_version: u32,
    ) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let affected = sqlx::query(
            "UPDATE validation_request SET
                status = ?,
                current_level = ?,
                version = ?,
                cancelled_by = ?,
                updated_at = ?
             WHERE id = ? AND version = ?",
        )
        .bind(request.status.as_str())
        .bind(i64::from(request.current_level))
        .bind(i64::from(request.version))
        .bind(request.cancelled_by.as_deref())
        .bind(request.updated_at.to_rfc3339())
        .bind(&request.id.0)
        .bind(i64::from(expected_version))
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if affected == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        if let Some(validation) = appended {
            insert_validation(&mut tx, validation).await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn list_by_status(
        &self,
        statuses: &[RequestStatus],
    ) -> Result<Vec<ValidationRequest>, RepositoryError> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; statuses.len()].join(", ");
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM validation_request
             WHERE status IN ({placeholders})
             ORDER BY created_at ASC, id ASC",
        );

        let mut query = sqlx::query(&sql);
        for status in statuses {
            query = query.bind(status.as_str());
        }

        let rows = query.fetch_all(&self.pool).await?;
        self.hydrate(rows).await
    }

    async fn find_by_entity(
        &self,
        kind: EntityKind,
        entity_id: &str,
    ) -> Result<Vec<ValidationRequest>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM validation_request
             WHERE entity_kind = ? AND entity_id = ?
             ORDER BY created_at ASC, id ASC",
        ))
        .bind(kind.as_str())
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows).await
    }
}

async fn insert_validation(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    validation: &Validation,
) -> Result<(), RepositoryError> {
    let evidence_json = serde_json::to_string(&validation.evidence)
        .map_err(|error| RepositoryError::Decode(format!("encode evidence: {error}")))?;

    sqlx::query(&format!(
        "INSERT INTO validation ({VALIDATION_COLUMNS})
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    ))
    .bind(&validation.id.0)
    .bind(&validation.request_id.0)
    .bind(validation.decision.as_str())
    .bind(i64::from(validation.level))
    .bind(validation.validator.kind_str())
    .bind(validation.validator.id_str())
    .bind(validation.comment.as_deref())
    .bind(evidence_json)
    .bind(i64::from(validation.seq))
    .bind(validation.decided_at.to_rfc3339())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

fn request_from_row(row: SqliteRow) -> Result<ValidationRequest, RepositoryError> {
    let kind_raw = row.try_get::<String, _>("entity_kind")?;
    let entity_kind = EntityKind::parse(&kind_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown entity kind `{kind_raw}`")))?;

    let priority_raw = row.try_get::<String, _>("priority")?;
    let priority = Priority::parse(&priority_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown priority `{priority_raw}`")))?;

    let status_raw = row.try_get::<String, _>("status")?;
    let status = RequestStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown request status `{status_raw}`")))?;

    Ok(ValidationRequest {
        id: RequestId(row.try_get("id")?),
        workspace: row.try_get("workspace")?,
        entity_kind,
        entity_id: row.try_get("entity_id")?,
        amount: parse_optional_decimal("amount", row.try_get("amount")?)?,
        reason: row.try_get("reason")?,
        requester_id: row.try_get("requester_id")?,
        priority,
        status,
        current_level: parse_u8("current_level", row.try_get("current_level")?)?,
        required_level: parse_u8("required_level", row.try_get("required_level")?)?,
        entry_level: parse_u8("entry_level", row.try_get("entry_level")?)?,
        validations: Vec::new(),
        version: parse_u32("version", row.try_get("version")?)?,
        cancelled_by: row.try_get("cancelled_by")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

fn validation_from_row(row: SqliteRow) -> Result<Validation, RepositoryError> {
    let decision_raw = row.try_get::<String, _>("decision")?;
    let decision = Decision::parse(&decision_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown decision `{decision_raw}`")))?;

    let validator_kind = row.try_get::<String, _>("validator_kind")?;
    let validator_id = row.try_get::<String, _>("validator_id")?;
    let validator =
        ValidatorIdentity::from_parts(&validator_kind, &validator_id).ok_or_else(|| {
            RepositoryError::Decode(format!("unknown validator kind `{validator_kind}`"))
        })?;

    let evidence_raw = row.try_get::<String, _>("evidence_json")?;
    let evidence: DecisionEvidence = serde_json::from_str(&evidence_raw)
        .map_err(|error| RepositoryError::Decode(format!("decode evidence: {error}")))?;

    Ok(Validation {
        id: ValidationId(row.try_get("id")?),
        request_id: RequestId(row.try_get("request_id")?),
        decision,
        level: parse_u8("level", row.try_get("level")?)?,
        validator,
        comment: row.try_get("comment")?,
        evidence,
        seq: parse_u32("seq", row.try_get("seq")?)?,
        decided_at: parse_timestamp("decided_at", row.try_get("decided_at")?)?,
    })
}

fn parse_u8(column: &str, value: i64) -> Result<u8, RepositoryError> {
    u8::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!(
            "invalid value for `{column}` (expected non-negative u8): {value}"
        ))
    })
}

fn parse_u32(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!(
            "invalid value for `{column}` (expected non-negative u32): {value}"
        ))
    })
}

fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

fn parse_optional_decimal(
    column: &str,
    value: Option<String>,
) -> Result<Option<Decimal>, RepositoryError> {
    value
        .map(|raw| {
            Decimal::from_str(&raw).map_err(|error| {
                RepositoryError::Decode(format!(
                    "invalid decimal in `{column}`: `{raw}` ({error})"
                ))
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use rust_decimal::Decimal;

    use aprova_core::domain::request::{
        EntityKind, Priority, RequestId, RequestStatus, ValidationRequest,
    };
    use aprova_core::domain::rule::RuleId;
    use aprova_core::domain::validation::{
        Decision, DecisionEvidence, GeoFix, Validation, ValidationId, ValidatorIdentity,
    };

    use super::SqlRequestRepository;
    use crate::migrations;
    use crate::repositories::RequestRepository;
    use crate::{connect, DbPool};
    use aprova_core::config::DatabaseConfig;

    async fn setup_pool() -> DbPool {
        let config =
            DatabaseConfig { max_connections: 1, ..DatabaseConfig::for_url("sqlite::memory:") };
        let pool = connect(&config).await.expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    fn parse_ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value).expect("valid rfc3339").with_timezone(&Utc)
    }

    fn sample_request(id: &str) -> ValidationRequest {
        ValidationRequest {
            id: RequestId(id.to_string()),
            workspace: "acme".to_string(),
            entity_kind: EntityKind::Expense,
            entity_id: "exp-42".to_string(),
            amount: Some(Decimal::new(3_000_000, 2)),
            reason: "supplier audit travel".to_string(),
            requester_id: "u-7".to_string(),
            priority: Priority::High,
            status: RequestStatus::Pending,
            current_level: 1,
            required_level: 2,
            entry_level: 1,
            validations: Vec::new(),
            version: 1,
            cancelled_by: None,
            created_at: parse_ts("2026-03-10T09:00:00Z"),
            updated_at: parse_ts("2026-03-10T09:00:00Z"),
        }
    }

    fn human_validation(request_id: &str, seq: u32, decision: Decision) -> Validation {
        Validation {
            id: ValidationId(format!("{request_id}-v{seq}")),
            request_id: RequestId(request_id.to_string()),
            decision,
            level: seq as u8,
            validator: ValidatorIdentity::Human { user_id: format!("mgr-{seq}") },
            comment: Some("looks fine".to_string()),
            evidence: DecisionEvidence {
                geolocation: Some(GeoFix {
                    latitude: -23.55,
                    longitude: -46.63,
                    accuracy_m: Some(8.5),
                    address: Some("factory gate".to_string()),
                }),
                ip_address: Some("10.1.2.3".to_string()),
                user_agent: Some("aprova-mobile/2.1".to_string()),
                signature_ref: None,
            },
            seq,
            decided_at: parse_ts("2026-03-10T10:00:00Z"),
        }
    }

    #[tokio::test]
    async fn insert_and_find_round_trips_with_evidence() {
        let pool = setup_pool().await;
        let repo = SqlRequestRepository::new(pool.clone());

        let mut request = sample_request("vr-1");
        request.status = RequestStatus::AutoApproved;
        request.validations.push(Validation {
            id: ValidationId("vr-1-v1".to_string()),
            request_id: request.id.clone(),
            decision: Decision::Approved,
            level: 0,
            validator: ValidatorIdentity::RuleEngine { rule_id: RuleId("r-1".to_string()) },
            comment: Some("below the fast-track ceiling".to_string()),
            evidence: DecisionEvidence::default(),
            seq: 1,
            decided_at: parse_ts("2026-03-10T09:00:00Z"),
        });

        repo.insert(&request).await.expect("insert");

        let found = repo.find_by_id(&request.id).await.expect("find");
        assert_eq!(found, Some(request));

        pool.close().await;
    }

    #[tokio::test]
    async fn update_guarded_applies_exactly_once_per_version() {
        let pool = setup_pool().await;
        let repo = SqlRequestRepository::new(pool.clone());

        let request = sample_request("vr-2");
        repo.insert(&request).await.expect("insert");

        let mut advanced = request.clone();
        advanced.current_level = 2;
        advanced.version = 2;
        advanced.updated_at = parse_ts("2026-03-10T10:00:00Z");
        let appended = human_validation("vr-2", 1, Decision::Approved);

        let won = repo
            .update_guarded(&advanced, Some(&appended), request.version)
            .await
            .expect("first guarded update");
        assert!(won, "first writer should win");

        // Same expected version again: the guard must refuse and write nothing.
        let mut competing = request.clone();
        competing.status = RequestStatus::Rejected;
        competing.version = 2;
        let lost = repo
            .update_guarded(
                &competing,
                Some(&human_validation("vr-2", 1, Decision::Rejected)),
                request.version,
            )
            .await
            .expect("second guarded update");
        assert!(!lost, "second writer must lose the race");

        let stored = repo.find_by_id(&request.id).await.expect("find").expect("exists");
        assert_eq!(stored.status, RequestStatus::Pending);
        assert_eq!(stored.current_level, 2);
        assert_eq!(stored.version, 2);
        assert_eq!(stored.validations.len(), 1);
        assert_eq!(stored.validations[0].decision, Decision::Approved);

        pool.close().await;
    }

    #[tokio::test]
    async fn validations_come_back_in_seq_order() {
        let pool = setup_pool().await;
        let repo = SqlRequestRepository::new(pool.clone());

        let request = sample_request("vr-3");
        repo.insert(&request).await.expect("insert");

        let mut step_one = request.clone();
        step_one.current_level = 2;
        step_one.version = 2;
        repo.update_guarded(&step_one, Some(&human_validation("vr-3", 1, Decision::Approved)), 1)
            .await
            .expect("advance to level 2");

        let mut step_two = step_one.clone();
        step_two.status = RequestStatus::Approved;
        step_two.version = 3;
        repo.update_guarded(&step_two, Some(&human_validation("vr-3", 2, Decision::Approved)), 2)
            .await
            .expect("close the request");

        let stored = repo.find_by_id(&request.id).await.expect("find").expect("exists");
        let seqs: Vec<u32> = stored.validations.iter().map(|validation| validation.seq).collect();
        assert_eq!(seqs, vec![1, 2]);

        pool.close().await;
    }

    #[tokio::test]
    async fn list_by_status_and_find_by_entity_filter_correctly() {
        let pool = setup_pool().await;
        let repo = SqlRequestRepository::new(pool.clone());

        let open = sample_request("vr-open");
        repo.insert(&open).await.expect("insert open");

        let mut escalated = sample_request("vr-esc");
        escalated.status = RequestStatus::Escalated;
        escalated.entity_id = "exp-43".to_string();
        repo.insert(&escalated).await.expect("insert escalated");

        let mut closed = sample_request("vr-done");
        closed.status = RequestStatus::Approved;
        closed.entity_id = "exp-42".to_string();
        closed.created_at = parse_ts("2026-03-11T09:00:00Z");
        closed.updated_at = parse_ts("2026-03-11T09:00:00Z");
        repo.insert(&closed).await.expect("insert closed");

        let open_requests = repo
            .list_by_status(&[RequestStatus::Pending, RequestStatus::Escalated])
            .await
            .expect("list open");
        let ids: Vec<&str> =
            open_requests.iter().map(|request| request.id.0.as_str()).collect();
        assert_eq!(ids, vec!["vr-esc", "vr-open"]);

        let history = repo
            .find_by_entity(EntityKind::Expense, "exp-42")
            .await
            .expect("find by entity");
        let ids: Vec<&str> = history.iter().map(|request| request.id.0.as_str()).collect();
        assert_eq!(ids, vec!["vr-open", "vr-done"]);

        pool.close().await;
    }
}
