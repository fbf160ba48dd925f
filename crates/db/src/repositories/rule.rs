use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use aprova_core::domain::request::EntityKind;
use aprova_core::domain::rule::{Rule, RuleAction, RuleCategory, RuleCondition, RuleId};
use aprova_core::domain::template::{RuleTemplate, TemplateCondition, TemplateId};

use super::{RepositoryError, RuleRepository, TemplateRepository};
use crate::DbPool;

const RULE_COLUMNS: &str =
    "id, category, name, conditions_json, action, action_reason, position, active, created_at, \
     updated_at";

const TEMPLATE_COLUMNS: &str = "id, category, name, description, conditions_json, action, \
     action_reason, estimated_minutes_saved, usage_count, created_at, updated_at";

pub struct SqlRuleRepository {
    pool: DbPool,
}

impl SqlRuleRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RuleRepository for SqlRuleRepository {
    async fn list_active_for(&self, kind: EntityKind) -> Result<Vec<Rule>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {RULE_COLUMNS} FROM decision_rule
             WHERE active = 1 AND category IN (?, 'general')
             ORDER BY position ASC, id ASC",
        ))
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(rule_from_row).collect()
    }

    async fn list(&self, category: Option<RuleCategory>) -> Result<Vec<Rule>, RepositoryError> {
        let rows = if let Some(category) = category {
            sqlx::query(&format!(
                "SELECT {RULE_COLUMNS} FROM decision_rule
                 WHERE category = ?
                 ORDER BY position ASC, id ASC",
            ))
            .bind(category.as_str())
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(&format!(
                "SELECT {RULE_COLUMNS} FROM decision_rule ORDER BY position ASC, id ASC",
            ))
            .fetch_all(&self.pool)
            .await?
        };

        rows.into_iter().map(rule_from_row).collect()
    }

    async fn find_by_id(&self, id: &RuleId) -> Result<Option<Rule>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {RULE_COLUMNS} FROM decision_rule WHERE id = ?",
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(rule_from_row).transpose()
    }

    async fn upsert(&self, rule: &Rule) -> Result<(), RepositoryError> {
        let conditions_json = serde_json::to_string(&rule.conditions)
            .map_err(|error| RepositoryError::Decode(format!("encode conditions: {error}")))?;

        sqlx::query(
            "INSERT INTO decision_rule (id, category, name, conditions_json, action,
                                        action_reason, position, active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 category = excluded.category,
                 name = excluded.name,
                 conditions_json = excluded.conditions_json,
                 action = excluded.action,
                 action_reason = excluded.action_reason,
                 position = excluded.position,
                 active = excluded.active,
                 updated_at = excluded.updated_at",
        )
        .bind(&rule.id.0)
        .bind(rule.category.as_str())
        .bind(&rule.name)
        .bind(conditions_json)
        .bind(rule.action.as_str())
        .bind(&rule.action_reason)
        .bind(i64::from(rule.position))
        .bind(i64::from(rule.active))
        .bind(rule.created_at.to_rfc3339())
        .bind(rule.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_active(&self, id: &RuleId, active: bool) -> Result<bool, RepositoryError> {
        let affected = sqlx::query(
            "UPDATE decision_rule SET active = ?, updated_at = ? WHERE id = ?",
        )
        .bind(i64::from(active))
        .bind(Utc::now().to_rfc3339())
        .bind(&id.0)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(affected > 0)
    }

    async fn max_position(&self, category: RuleCategory) -> Result<Option<u32>, RepositoryError> {
        let row = sqlx::query(
            "SELECT MAX(position) AS max_position FROM decision_rule WHERE category = ?",
        )
        .bind(category.as_str())
        .fetch_one(&self.pool)
        .await?;

        let max: Option<i64> = row.try_get("max_position")?;
        max.map(|value| {
            u32::try_from(value).map_err(|_| {
                RepositoryError::Decode(format!("invalid rule position: {value}"))
            })
        })
        .transpose()
    }
}

pub struct SqlTemplateRepository {
    pool: DbPool,
}

impl SqlTemplateRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TemplateRepository for SqlTemplateRepository {
    async fn list(
        &self,
        category: Option<RuleCategory>,
        search: Option<&str>,
    ) -> Result<Vec<RuleTemplate>, RepositoryError> {
        let rows = if let Some(category) = category {
            sqlx::query(&format!(
                "SELECT {TEMPLATE_COLUMNS} FROM rule_template
                 WHERE category = ?
                 ORDER BY name ASC, id ASC",
            ))
            .bind(category.as_str())
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(&format!(
                "SELECT {TEMPLATE_COLUMNS} FROM rule_template ORDER BY name ASC, id ASC",
            ))
            .fetch_all(&self.pool)
            .await?
        };

        let mut templates =
            rows.into_iter().map(template_from_row).collect::<Result<Vec<_>, _>>()?;

        if let Some(needle) = search {
            let needle = needle.to_lowercase();
            templates.retain(|template| template.name.to_lowercase().contains(&needle));
        }

        Ok(templates)
    }

    async fn find_by_id(&self, id: &TemplateId) -> Result<Option<RuleTemplate>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM rule_template WHERE id = ?",
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(template_from_row).transpose()
    }

    async fn record_use(&self, id: &TemplateId) -> Result<bool, RepositoryError> {
        let affected =
            sqlx::query("UPDATE rule_template SET usage_count = usage_count + 1 WHERE id = ?")
                .bind(&id.0)
                .execute(&self.pool)
                .await?
                .rows_affected();

        Ok(affected > 0)
    }

    async fn insert_if_absent(&self, template: &RuleTemplate) -> Result<bool, RepositoryError> {
        let conditions_json = serde_json::to_string(&template.conditions)
            .map_err(|error| RepositoryError::Decode(format!("encode conditions: {error}")))?;

        let affected = sqlx::query(
            "INSERT INTO rule_template (id, category, name, description, conditions_json,
                                        action, action_reason, estimated_minutes_saved,
                                        usage_count, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(&template.id.0)
        .bind(template.category.as_str())
        .bind(&template.name)
        .bind(&template.description)
        .bind(conditions_json)
        .bind(template.action.as_str())
        .bind(&template.action_reason)
        .bind(i64::from(template.estimated_minutes_saved))
        .bind(template.usage_count as i64)
        .bind(template.created_at.to_rfc3339())
        .bind(template.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(affected > 0)
    }
}

fn rule_from_row(row: SqliteRow) -> Result<Rule, RepositoryError> {
    let category_raw = row.try_get::<String, _>("category")?;
    let category = RuleCategory::parse(&category_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown rule category `{category_raw}`"))
    })?;

    let action_raw = row.try_get::<String, _>("action")?;
    let action = RuleAction::parse(&action_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown rule action `{action_raw}`")))?;

    let conditions_raw = row.try_get::<String, _>("conditions_json")?;
    let conditions: Vec<RuleCondition> = serde_json::from_str(&conditions_raw)
        .map_err(|error| RepositoryError::Decode(format!("decode conditions: {error}")))?;

    Ok(Rule {
        id: RuleId(row.try_get("id")?),
        category,
        name: row.try_get("name")?,
        conditions,
        action,
        action_reason: row.try_get("action_reason")?,
        position: parse_u32("position", row.try_get("position")?)?,
        active: row.try_get::<i64, _>("active")? != 0,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

fn template_from_row(row: SqliteRow) -> Result<RuleTemplate, RepositoryError> {
    let category_raw = row.try_get::<String, _>("category")?;
    let category = RuleCategory::parse(&category_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown template category `{category_raw}`"))
    })?;

    let action_raw = row.try_get::<String, _>("action")?;
    let action = RuleAction::parse(&action_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown template action `{action_raw}`"))
    })?;

    let conditions_raw = row.try_get::<String, _>("conditions_json")?;
    let conditions: Vec<TemplateCondition> = serde_json::from_str(&conditions_raw)
        .map_err(|error| RepositoryError::Decode(format!("decode conditions: {error}")))?;

    let usage_count: i64 = row.try_get("usage_count")?;

    Ok(RuleTemplate {
        id: TemplateId(row.try_get("id")?),
        category,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        conditions,
        action,
        action_reason: row.try_get("action_reason")?,
        estimated_minutes_saved: parse_u32(
            "estimated_minutes_saved",
            row.try_get("estimated_minutes_saved")?,
        )?,
        usage_count: u64::try_from(usage_count).map_err(|_| {
            RepositoryError::Decode(format!("invalid usage_count: {usage_count}"))
        })?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
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
