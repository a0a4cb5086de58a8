use crate::error::CoreError;
use crate::models::{Frequency, MonthDaySet, NewRuleData, RecurrenceRule, Task, UpdateRuleData, WeekdaySet};
use crate::recurrence::validate_rule;
use crate::repository::{hex_prefix_pattern, SqliteRepository};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Sqlite, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

#[async_trait]
impl super::RuleRepository for SqliteRepository {
    async fn create_rule(&self, data: NewRuleData) -> Result<RecurrenceRule, CoreError> {
        let mut tx = self.pool().begin().await?;

        let template = Self::fetch_template_in_transaction(&mut tx, data.template_task_id).await?;
        Self::ensure_template_unclaimed(&mut tx, data.template_task_id, None).await?;

        let anchor = data
            .start_date
            .or(template.due_date)
            .unwrap_or_else(|| Utc::now().date_naive());

        validate_rule(
            data.frequency,
            data.interval,
            &data.days_of_week,
            &data.days_of_month,
            anchor,
            data.end_date,
        )?;

        let mut rule = RecurrenceRule::new(data.frequency, data.interval, anchor);
        rule.days_of_week = data.days_of_week;
        rule.days_of_month = data.days_of_month;
        rule.end_date = data.end_date;
        rule.skip_weekends = data.skip_weekends;
        rule.template_task_id = template.id;
        rule.owner_id = data.owner_id.unwrap_or(template.owner_id);

        sqlx::query(
            r#"INSERT INTO recurrence_rules (id, frequency, interval, days_of_week, days_of_month, end_date, anchor_date, last_generated, last_due, skip_weekends, dormant, template_task_id, owner_id, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)"#,
        )
        .bind(rule.id)
        .bind(rule.frequency)
        .bind(rule.interval)
        .bind(rule.days_of_week)
        .bind(rule.days_of_month)
        .bind(rule.end_date)
        .bind(rule.anchor_date)
        .bind(rule.last_generated)
        .bind(rule.last_due)
        .bind(rule.skip_weekends)
        .bind(rule.dormant)
        .bind(rule.template_task_id)
        .bind(rule.owner_id)
        .bind(rule.version)
        .bind(rule.created_at)
        .bind(rule.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(rule_id = %rule.id, template_id = %rule.template_task_id, "created recurrence rule");
        Ok(rule)
    }

    async fn find_rule_by_id(&self, id: Uuid) -> Result<Option<RecurrenceRule>, CoreError> {
        let rule = sqlx::query_as("SELECT * FROM recurrence_rules WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(rule)
    }

    async fn find_rules_by_short_id_prefix(&self, short_id: &str) -> Result<Vec<RecurrenceRule>, CoreError> {
        let rules = sqlx::query_as("SELECT * FROM recurrence_rules WHERE lower(hex(id)) LIKE $1")
            .bind(hex_prefix_pattern(short_id))
            .fetch_all(self.pool())
            .await?;
        Ok(rules)
    }

    async fn find_rules(&self) -> Result<Vec<RecurrenceRule>, CoreError> {
        let rules = sqlx::query_as("SELECT * FROM recurrence_rules ORDER BY created_at")
            .fetch_all(self.pool())
            .await?;
        Ok(rules)
    }

    async fn find_rules_by_owner(&self, owner_id: Uuid) -> Result<Vec<RecurrenceRule>, CoreError> {
        let rules = sqlx::query_as("SELECT * FROM recurrence_rules WHERE owner_id = $1 ORDER BY created_at")
            .bind(owner_id)
            .fetch_all(self.pool())
            .await?;
        Ok(rules)
    }

    async fn find_rules_by_template(&self, template_id: Uuid) -> Result<Vec<RecurrenceRule>, CoreError> {
        let rules = sqlx::query_as("SELECT * FROM recurrence_rules WHERE template_task_id = $1")
            .bind(template_id)
            .fetch_all(self.pool())
            .await?;
        Ok(rules)
    }

    async fn update_rule(&self, id: Uuid, data: UpdateRuleData) -> Result<RecurrenceRule, CoreError> {
        if data.is_empty() {
            return Err(CoreError::InvalidInput("No fields to update".to_string()));
        }

        let mut tx = self.pool().begin().await?;

        let current: RecurrenceRule = sqlx::query_as("SELECT * FROM recurrence_rules WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Recurrence rule with id {} not found", id)))?;

        if let Some(template_id) = data.template_task_id {
            if template_id != current.template_task_id {
                Self::fetch_template_in_transaction(&mut tx, template_id).await?;
                Self::ensure_template_unclaimed(&mut tx, template_id, Some(id)).await?;
            }
        }

        let updated = apply_update(&current, data);
        validate_rule(
            updated.frequency,
            updated.interval,
            &updated.days_of_week,
            &updated.days_of_month,
            updated.anchor_date,
            updated.end_date,
        )?;

        // The cursor is deliberately absent: edits reshape future occurrences only.
        let result = sqlx::query(
            r#"UPDATE recurrence_rules
            SET frequency = $1, interval = $2, days_of_week = $3, days_of_month = $4, end_date = $5,
                skip_weekends = $6, dormant = $7, template_task_id = $8, version = version + 1, updated_at = $9
            WHERE id = $10 AND version = $11"#,
        )
        .bind(updated.frequency)
        .bind(updated.interval)
        .bind(updated.days_of_week)
        .bind(updated.days_of_month)
        .bind(updated.end_date)
        .bind(updated.skip_weekends)
        .bind(updated.dormant)
        .bind(updated.template_task_id)
        .bind(updated.updated_at)
        .bind(id)
        .bind(current.version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::PersistenceConflict(id));
        }

        tx.commit().await?;
        debug!(rule_id = %id, version = updated.version, "updated recurrence rule");
        Ok(updated)
    }

    async fn delete_rule(&self, id: Uuid) -> Result<(), CoreError> {
        // Generated tasks keep their source_rule_id as plain provenance.
        let result = sqlx::query("DELETE FROM recurrence_rules WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(id.to_string()));
        }
        info!(rule_id = %id, "deleted recurrence rule");
        Ok(())
    }
}

impl SqliteRepository {
    async fn fetch_template_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        template_id: Uuid,
    ) -> Result<Task, CoreError> {
        sqlx::query_as("SELECT * FROM tasks WHERE id = $1")
            .bind(template_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Template task {} not found", template_id)))
    }

    /// A template drives at most one rule; `except` skips the rule being edited.
    async fn ensure_template_unclaimed(
        tx: &mut Transaction<'_, Sqlite>,
        template_id: Uuid,
        except: Option<Uuid>,
    ) -> Result<(), CoreError> {
        let existing: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM recurrence_rules WHERE template_task_id = $1 AND ($2 IS NULL OR id != $2)",
        )
        .bind(template_id)
        .bind(except)
        .fetch_optional(&mut **tx)
        .await?;

        if existing.is_some() {
            return Err(CoreError::InvalidInput(
                "A recurrence rule already exists for this template task".to_string(),
            ));
        }
        Ok(())
    }
}

/// Merges an edit into a rule. A frequency change drops day sets that no
/// longer apply unless the edit supplies them; touching the end date wakes a
/// dormant rule so the next run re-evaluates it.
fn apply_update(current: &RecurrenceRule, data: UpdateRuleData) -> RecurrenceRule {
    let mut rule = current.clone();

    if let Some(frequency) = data.frequency {
        if frequency != rule.frequency {
            if frequency != Frequency::Weekly && data.days_of_week.is_none() {
                rule.days_of_week = WeekdaySet::new();
            }
            if frequency != Frequency::Monthly && data.days_of_month.is_none() {
                rule.days_of_month = MonthDaySet::new();
            }
        }
        rule.frequency = frequency;
    }
    if let Some(interval) = data.interval {
        rule.interval = interval;
    }
    if let Some(days) = data.days_of_week {
        rule.days_of_week = days;
    }
    if let Some(days) = data.days_of_month {
        rule.days_of_month = days;
    }
    if let Some(end_date) = data.end_date {
        rule.end_date = end_date;
        rule.dormant = false;
    }
    if let Some(skip) = data.skip_weekends {
        rule.skip_weekends = skip;
    }
    if let Some(template_id) = data.template_task_id {
        rule.template_task_id = template_id;
    }

    rule.version = current.version + 1;
    rule.updated_at = Utc::now();
    rule
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn weekly_rule() -> RecurrenceRule {
        let mut rule = RecurrenceRule::new(
            Frequency::Weekly,
            1,
            NaiveDate::from_ymd_opt(2026, 2, 20).unwrap(),
        );
        rule.days_of_week = WeekdaySet::from_ordinals([1, 3, 5]).unwrap();
        rule.last_generated = NaiveDate::from_ymd_opt(2026, 3, 4).unwrap();
        rule
    }

    #[test]
    fn frequency_change_clears_stale_day_set() {
        let rule = weekly_rule();
        let updated = apply_update(
            &rule,
            UpdateRuleData {
                frequency: Some(Frequency::Monthly),
                ..Default::default()
            },
        );
        assert!(updated.days_of_week.is_empty());
        assert_eq!(updated.frequency, Frequency::Monthly);
        assert_eq!(updated.last_generated, rule.last_generated);
        assert_eq!(updated.version, rule.version + 1);
    }

    #[test]
    fn end_date_edit_wakes_dormant_rule() {
        let mut rule = weekly_rule();
        rule.dormant = true;
        rule.end_date = NaiveDate::from_ymd_opt(2026, 3, 1);

        let untouched = apply_update(
            &rule,
            UpdateRuleData {
                interval: Some(2),
                ..Default::default()
            },
        );
        assert!(untouched.dormant);

        let reopened = apply_update(
            &rule,
            UpdateRuleData {
                end_date: Some(None),
                ..Default::default()
            },
        );
        assert!(!reopened.dormant);
        assert_eq!(reopened.end_date, None);
    }
}
