use crate::error::CoreError;
use crate::models::{
    Frequency, FrequencyCount, RecurrenceRule, RuleHealth, RuleStatistics, UpcomingOccurrence,
};
use crate::recurrence::upcoming;
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{FromRow, Row};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(FromRow)]
struct OccurrenceTotals {
    total: i64,
    completed: Option<i64>,
    open: Option<i64>,
    cancelled: Option<i64>,
    first_due: Option<NaiveDate>,
    last_due: Option<NaiveDate>,
}

#[async_trait]
impl super::StatisticsRepository for SqliteRepository {
    async fn count_rules_by_frequency(&self, owner_id: Option<Uuid>) -> Result<Vec<FrequencyCount>, CoreError> {
        let rows: Vec<(Frequency, i64, i64)> = sqlx::query_as(
            r#"SELECT frequency,
                SUM(CASE WHEN dormant THEN 0 ELSE 1 END) AS active,
                SUM(CASE WHEN dormant THEN 1 ELSE 0 END) AS dormant
            FROM recurrence_rules
            WHERE $1 IS NULL OR owner_id = $1
            GROUP BY frequency"#,
        )
        .bind(owner_id)
        .fetch_all(self.pool())
        .await?;

        let by_frequency: HashMap<Frequency, (i64, i64)> = rows
            .into_iter()
            .map(|(frequency, active, dormant)| (frequency, (active, dormant)))
            .collect();

        // Every frequency is reported, zero-filled, in a stable order.
        Ok(Frequency::ALL
            .iter()
            .map(|frequency| {
                let (active, dormant) = by_frequency.get(frequency).copied().unwrap_or((0, 0));
                FrequencyCount {
                    frequency: *frequency,
                    active: active as u32,
                    dormant: dormant as u32,
                }
            })
            .collect())
    }

    async fn rule_health(&self, rule_id: Uuid) -> Result<RuleHealth, CoreError> {
        let rule = self.require_rule(rule_id).await?;
        self.health_of(&rule).await
    }

    async fn get_rule_statistics(&self, rule_id: Uuid) -> Result<RuleStatistics, CoreError> {
        let rule = self.require_rule(rule_id).await?;
        let health = self.health_of(&rule).await?;

        let totals: OccurrenceTotals = sqlx::query_as(
            r#"SELECT COUNT(*) AS total,
                SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END) AS completed,
                SUM(CASE WHEN status IN ('pending', 'in_progress') THEN 1 ELSE 0 END) AS open,
                SUM(CASE WHEN status = 'cancelled' THEN 1 ELSE 0 END) AS cancelled,
                MIN(due_date) AS first_due,
                MAX(due_date) AS last_due
            FROM tasks
            WHERE source_rule_id = $1"#,
        )
        .bind(rule_id)
        .fetch_one(self.pool())
        .await?;

        Ok(RuleStatistics {
            rule_id,
            health,
            total_generated: totals.total as u32,
            completed: totals.completed.unwrap_or(0) as u32,
            open: totals.open.unwrap_or(0) as u32,
            cancelled: totals.cancelled.unwrap_or(0) as u32,
            first_due: totals.first_due,
            last_due: totals.last_due,
            next_occurrence: upcoming(&rule).next(),
        })
    }

    async fn upcoming_occurrences(
        &self,
        owner_id: Option<Uuid>,
        until: NaiveDate,
        per_rule_limit: usize,
    ) -> Result<Vec<UpcomingOccurrence>, CoreError> {
        let rows = sqlx::query(
            r#"SELECT r.*, t.title AS template_title
            FROM recurrence_rules r
            LEFT JOIN tasks t ON t.id = r.template_task_id
            WHERE r.dormant = FALSE AND ($1 IS NULL OR r.owner_id = $1)
            ORDER BY r.created_at"#,
        )
        .bind(owner_id)
        .fetch_all(self.pool())
        .await?;

        let mut agenda = Vec::new();
        for row in rows {
            let rule = RecurrenceRule::from_row(&row)?;
            let template_title: Option<String> = row.try_get("template_title")?;
            agenda.extend(
                upcoming(&rule)
                    .take_while(|occurrence| occurrence.due <= until)
                    .take(per_rule_limit)
                    .map(|occurrence| UpcomingOccurrence {
                        rule_id: rule.id,
                        template_title: template_title.clone(),
                        occurrence,
                    }),
            );
        }

        agenda.sort_by(|a, b| {
            a.occurrence
                .due
                .cmp(&b.occurrence.due)
                .then_with(|| a.rule_id.cmp(&b.rule_id))
        });
        Ok(agenda)
    }
}

impl SqliteRepository {
    async fn require_rule(&self, rule_id: Uuid) -> Result<RecurrenceRule, CoreError> {
        sqlx::query_as("SELECT * FROM recurrence_rules WHERE id = $1")
            .bind(rule_id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Recurrence rule with id {} not found", rule_id)))
    }

    /// An ended rule reports `Ended` even if its template is gone as well.
    async fn health_of(&self, rule: &RecurrenceRule) -> Result<RuleHealth, CoreError> {
        if rule.dormant {
            return Ok(RuleHealth::Ended);
        }
        let template: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM tasks WHERE id = $1")
            .bind(rule.template_task_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(if template.is_some() {
            RuleHealth::Active
        } else {
            RuleHealth::Broken
        })
    }
}
