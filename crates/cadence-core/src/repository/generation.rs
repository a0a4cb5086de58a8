use crate::error::CoreError;
use crate::models::{RecurrenceRule, Task};
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use uuid::Uuid;

#[async_trait]
impl super::GenerationRepository for SqliteRepository {
    async fn find_active_rules(&self) -> Result<Vec<RecurrenceRule>, CoreError> {
        let rules = sqlx::query_as(
            "SELECT * FROM recurrence_rules WHERE dormant = FALSE ORDER BY created_at",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rules)
    }

    async fn reload_rule(&self, id: Uuid) -> Result<Option<RecurrenceRule>, CoreError> {
        let rule = sqlx::query_as("SELECT * FROM recurrence_rules WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(rule)
    }

    async fn find_template(&self, id: Uuid) -> Result<Option<Task>, CoreError> {
        let template = sqlx::query_as("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(template)
    }

    async fn commit_occurrence(
        &self,
        rule: &RecurrenceRule,
        scheduled: NaiveDate,
        task: Option<&Task>,
    ) -> Result<RecurrenceRule, CoreError> {
        let mut tx = self.pool().begin().await?;
        let now = Utc::now();
        let last_due = task.and_then(|t| t.due_date).or(rule.last_due);

        // Cursor first: a lost race aborts before anything is inserted.
        let result = sqlx::query(
            r#"UPDATE recurrence_rules
            SET last_generated = $1, last_due = $2, version = version + 1, updated_at = $3
            WHERE id = $4 AND version = $5 AND dormant = FALSE"#,
        )
        .bind(scheduled)
        .bind(last_due)
        .bind(now)
        .bind(rule.id)
        .bind(rule.version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::PersistenceConflict(rule.id));
        }

        if let Some(task) = task {
            Self::insert_task_in_transaction(&mut tx, task).await?;
        }

        tx.commit().await?;

        Ok(RecurrenceRule {
            last_generated: scheduled,
            last_due,
            version: rule.version + 1,
            updated_at: now,
            ..rule.clone()
        })
    }

    async fn mark_dormant(&self, rule: &RecurrenceRule) -> Result<RecurrenceRule, CoreError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"UPDATE recurrence_rules
            SET dormant = TRUE, version = version + 1, updated_at = $1
            WHERE id = $2 AND version = $3"#,
        )
        .bind(now)
        .bind(rule.id)
        .bind(rule.version)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::PersistenceConflict(rule.id));
        }

        Ok(RecurrenceRule {
            dormant: true,
            version: rule.version + 1,
            updated_at: now,
            ..rule.clone()
        })
    }
}
