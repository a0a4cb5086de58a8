use crate::error::CoreError;
use crate::models::{NewTaskData, Task, TaskPriority, TaskStatus};
use crate::repository::{hex_prefix_pattern, SqliteRepository};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Sqlite, Transaction};
use uuid::Uuid;

#[async_trait]
impl super::TaskRepository for SqliteRepository {
    async fn add_task(&self, data: NewTaskData) -> Result<Task, CoreError> {
        if data.title.trim().is_empty() {
            return Err(CoreError::InvalidInput("Task title cannot be empty".to_string()));
        }

        let now = Utc::now();
        let task = Task {
            id: Uuid::now_v7(),
            title: data.title,
            description: data.description,
            priority: data.priority.unwrap_or(TaskPriority::None),
            category: data.category,
            assignee_id: data.assignee_id,
            owner_id: data.owner_id,
            due_date: data.due_date,
            status: TaskStatus::Pending,
            progress: 0,
            completed_at: None,
            created_at: now,
            updated_at: now,
            source_rule_id: None,
        };

        let mut tx = self.pool().begin().await?;
        Self::insert_task_in_transaction(&mut tx, &task).await?;
        tx.commit().await?;
        Ok(task)
    }

    async fn find_task_by_id(&self, id: Uuid) -> Result<Option<Task>, CoreError> {
        let task = sqlx::query_as("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(task)
    }

    async fn find_tasks_by_short_id_prefix(&self, short_id: &str) -> Result<Vec<Task>, CoreError> {
        let tasks = sqlx::query_as("SELECT * FROM tasks WHERE lower(hex(id)) LIKE $1")
            .bind(hex_prefix_pattern(short_id))
            .fetch_all(self.pool())
            .await?;
        Ok(tasks)
    }

    async fn find_tasks(&self, owner_id: Option<Uuid>) -> Result<Vec<Task>, CoreError> {
        let tasks = match owner_id {
            Some(owner_id) => {
                sqlx::query_as(
                    "SELECT * FROM tasks WHERE owner_id = $1 ORDER BY due_date IS NULL, due_date, created_at",
                )
                .bind(owner_id)
                .fetch_all(self.pool())
                .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM tasks ORDER BY due_date IS NULL, due_date, created_at")
                    .fetch_all(self.pool())
                    .await?
            }
        };
        Ok(tasks)
    }

    async fn find_tasks_for_rule(&self, rule_id: Uuid) -> Result<Vec<Task>, CoreError> {
        let tasks = sqlx::query_as("SELECT * FROM tasks WHERE source_rule_id = $1 ORDER BY due_date")
            .bind(rule_id)
            .fetch_all(self.pool())
            .await?;
        Ok(tasks)
    }

    async fn set_task_status(&self, id: Uuid, status: TaskStatus) -> Result<Task, CoreError> {
        let mut task: Task = sqlx::query_as("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Task with id {} not found", id)))?;

        let now = Utc::now();
        let reopened = task.status == TaskStatus::Completed && status != TaskStatus::Completed;
        task.status = status;
        task.updated_at = now;
        match status {
            TaskStatus::Completed => {
                task.progress = 100;
                task.completed_at = Some(now);
            }
            _ => {
                task.completed_at = None;
                if reopened {
                    task.progress = 0;
                }
            }
        }

        sqlx::query("UPDATE tasks SET status = $1, progress = $2, completed_at = $3, updated_at = $4 WHERE id = $5")
            .bind(task.status)
            .bind(task.progress)
            .bind(task.completed_at)
            .bind(task.updated_at)
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(task)
    }

    async fn delete_task(&self, id: Uuid) -> Result<(), CoreError> {
        // Rules referencing a deleted template stay in place and report themselves broken.
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

impl SqliteRepository {
    pub(crate) async fn insert_task_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        task: &Task,
    ) -> Result<(), CoreError> {
        sqlx::query(
            r#"INSERT INTO tasks (id, title, description, priority, category, assignee_id, owner_id, due_date, status, progress, completed_at, created_at, updated_at, source_rule_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"#,
        )
        .bind(task.id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.priority)
        .bind(&task.category)
        .bind(task.assignee_id)
        .bind(task.owner_id)
        .bind(task.due_date)
        .bind(task.status)
        .bind(task.progress)
        .bind(task.completed_at)
        .bind(task.created_at)
        .bind(task.updated_at)
        .bind(task.source_rule_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}
