use crate::db::DbPool;
use crate::error::CoreError;
use crate::models::{
    FrequencyCount, NewRuleData, NewTaskData, RecurrenceRule, RuleHealth, RuleStatistics, Task,
    TaskStatus, UpcomingOccurrence, UpdateRuleData,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

pub mod generation;
pub mod rules;
pub mod statistics;
pub mod tasks;

// Traits are defined in this module and implemented in respective domain modules

/// Domain-specific trait for task operations
#[async_trait]
pub trait TaskRepository {
    async fn add_task(&self, data: NewTaskData) -> Result<Task, CoreError>;
    async fn find_task_by_id(&self, id: Uuid) -> Result<Option<Task>, CoreError>;
    async fn find_tasks_by_short_id_prefix(&self, short_id: &str) -> Result<Vec<Task>, CoreError>;
    async fn find_tasks(&self, owner_id: Option<Uuid>) -> Result<Vec<Task>, CoreError>;
    async fn find_tasks_for_rule(&self, rule_id: Uuid) -> Result<Vec<Task>, CoreError>;
    async fn set_task_status(&self, id: Uuid, status: TaskStatus) -> Result<Task, CoreError>;
    async fn delete_task(&self, id: Uuid) -> Result<(), CoreError>;
}

/// Domain-specific trait for recurrence rule administration
#[async_trait]
pub trait RuleRepository {
    async fn create_rule(&self, data: NewRuleData) -> Result<RecurrenceRule, CoreError>;
    async fn find_rule_by_id(&self, id: Uuid) -> Result<Option<RecurrenceRule>, CoreError>;
    async fn find_rules_by_short_id_prefix(&self, short_id: &str) -> Result<Vec<RecurrenceRule>, CoreError>;
    async fn find_rules(&self) -> Result<Vec<RecurrenceRule>, CoreError>;
    async fn find_rules_by_owner(&self, owner_id: Uuid) -> Result<Vec<RecurrenceRule>, CoreError>;
    async fn find_rules_by_template(&self, template_id: Uuid) -> Result<Vec<RecurrenceRule>, CoreError>;
    async fn update_rule(&self, id: Uuid, data: UpdateRuleData) -> Result<RecurrenceRule, CoreError>;
    async fn delete_rule(&self, id: Uuid) -> Result<(), CoreError>;
}

/// The persistence boundary the batch generator runs against.
///
/// `commit_occurrence` and `mark_dormant` are optimistic: they succeed only if
/// the stored rule still carries `rule.version`, and fail with
/// `PersistenceConflict` otherwise.
#[async_trait]
pub trait GenerationRepository: Send + Sync {
    async fn find_active_rules(&self) -> Result<Vec<RecurrenceRule>, CoreError>;
    async fn reload_rule(&self, id: Uuid) -> Result<Option<RecurrenceRule>, CoreError>;
    async fn find_template(&self, id: Uuid) -> Result<Option<Task>, CoreError>;
    /// Atomically moves the cursor to `scheduled` and inserts `task`, if any.
    /// An inserted task's due date becomes the rule's `last_due`.
    async fn commit_occurrence(
        &self,
        rule: &RecurrenceRule,
        scheduled: NaiveDate,
        task: Option<&Task>,
    ) -> Result<RecurrenceRule, CoreError>;
    async fn mark_dormant(&self, rule: &RecurrenceRule) -> Result<RecurrenceRule, CoreError>;
}

/// Domain-specific trait for read-side helpers
#[async_trait]
pub trait StatisticsRepository {
    async fn count_rules_by_frequency(&self, owner_id: Option<Uuid>) -> Result<Vec<FrequencyCount>, CoreError>;
    async fn rule_health(&self, rule_id: Uuid) -> Result<RuleHealth, CoreError>;
    async fn get_rule_statistics(&self, rule_id: Uuid) -> Result<RuleStatistics, CoreError>;
    async fn upcoming_occurrences(
        &self,
        owner_id: Option<Uuid>,
        until: NaiveDate,
        per_rule_limit: usize,
    ) -> Result<Vec<UpcomingOccurrence>, CoreError>;
}

/// Main repository trait that composes all domain traits
pub trait Repository:
    TaskRepository + RuleRepository + GenerationRepository + StatisticsRepository
{
}

/// SQLite implementation of the repository pattern
#[derive(Clone)]
pub struct SqliteRepository {
    pool: DbPool,
}

impl SqliteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the database pool for internal use across modules
    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }
}

impl Repository for SqliteRepository {}

/// Normalises a user-typed UUID prefix for matching against `hex(id)`.
pub(crate) fn hex_prefix_pattern(short_id: &str) -> String {
    let mut pattern: String = short_id
        .chars()
        .filter(|c| *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect();
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_pattern_strips_dashes() {
        assert_eq!(hex_prefix_pattern("01AB-cd"), "01abcd%");
    }
}
