//! Post-commit hook for newly generated tasks.
//!
//! Notification delivery (mail, webhooks, push) lives outside the engine. The
//! generator only calls an [`OccurrenceNotifier`] after the transaction that
//! created the task has committed, so a rolled-back occurrence is never
//! announced.

use async_trait::async_trait;
use tracing::info;

use crate::models::{RecurrenceRule, Task};

#[async_trait]
pub trait OccurrenceNotifier: Send + Sync {
    async fn occurrence_generated(&self, rule: &RecurrenceRule, task: &Task);
}

/// Records each generated occurrence in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl OccurrenceNotifier for LogNotifier {
    async fn occurrence_generated(&self, rule: &RecurrenceRule, task: &Task) {
        info!(
            rule_id = %rule.id,
            task_id = %task.id,
            due_date = ?task.due_date,
            title = %task.title,
            "generated recurring task"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Frequency;
    use chrono::NaiveDate;

    #[test]
    fn log_notifier_accepts_any_occurrence() {
        let rule = RecurrenceRule::new(
            Frequency::Daily,
            1,
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        );
        let task = Task::default();
        tokio_test::block_on(LogNotifier.occurrence_generated(&rule, &task));
    }
}
