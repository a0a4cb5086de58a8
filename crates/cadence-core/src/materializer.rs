//! Turns a template task into a fresh, independent occurrence.

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::{RecurrenceRule, Task, TaskStatus};

/// Clones the template's descriptive fields into a new task due on `due_date`.
///
/// Completion state is reset: the occurrence starts `Pending` at 0% with no
/// completion timestamp, whatever state the template is in. A missing
/// template yields `TemplateUnavailable` so the caller can isolate the rule.
pub fn materialize(
    rule: &RecurrenceRule,
    template: Option<&Task>,
    due_date: NaiveDate,
) -> Result<Task, CoreError> {
    let template = template.ok_or(CoreError::TemplateUnavailable(rule.id))?;
    let now = Utc::now();

    Ok(Task {
        id: Uuid::now_v7(),
        title: template.title.clone(),
        description: template.description.clone(),
        priority: template.priority,
        category: template.category.clone(),
        assignee_id: template.assignee_id,
        owner_id: template.owner_id,
        due_date: Some(due_date),
        status: TaskStatus::Pending,
        progress: 0,
        completed_at: None,
        created_at: now,
        updated_at: now,
        source_rule_id: Some(rule.id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Frequency, TaskPriority};

    fn template() -> Task {
        Task {
            title: "Water the plants".to_string(),
            description: Some("Balcony and kitchen".to_string()),
            priority: TaskPriority::High,
            category: Some("home".to_string()),
            assignee_id: Some(Uuid::now_v7()),
            owner_id: Uuid::now_v7(),
            due_date: NaiveDate::from_ymd_opt(2026, 2, 20),
            status: TaskStatus::Completed,
            progress: 100,
            completed_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    #[test]
    fn copies_descriptive_fields_and_resets_progress() {
        let rule = RecurrenceRule::new(
            Frequency::Daily,
            1,
            NaiveDate::from_ymd_opt(2026, 2, 20).unwrap(),
        );
        let template = template();
        let due = NaiveDate::from_ymd_opt(2026, 2, 21).unwrap();

        let task = materialize(&rule, Some(&template), due).unwrap();

        assert_ne!(task.id, template.id);
        assert_eq!(task.title, template.title);
        assert_eq!(task.description, template.description);
        assert_eq!(task.priority, TaskPriority::High);
        assert_eq!(task.category, template.category);
        assert_eq!(task.assignee_id, template.assignee_id);
        assert_eq!(task.owner_id, template.owner_id);
        assert_eq!(task.due_date, Some(due));
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.progress, 0);
        assert!(task.completed_at.is_none());
        assert_eq!(task.source_rule_id, Some(rule.id));
    }

    #[test]
    fn missing_template_is_reported_per_rule() {
        let rule = RecurrenceRule::new(
            Frequency::Weekly,
            1,
            NaiveDate::from_ymd_opt(2026, 2, 20).unwrap(),
        );
        let due = NaiveDate::from_ymd_opt(2026, 2, 27).unwrap();
        match materialize(&rule, None, due) {
            Err(CoreError::TemplateUnavailable(id)) => assert_eq!(id, rule.id),
            other => panic!("expected TemplateUnavailable, got {:?}", other),
        }
    }
}
