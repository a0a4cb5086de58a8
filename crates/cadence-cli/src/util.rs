use anyhow::{anyhow, Result};
use cadence_core::error::CoreError;
use cadence_core::repository::Repository;
use uuid::Uuid;

fn check_prefix(short_id: &str) -> Result<()> {
    if short_id.len() < 2 {
        return Err(anyhow!(CoreError::InvalidInput(
            "Short ID must be at least 2 characters long.".to_string()
        )));
    }
    Ok(())
}

pub async fn resolve_task_id(repo: &impl Repository, short_id: &str) -> Result<Uuid> {
    check_prefix(short_id)?;
    let tasks = repo.find_tasks_by_short_id_prefix(short_id).await?;
    match tasks.len() {
        1 => Ok(tasks[0].id),
        0 => Err(anyhow!(CoreError::NotFound(format!(
            "No task found with ID prefix '{}'",
            short_id
        )))),
        _ => {
            let task_info: Vec<(String, String)> = tasks
                .into_iter()
                .map(|t| (t.id.to_string(), t.title))
                .collect();
            Err(anyhow!(CoreError::AmbiguousId(task_info)))
        }
    }
}

pub async fn resolve_rule_id(repo: &impl Repository, short_id: &str) -> Result<Uuid> {
    check_prefix(short_id)?;
    let rules = repo.find_rules_by_short_id_prefix(short_id).await?;
    match rules.len() {
        1 => Ok(rules[0].id),
        0 => Err(anyhow!(CoreError::NotFound(format!(
            "No recurrence rule found with ID prefix '{}'",
            short_id
        )))),
        _ => {
            let rule_info: Vec<(String, String)> = rules
                .into_iter()
                .map(|r| (r.id.to_string(), r.describe()))
                .collect();
            Err(anyhow!(CoreError::AmbiguousId(rule_info)))
        }
    }
}

/// First eight hex digits, enough to type back as a prefix.
pub fn short_id(id: &Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}
