use anyhow::Result;
use cadence_core::models::{NewTaskData, TaskStatus};
use cadence_core::repository::Repository;
use dialoguer::Confirm;
use owo_colors::OwoColorize;

use crate::cli::{DeleteCommand, TaskAddCommand, TaskIdCommand, TaskListCommand, TaskSubcommand};
use crate::config::Config;
use crate::parser::parse_date;
use crate::util::{resolve_rule_id, resolve_task_id, short_id};
use crate::views::table::display_tasks;

pub async fn task_command<R: Repository>(repo: &R, command: TaskSubcommand, config: &Config) -> Result<()> {
    match command {
        TaskSubcommand::Add(cmd) => add_task(repo, cmd, config).await,
        TaskSubcommand::List(cmd) => list_tasks(repo, cmd).await,
        TaskSubcommand::Done(cmd) => complete_task(repo, cmd).await,
        TaskSubcommand::Delete(cmd) => delete_task(repo, cmd).await,
    }
}

async fn add_task<R: Repository>(repo: &R, command: TaskAddCommand, config: &Config) -> Result<()> {
    let due_date = command.due.as_deref().map(parse_date).transpose()?;

    let task = repo
        .add_task(NewTaskData {
            title: command.title,
            description: command.description,
            priority: command.priority,
            category: command.category,
            assignee_id: command.assignee,
            owner_id: command.owner.unwrap_or_else(|| config.owner()),
            due_date,
        })
        .await?;

    println!("{} Created task: {} ({})", "✓".green(), task.title.cyan(), short_id(&task.id).yellow());
    if let Some(due) = task.due_date {
        println!("  Due: {}", due);
    }
    Ok(())
}

async fn list_tasks<R: Repository>(repo: &R, command: TaskListCommand) -> Result<()> {
    let tasks = match command.rule {
        Some(rule) => {
            let rule_id = resolve_rule_id(repo, &rule).await?;
            repo.find_tasks_for_rule(rule_id).await?
        }
        None => repo.find_tasks(command.owner).await?,
    };
    display_tasks(&tasks);
    Ok(())
}

async fn complete_task<R: Repository>(repo: &R, command: TaskIdCommand) -> Result<()> {
    let task_id = resolve_task_id(repo, &command.id).await?;
    let task = repo.set_task_status(task_id, TaskStatus::Completed).await?;
    println!("{} Completed task: '{}'", "✓".green(), task.title);
    Ok(())
}

async fn delete_task<R: Repository>(repo: &R, command: DeleteCommand) -> Result<()> {
    let task_id = resolve_task_id(repo, &command.id).await?;
    let task = repo
        .find_task_by_id(task_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Task with ID '{}' not found.", task_id))?;

    let dependents = repo.find_rules_by_template(task_id).await?;
    if !dependents.is_empty() {
        println!(
            "{} '{}' is the template of {} recurrence rule(s); they will stop generating until reassigned.",
            "Warning:".yellow().bold(),
            task.title,
            dependents.len()
        );
    }

    if !command.force {
        let confirmation = Confirm::new()
            .with_prompt(format!("Are you sure you want to delete task '{}'?", task.title))
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirmation {
            println!("Deletion cancelled.");
            return Ok(());
        }
    }

    repo.delete_task(task_id).await?;
    println!("Deleted task: '{}'", task.title);
    Ok(())
}
