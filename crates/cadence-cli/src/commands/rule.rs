use anyhow::Result;
use cadence_core::models::{MonthDaySet, NewRuleData, RuleHealth, UpdateRuleData, WeekdaySet};
use cadence_core::recurrence::upcoming;
use cadence_core::repository::Repository;
use chrono_humanize::Humanize;
use dialoguer::Confirm;
use owo_colors::OwoColorize;

use crate::cli::{
    DeleteCommand, RuleAddCommand, RuleEditCommand, RuleListCommand, RuleShowCommand,
    RuleSubcommand,
};
use crate::parser::parse_date;
use crate::util::{resolve_rule_id, resolve_task_id, short_id};
use crate::views::table::{display_occurrences, display_rules, ViewRule};

pub async fn rule_command<R: Repository>(repo: &R, command: RuleSubcommand) -> Result<()> {
    match command {
        RuleSubcommand::Add(cmd) => add_rule(repo, cmd).await,
        RuleSubcommand::List(cmd) => list_rules(repo, cmd).await,
        RuleSubcommand::Show(cmd) => show_rule(repo, cmd).await,
        RuleSubcommand::Edit(cmd) => edit_rule(repo, cmd).await,
        RuleSubcommand::Delete(cmd) => delete_rule(repo, cmd).await,
    }
}

async fn add_rule<R: Repository>(repo: &R, command: RuleAddCommand) -> Result<()> {
    let template_id = resolve_task_id(repo, &command.template).await?;

    let mut data = NewRuleData::new(template_id, command.every);
    data.interval = command.interval;
    data.days_of_week = command.on.unwrap_or_default();
    data.days_of_month = command.days.unwrap_or_default();
    data.end_date = command.until.as_deref().map(parse_date).transpose()?;
    data.start_date = command.start.as_deref().map(parse_date).transpose()?;
    data.skip_weekends = command.skip_weekends;

    let rule = repo.create_rule(data).await?;

    println!("{} Created recurrence rule {}", "✓".green(), short_id(&rule.id).yellow());
    println!("  Schedule: {}", rule.describe().cyan());
    match upcoming(&rule).next() {
        Some(next) => println!("  Next due: {}", next.due),
        None => println!("  {}", "No occurrences before the end date.".yellow()),
    }
    Ok(())
}

async fn list_rules<R: Repository>(repo: &R, command: RuleListCommand) -> Result<()> {
    let rules = match command.owner {
        Some(owner) => repo.find_rules_by_owner(owner).await?,
        None => repo.find_rules().await?,
    };

    let mut views = Vec::with_capacity(rules.len());
    for rule in rules {
        let health = repo.rule_health(rule.id).await?;
        let template_title = repo
            .find_task_by_id(rule.template_task_id)
            .await?
            .map(|t| t.title);
        views.push(ViewRule {
            rule,
            health,
            template_title,
        });
    }

    display_rules(&views);
    Ok(())
}

async fn show_rule<R: Repository>(repo: &R, command: RuleShowCommand) -> Result<()> {
    let rule_id = resolve_rule_id(repo, &command.id).await?;
    let rule = repo
        .find_rule_by_id(rule_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Recurrence rule not found"))?;
    let stats = repo.get_rule_statistics(rule_id).await?;
    let template = repo.find_task_by_id(rule.template_task_id).await?;

    println!("{}", "Recurrence Rule".blue().bold());
    println!("Rule ID: {}", rule.id.yellow());
    match &template {
        Some(t) => println!("Template: {} ({})", t.title.cyan(), short_id(&t.id).yellow()),
        None => println!("Template: {}", "missing".red()),
    }
    println!("Schedule: {}", rule.describe().green());
    println!("Anchor: {}", rule.anchor_date);
    println!("Last generated: {}", rule.last_generated);
    println!("Created: {}", rule.created_at.humanize());
    let health = match stats.health {
        RuleHealth::Active => stats.health.to_string().green().to_string(),
        RuleHealth::Ended => stats.health.to_string().dimmed().to_string(),
        RuleHealth::Broken => stats.health.to_string().red().bold().to_string(),
    };
    println!("Status: {}", health);
    println!();

    println!("{}", "History".blue().bold());
    println!(
        "Generated: {}  Completed: {}  Open: {}  Cancelled: {}",
        stats.total_generated, stats.completed, stats.open, stats.cancelled
    );
    if let (Some(first), Some(last)) = (stats.first_due, stats.last_due) {
        println!("Due range: {} .. {}", first, last);
    }
    println!();

    if command.preview == 0 {
        return Ok(());
    }
    println!("{}", format!("Next {} Occurrences", command.preview).blue().bold());
    let preview: Vec<_> = upcoming(&rule).take(command.preview).collect();
    if preview.is_empty() {
        println!("No upcoming occurrences (recurrence ended)");
    } else {
        display_occurrences(&preview);
    }
    Ok(())
}

async fn edit_rule<R: Repository>(repo: &R, command: RuleEditCommand) -> Result<()> {
    let rule_id = resolve_rule_id(repo, &command.id).await?;

    let template_task_id = match &command.template {
        Some(template) => Some(resolve_task_id(repo, template).await?),
        None => None,
    };

    let end_date = if command.until_clear {
        Some(None)
    } else {
        command.until.as_deref().map(parse_date).transpose()?.map(Some)
    };

    let days_of_week = if command.on_clear {
        Some(WeekdaySet::new())
    } else {
        command.on
    };

    let days_of_month = if command.days_clear {
        Some(MonthDaySet::new())
    } else {
        command.days
    };

    let skip_weekends = if command.skip_weekends {
        Some(true)
    } else if command.no_skip_weekends {
        Some(false)
    } else {
        None
    };

    let update = UpdateRuleData {
        frequency: command.every,
        interval: command.interval,
        days_of_week,
        days_of_month,
        end_date,
        skip_weekends,
        template_task_id,
    };

    let rule = repo.update_rule(rule_id, update).await?;
    println!("{} Updated recurrence rule {}", "✓".green(), short_id(&rule.id).yellow());
    println!("  Schedule: {}", rule.describe().cyan());
    Ok(())
}

async fn delete_rule<R: Repository>(repo: &R, command: DeleteCommand) -> Result<()> {
    let rule_id = resolve_rule_id(repo, &command.id).await?;
    let rule = repo
        .find_rule_by_id(rule_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Recurrence rule not found"))?;

    if !command.force {
        let confirmation = Confirm::new()
            .with_prompt(format!(
                "Delete rule '{}'? Tasks it already generated are kept.",
                rule.describe()
            ))
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirmation {
            println!("Deletion cancelled.");
            return Ok(());
        }
    }

    repo.delete_rule(rule_id).await?;
    println!("Deleted recurrence rule {}", short_id(&rule_id));
    Ok(())
}
