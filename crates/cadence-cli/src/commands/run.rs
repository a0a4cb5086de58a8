use anyhow::Result;
use cadence_core::error::CoreError;
use cadence_core::generator::{GenerationReport, RecurrenceGenerator};
use cadence_core::models::GenerationConfig;
use cadence_core::repository::{GenerationRepository, SqliteRepository, StatisticsRepository};
use chrono::Utc;
use owo_colors::OwoColorize;
use uuid::Uuid;

use crate::cli::RunCommand;
use crate::parser::parse_date;
use crate::util::short_id;

pub async fn run_generation(
    repo: &SqliteRepository,
    config: GenerationConfig,
    command: RunCommand,
) -> Result<()> {
    let as_of = match command.as_of.as_deref() {
        Some(date) => parse_date(date)?,
        None => Utc::now().date_naive(),
    };

    let generator = RecurrenceGenerator::new(repo.clone(), config);
    let report = generator.process_due_recurrences(as_of).await?;

    if command.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(generator.repository(), &report).await?;
    }
    Ok(())
}

async fn print_report<R>(repo: &R, report: &GenerationReport) -> Result<()>
where
    R: GenerationRepository + StatisticsRepository,
{
    let as_of = report
        .as_of
        .map(|d| d.to_string())
        .unwrap_or_default();

    if report.generated == 0 {
        println!("Nothing due as of {}.", as_of);
    } else {
        println!(
            "{} Generated {} task(s) as of {}",
            "✓".green(),
            report.generated.to_string().bold(),
            as_of
        );
    }
    println!(
        "  rules: {}  skipped: {}  ended: {}  failed: {}",
        report.rules_processed,
        report.skipped,
        report.ended,
        report.failed.len()
    );

    for rule_id in &report.failed {
        let health = failure_label(repo, *rule_id).await?;
        println!("  {} rule {}: {}", "!".red().bold(), short_id(rule_id).yellow(), health);
    }
    Ok(())
}

/// Health of a failed rule, which may have been deleted since the batch committed.
async fn failure_label<R: StatisticsRepository>(repo: &R, rule_id: Uuid) -> Result<String> {
    match repo.rule_health(rule_id).await {
        Ok(health) => Ok(health.to_string()),
        Err(CoreError::NotFound(_)) => Ok("rule no longer exists".to_string()),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::db::establish_connection;
    use cadence_core::models::{Frequency, NewRuleData, NewTaskData};
    use cadence_core::repository::{RuleRepository, TaskRepository};

    #[tokio::test]
    async fn failure_label_survives_deleted_rule() {
        let repo = SqliteRepository::new(establish_connection("sqlite::memory:").await.unwrap());
        let template = repo
            .add_task(NewTaskData {
                title: "Backup".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let rule = repo
            .create_rule(NewRuleData::new(template.id, Frequency::Daily))
            .await
            .unwrap();

        repo.delete_task(template.id).await.unwrap();
        assert!(failure_label(&repo, rule.id).await.unwrap().contains("template missing"));

        repo.delete_rule(rule.id).await.unwrap();
        assert_eq!(failure_label(&repo, rule.id).await.unwrap(), "rule no longer exists");
    }
}
