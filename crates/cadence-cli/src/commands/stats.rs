use anyhow::Result;
use cadence_core::models::RuleHealth;
use cadence_core::repository::Repository;
use chrono::{Days, Utc};
use owo_colors::OwoColorize;

use crate::cli::StatsCommand;
use crate::util::short_id;
use crate::views::table::{display_agenda, display_frequency_counts};

/// Agenda entries per rule.
const AGENDA_PER_RULE: usize = 14;

pub async fn show_stats<R: Repository>(repo: &R, command: StatsCommand) -> Result<()> {
    println!("{}", "Rules by Frequency".blue().bold());
    let counts = repo.count_rules_by_frequency(command.owner).await?;
    display_frequency_counts(&counts);

    let rules = match command.owner {
        Some(owner) => repo.find_rules_by_owner(owner).await?,
        None => repo.find_rules().await?,
    };
    let mut broken = Vec::new();
    for rule in &rules {
        if repo.rule_health(rule.id).await? == RuleHealth::Broken {
            broken.push(rule.id);
        }
    }
    if !broken.is_empty() {
        println!(
            "{} {} rule(s) have a missing template: {}",
            "Warning:".yellow().bold(),
            broken.len(),
            broken
                .iter()
                .map(short_id)
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    println!();

    let today = Utc::now().date_naive();
    let until = today
        .checked_add_days(Days::new(command.days as u64))
        .unwrap_or(today);
    println!("{}", format!("Upcoming (next {} days)", command.days).blue().bold());
    let agenda = repo
        .upcoming_occurrences(command.owner, until, AGENDA_PER_RULE)
        .await?;
    display_agenda(&agenda);
    Ok(())
}
