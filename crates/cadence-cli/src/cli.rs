use cadence_core::models::{Frequency, MonthDaySet, TaskPriority, WeekdaySet};
use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

/// Cadence: recurring tasks that show up on time, exactly once
#[derive(Parser, Debug)]
#[command(name = "cadence", author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Generate every recurring task that is due
    Run(RunCommand),
    /// Manage tasks and templates
    Task(TaskCommand),
    /// Manage recurrence rules
    Rule(RuleCommand),
    /// Show rule counts, health and the upcoming agenda
    Stats(StatsCommand),
}

#[derive(Args, Debug, Clone)]
pub struct RunCommand {
    /// Generate occurrences due on or before this date (default: today)
    #[arg(long)]
    pub as_of: Option<String>,
    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

// ============================================================================
// Tasks
// ============================================================================

#[derive(Args, Debug, Clone)]
pub struct TaskCommand {
    #[command(subcommand)]
    pub command: TaskSubcommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TaskSubcommand {
    /// Add a task; any task can serve as a recurrence template
    Add(TaskAddCommand),
    /// List tasks
    List(TaskListCommand),
    /// Mark a task as completed
    Done(TaskIdCommand),
    /// Delete a task
    Delete(DeleteCommand),
}

#[derive(Args, Debug, Clone)]
pub struct TaskAddCommand {
    /// The title of the task
    pub title: String,
    #[arg(short, long)]
    pub description: Option<String>,
    /// none, low, medium or high
    #[arg(short, long)]
    pub priority: Option<TaskPriority>,
    #[arg(short, long)]
    pub category: Option<String>,
    #[arg(long)]
    pub assignee: Option<Uuid>,
    /// Owner id (default: the configured owner)
    #[arg(long)]
    pub owner: Option<Uuid>,
    /// Due date, e.g. '2026-02-20' or 'next friday'
    #[arg(long)]
    pub due: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct TaskListCommand {
    /// Only tasks generated by this rule
    #[arg(long)]
    pub rule: Option<String>,
    #[arg(long, conflicts_with = "rule")]
    pub owner: Option<Uuid>,
}

#[derive(Args, Debug, Clone)]
pub struct TaskIdCommand {
    /// Task ID or unique prefix
    pub id: String,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteCommand {
    /// ID or unique prefix
    pub id: String,
    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub force: bool,
}

// ============================================================================
// Rules
// ============================================================================

#[derive(Args, Debug, Clone)]
pub struct RuleCommand {
    #[command(subcommand)]
    pub command: RuleSubcommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum RuleSubcommand {
    /// Attach a recurrence rule to a template task
    Add(RuleAddCommand),
    /// List rules with their health
    List(RuleListCommand),
    /// Show a rule's history and next occurrences
    Show(RuleShowCommand),
    /// Change a rule; its cursor is kept
    Edit(RuleEditCommand),
    /// Delete a rule; already generated tasks are kept
    Delete(DeleteCommand),
}

#[derive(Args, Debug, Clone)]
pub struct RuleAddCommand {
    /// Template task ID or unique prefix
    pub template: String,
    /// daily, weekly, monthly or yearly
    #[arg(long)]
    pub every: Frequency,
    #[arg(long, default_value_t = 1)]
    pub interval: u32,
    /// Weekdays for weekly rules (mon,tue,wed,thu,fri,sat,sun)
    #[arg(long)]
    pub on: Option<WeekdaySet>,
    /// Days of month for monthly rules, e.g. '1,15,31'
    #[arg(long)]
    pub days: Option<MonthDaySet>,
    /// Nothing is generated on or after this date
    #[arg(long)]
    pub until: Option<String>,
    /// Anchor date (default: the template's due date, else today)
    #[arg(long)]
    pub start: Option<String>,
    /// Move Saturday occurrences to Friday and Sunday ones to Monday
    #[arg(long)]
    pub skip_weekends: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RuleListCommand {
    #[arg(long)]
    pub owner: Option<Uuid>,
}

#[derive(Args, Debug, Clone)]
pub struct RuleShowCommand {
    /// Rule ID or unique prefix
    pub id: String,
    /// Number of upcoming occurrences to preview
    #[arg(long, default_value_t = 5)]
    pub preview: usize,
}

#[derive(Args, Debug, Clone)]
pub struct RuleEditCommand {
    /// Rule ID or unique prefix
    pub id: String,

    #[arg(long)]
    pub every: Option<Frequency>,
    #[arg(long)]
    pub interval: Option<u32>,

    #[arg(long)]
    pub on: Option<WeekdaySet>,
    #[arg(long, conflicts_with = "on")]
    pub on_clear: bool,

    #[arg(long)]
    pub days: Option<MonthDaySet>,
    #[arg(long, conflicts_with = "days")]
    pub days_clear: bool,

    #[arg(long)]
    pub until: Option<String>,
    #[arg(long, conflicts_with = "until")]
    pub until_clear: bool,

    #[arg(long)]
    pub skip_weekends: bool,
    #[arg(long, conflicts_with = "skip_weekends")]
    pub no_skip_weekends: bool,

    /// Point the rule at a different template task
    #[arg(long)]
    pub template: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct StatsCommand {
    #[arg(long)]
    pub owner: Option<Uuid>,
    /// Agenda horizon in days
    #[arg(long, default_value_t = 7)]
    pub days: u32,
}
