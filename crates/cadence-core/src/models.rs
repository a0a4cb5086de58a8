use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid task status: {0}")]
pub struct ParseTaskStatusError(String);

impl FromStr for TaskStatus {
    type Err = ParseTaskStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" | "in-progress" | "started" => Ok(TaskStatus::InProgress),
            "completed" | "done" => Ok(TaskStatus::Completed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            _ => Err(ParseTaskStatusError(s.to_string())),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in progress"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    None,
    Low,
    Medium,
    High,
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid task priority: {0}")]
pub struct ParseTaskPriorityError(String);

impl FromStr for TaskPriority {
    type Err = ParseTaskPriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(TaskPriority::None),
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            _ => Err(ParseTaskPriorityError(s.to_string())),
        }
    }
}

/// A task record. Templates and generated occurrences share this shape;
/// an occurrence differs only in carrying `source_rule_id`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub category: Option<String>,
    pub assignee_id: Option<Uuid>,
    pub owner_id: Uuid,
    pub due_date: Option<NaiveDate>,
    pub status: TaskStatus,
    /// Percent complete, 0..=100
    pub progress: u8,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Provenance of a generated occurrence. Not a foreign key.
    pub source_rule_id: Option<Uuid>,
}

impl Default for Task {
    fn default() -> Self {
        Self {
            id: Uuid::now_v7(),
            title: String::new(),
            description: None,
            priority: TaskPriority::None,
            category: None,
            assignee_id: None,
            owner_id: Uuid::nil(),
            due_date: None,
            status: TaskStatus::Pending,
            progress: 0,
            completed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            source_rule_id: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewTaskData {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub category: Option<String>,
    pub assignee_id: Option<Uuid>,
    pub owner_id: Uuid,
    pub due_date: Option<NaiveDate>,
}

// ============================================================================
// Recurrence Models
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub const ALL: [Frequency; 4] = [
        Frequency::Daily,
        Frequency::Weekly,
        Frequency::Monthly,
        Frequency::Yearly,
    ];
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::Daily => write!(f, "daily"),
            Frequency::Weekly => write!(f, "weekly"),
            Frequency::Monthly => write!(f, "monthly"),
            Frequency::Yearly => write!(f, "yearly"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid frequency: {0}")]
pub struct ParseFrequencyError(String);

impl FromStr for Frequency {
    type Err = ParseFrequencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" | "day" => Ok(Frequency::Daily),
            "weekly" | "week" => Ok(Frequency::Weekly),
            "monthly" | "month" => Ok(Frequency::Monthly),
            "yearly" | "year" | "annually" => Ok(Frequency::Yearly),
            _ => Err(ParseFrequencyError(s.to_string())),
        }
    }
}

const WEEKDAY_NAMES: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

/// Set of ISO weekday ordinals (1 = Monday .. 7 = Sunday), bit `n - 1` per day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn from_ordinals<I: IntoIterator<Item = u8>>(ordinals: I) -> Result<Self, CoreError> {
        let mut set = Self::new();
        for ordinal in ordinals {
            if !(1..=7).contains(&ordinal) {
                return Err(CoreError::InvalidRuleConfiguration(format!(
                    "weekday ordinal {} is outside 1..=7",
                    ordinal
                )));
            }
            set.0 |= 1 << (ordinal - 1);
        }
        Ok(set)
    }

    pub fn from_weekdays<I: IntoIterator<Item = Weekday>>(days: I) -> Self {
        days.into_iter().fold(Self::new(), |set, day| {
            Self(set.0 | 1 << day.num_days_from_monday())
        })
    }

    #[inline]
    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 & 0x7f == 0
    }

    pub fn len(&self) -> usize {
        (self.0 & 0x7f).count_ones() as usize
    }

    /// Ordinals in ascending order.
    pub fn ordinals(&self) -> impl Iterator<Item = u8> + '_ {
        (1..=7u8).filter(move |n| self.0 & (1 << (n - 1)) != 0)
    }
}

impl TryFrom<Vec<u8>> for WeekdaySet {
    type Error = CoreError;

    fn try_from(ordinals: Vec<u8>) -> Result<Self, Self::Error> {
        Self::from_ordinals(ordinals)
    }
}

impl From<WeekdaySet> for Vec<u8> {
    fn from(set: WeekdaySet) -> Self {
        set.ordinals().collect()
    }
}

impl fmt::Display for WeekdaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self
            .ordinals()
            .map(|n| WEEKDAY_NAMES[(n - 1) as usize])
            .collect();
        write!(f, "{}", names.join(","))
    }
}

/// Accepts comma-separated names (`mon,wed`) or ordinals (`1,3`).
impl FromStr for WeekdaySet {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut ordinals = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let lower = part.to_lowercase();
            let ordinal = match WEEKDAY_NAMES.iter().position(|name| lower.starts_with(name)) {
                Some(index) => index as u8 + 1,
                None => lower.parse::<u8>().map_err(|_| {
                    CoreError::InvalidRuleConfiguration(format!("unknown weekday '{}'", part))
                })?,
            };
            ordinals.push(ordinal);
        }
        Self::from_ordinals(ordinals)
    }
}

/// Set of days of month 1..=31, bit `n - 1` per day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct MonthDaySet(u32);

impl MonthDaySet {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn from_days<I: IntoIterator<Item = u8>>(days: I) -> Result<Self, CoreError> {
        let mut set = Self::new();
        for day in days {
            if !(1..=31).contains(&day) {
                return Err(CoreError::InvalidRuleConfiguration(format!(
                    "day of month {} is outside 1..=31",
                    day
                )));
            }
            set.0 |= 1 << (day - 1);
        }
        Ok(set)
    }

    #[inline]
    pub fn contains(&self, day: u32) -> bool {
        (1..=31).contains(&day) && self.0 & (1 << (day - 1)) != 0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 & 0x7fff_ffff == 0
    }

    pub fn len(&self) -> usize {
        (self.0 & 0x7fff_ffff).count_ones() as usize
    }

    /// Days in ascending order.
    pub fn days(&self) -> impl Iterator<Item = u32> + '_ {
        (1..=31u32).filter(move |d| self.0 & (1 << (d - 1)) != 0)
    }
}

impl TryFrom<Vec<u8>> for MonthDaySet {
    type Error = CoreError;

    fn try_from(days: Vec<u8>) -> Result<Self, Self::Error> {
        Self::from_days(days)
    }
}

impl From<MonthDaySet> for Vec<u8> {
    fn from(set: MonthDaySet) -> Self {
        set.days().map(|d| d as u8).collect()
    }
}

impl fmt::Display for MonthDaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let days: Vec<String> = self.days().map(|d| d.to_string()).collect();
        write!(f, "{}", days.join(","))
    }
}

impl FromStr for MonthDaySet {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let days = s
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| {
                p.parse::<u8>().map_err(|_| {
                    CoreError::InvalidRuleConfiguration(format!("invalid day of month '{}'", p))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_days(days)
    }
}

/// A declarative recurrence attached to a template task, plus its generation cursor.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct RecurrenceRule {
    pub id: Uuid,
    pub frequency: Frequency,
    /// Number of frequency units between occurrences, always >= 1
    pub interval: u32,
    /// Weekly only; empty means the anchor's weekday
    pub days_of_week: WeekdaySet,
    /// Monthly only; empty means the anchor's day of month
    pub days_of_month: MonthDaySet,
    /// Exclusive bound: nothing is generated on or after this date
    pub end_date: Option<NaiveDate>,
    /// Creation reference date; interval parity is measured from here
    pub anchor_date: NaiveDate,
    /// Scheduled date of the most recently materialized occurrence
    pub last_generated: NaiveDate,
    /// Due date of the most recently created task, `None` before the first
    pub last_due: Option<NaiveDate>,
    pub skip_weekends: bool,
    pub dormant: bool,
    pub template_task_id: Uuid,
    pub owner_id: Uuid,
    /// Optimistic lock token, bumped on every write
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecurrenceRule {
    /// A rule anchored at `anchor` with an empty cursor history.
    pub fn new(frequency: Frequency, interval: u32, anchor: NaiveDate) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            frequency,
            interval,
            days_of_week: WeekdaySet::new(),
            days_of_month: MonthDaySet::new(),
            end_date: None,
            anchor_date: anchor,
            last_generated: anchor,
            last_due: None,
            skip_weekends: false,
            dormant: false,
            template_task_id: Uuid::nil(),
            owner_id: Uuid::nil(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        !self.dormant
    }

    pub fn describe(&self) -> String {
        let unit = match self.frequency {
            Frequency::Daily => "day",
            Frequency::Weekly => "week",
            Frequency::Monthly => "month",
            Frequency::Yearly => "year",
        };
        let mut text = if self.interval == 1 {
            format!("every {}", unit)
        } else {
            format!("every {} {}s", self.interval, unit)
        };
        match self.frequency {
            Frequency::Weekly if !self.days_of_week.is_empty() => {
                text.push_str(&format!(" on {}", self.days_of_week));
            }
            Frequency::Monthly if !self.days_of_month.is_empty() => {
                text.push_str(&format!(" on day {}", self.days_of_month));
            }
            Frequency::Yearly => {
                text.push_str(&format!(" on {}", self.anchor_date.format("%b %d")));
            }
            _ => {}
        }
        if self.skip_weekends {
            text.push_str(", weekends shifted");
        }
        if let Some(end) = self.end_date {
            text.push_str(&format!(", until {}", end));
        }
        text
    }
}

/// Data required to attach recurrence to a template task
#[derive(Debug, Clone)]
pub struct NewRuleData {
    /// Must exist
    pub template_task_id: Uuid,
    pub frequency: Frequency,
    pub interval: u32,
    pub days_of_week: WeekdaySet,
    pub days_of_month: MonthDaySet,
    pub end_date: Option<NaiveDate>,
    /// Anchor date; defaults to the template's due date, else today
    pub start_date: Option<NaiveDate>,
    pub skip_weekends: bool,
    /// Defaults to the template's owner
    pub owner_id: Option<Uuid>,
}

impl NewRuleData {
    pub fn new(template_task_id: Uuid, frequency: Frequency) -> Self {
        Self {
            template_task_id,
            frequency,
            interval: 1,
            days_of_week: WeekdaySet::new(),
            days_of_month: MonthDaySet::new(),
            end_date: None,
            start_date: None,
            skip_weekends: false,
            owner_id: None,
        }
    }
}

/// Data for modifying an existing rule. The cursor is never part of an edit.
#[derive(Debug, Clone, Default)]
pub struct UpdateRuleData {
    pub frequency: Option<Frequency>,
    pub interval: Option<u32>,
    pub days_of_week: Option<WeekdaySet>,
    pub days_of_month: Option<MonthDaySet>,
    pub end_date: Option<Option<NaiveDate>>,
    pub skip_weekends: Option<bool>,
    /// Reassign a broken rule to a new template
    pub template_task_id: Option<Uuid>,
}

impl UpdateRuleData {
    pub fn is_empty(&self) -> bool {
        self.frequency.is_none()
            && self.interval.is_none()
            && self.days_of_week.is_none()
            && self.days_of_month.is_none()
            && self.end_date.is_none()
            && self.skip_weekends.is_none()
            && self.template_task_id.is_none()
    }
}

/// User-facing condition of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleHealth {
    Active,
    /// End date reached
    Ended,
    /// Template task no longer exists
    Broken,
}

impl fmt::Display for RuleHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleHealth::Active => write!(f, "active"),
            RuleHealth::Ended => write!(f, "recurrence ended"),
            RuleHealth::Broken => write!(f, "recurrence broken - template missing"),
        }
    }
}

/// A single computed occurrence: the scheduled date and the date it is due
/// after the weekend policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Occurrence {
    pub scheduled: NaiveDate,
    pub due: NaiveDate,
}

impl Occurrence {
    #[inline]
    pub fn is_shifted(&self) -> bool {
        self.scheduled != self.due
    }

    pub fn weekday(&self) -> Weekday {
        self.due.weekday()
    }
}

// ============================================================================
// Read-side Models
// ============================================================================

/// Number of rules per frequency, split by state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrequencyCount {
    pub frequency: Frequency,
    pub active: u32,
    pub dormant: u32,
}

/// History and outlook of a single rule.
#[derive(Debug, Clone, Serialize)]
pub struct RuleStatistics {
    pub rule_id: Uuid,
    pub health: RuleHealth,
    pub total_generated: u32,
    pub completed: u32,
    pub open: u32,
    pub cancelled: u32,
    pub first_due: Option<NaiveDate>,
    pub last_due: Option<NaiveDate>,
    pub next_occurrence: Option<Occurrence>,
}

/// An occurrence that has not been generated yet, for agenda-style listings.
#[derive(Debug, Clone, Serialize)]
pub struct UpcomingOccurrence {
    pub rule_id: Uuid,
    pub template_title: Option<String>,
    pub occurrence: Occurrence,
}

/// Configuration for batch generation behavior - core version
/// This is separate from the CLI config to allow for type differences
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Materialize every overdue occurrence in one run instead of one per run
    pub enable_catchup: bool,
    /// Upper bound on occurrences created for one rule in one run
    pub max_catchup_per_rule: usize,
    /// Retries of a single rule's atomic step after a concurrent write
    pub max_conflict_retries: usize,
    /// Rules processed in parallel
    pub concurrency: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            enable_catchup: true,
            max_catchup_per_rule: 366,
            max_conflict_retries: 3,
            concurrency: 4,
        }
    }
}
