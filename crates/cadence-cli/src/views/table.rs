use cadence_core::models::{
    FrequencyCount, Occurrence, RecurrenceRule, RuleHealth, Task, TaskPriority, TaskStatus,
    UpcomingOccurrence,
};
use chrono::{Datelike, NaiveDate, Utc};
use chrono_humanize::Humanize;
use comfy_table::{Attribute, Cell, Color, Row, Table};

use crate::util::short_id;

#[derive(Debug, Clone)]
pub struct ViewRule {
    pub rule: RecurrenceRule,
    pub health: RuleHealth,
    pub template_title: Option<String>,
}

fn health_cell(health: RuleHealth) -> Cell {
    match health {
        RuleHealth::Active => Cell::new("active").fg(Color::Green),
        RuleHealth::Ended => Cell::new("ended").fg(Color::DarkGrey),
        RuleHealth::Broken => Cell::new("broken").fg(Color::Red).add_attribute(Attribute::Bold),
    }
}

fn due_cell(due: NaiveDate, status: TaskStatus) -> Cell {
    let today = Utc::now().date_naive();
    let text = format!("{} ({})", due, relative_day(due, today));
    let open = matches!(status, TaskStatus::Pending | TaskStatus::InProgress);
    if open && due < today {
        Cell::new(text).fg(Color::Red) // Overdue
    } else if open && due == today {
        Cell::new(text).fg(Color::Yellow) // Due today
    } else {
        Cell::new(text)
    }
}

fn relative_day(date: NaiveDate, today: NaiveDate) -> String {
    match date.signed_duration_since(today).num_days() {
        0 => "today".to_string(),
        days => chrono::Duration::days(days).humanize(),
    }
}

pub fn display_tasks(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("No tasks found.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Title", "Status", "Due Date", "Category"]);

    for task in tasks {
        let mut row = Row::new();
        row.add_cell(Cell::new(short_id(&task.id)));

        let mut title = String::new();
        if task.source_rule_id.is_some() {
            title.push('↻'); // Generated by a rule
            title.push(' ');
        }
        title.push_str(&task.title);

        let mut title_cell = Cell::new(title);
        title_cell = match task.status {
            TaskStatus::Completed | TaskStatus::Cancelled => title_cell
                .add_attribute(Attribute::CrossedOut)
                .fg(Color::DarkGrey),
            TaskStatus::Pending | TaskStatus::InProgress => match task.priority {
                TaskPriority::High => title_cell.fg(Color::Red).add_attribute(Attribute::Bold),
                TaskPriority::Medium => title_cell.fg(Color::Yellow),
                TaskPriority::Low => title_cell.fg(Color::Green),
                TaskPriority::None => title_cell,
            },
        };
        row.add_cell(title_cell);

        let status_cell = Cell::new(task.status.to_string());
        row.add_cell(match task.status {
            TaskStatus::Completed => status_cell.fg(Color::Green),
            TaskStatus::Cancelled => status_cell.fg(Color::DarkGrey),
            _ => status_cell,
        });

        row.add_cell(match task.due_date {
            Some(due) => due_cell(due, task.status),
            None => Cell::new("None"),
        });
        row.add_cell(Cell::new(task.category.as_deref().unwrap_or("None")));
        table.add_row(row);
    }

    println!("{table}");
}

pub fn display_rules(rules: &[ViewRule]) {
    if rules.is_empty() {
        println!("No recurrence rules found.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Template", "Schedule", "Last Generated", "Health"]);

    for view in rules {
        let mut row = Row::new();
        row.add_cell(Cell::new(short_id(&view.rule.id)));
        row.add_cell(match &view.template_title {
            Some(title) => Cell::new(title),
            None => Cell::new("(missing)").fg(Color::Red),
        });
        row.add_cell(Cell::new(view.rule.describe()));
        row.add_cell(Cell::new(view.rule.last_generated.to_string()));
        row.add_cell(health_cell(view.health));
        table.add_row(row);
    }

    println!("{table}");
}

pub fn display_occurrences(occurrences: &[Occurrence]) {
    let mut table = Table::new();
    table.set_header(vec!["#", "Due Date", "Day", "Scheduled"]);

    for (i, occurrence) in occurrences.iter().enumerate() {
        let mut row = Row::new();
        row.add_cell(Cell::new(i + 1));
        row.add_cell(Cell::new(occurrence.due.to_string()));
        row.add_cell(Cell::new(occurrence.due.weekday().to_string()));
        row.add_cell(if occurrence.is_shifted() {
            Cell::new(format!("{} (weekend shift)", occurrence.scheduled)).fg(Color::Yellow)
        } else {
            Cell::new(occurrence.scheduled.to_string())
        });
        table.add_row(row);
    }

    println!("{table}");
}

pub fn display_frequency_counts(counts: &[FrequencyCount]) {
    let mut table = Table::new();
    table.set_header(vec!["Frequency", "Active", "Ended"]);

    for count in counts {
        table.add_row(vec![
            Cell::new(count.frequency.to_string()),
            Cell::new(count.active),
            Cell::new(count.dormant).fg(Color::DarkGrey),
        ]);
    }

    println!("{table}");
}

pub fn display_agenda(agenda: &[UpcomingOccurrence]) {
    if agenda.is_empty() {
        println!("Nothing scheduled.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["Due Date", "Day", "Task", "Rule"]);

    for entry in agenda {
        table.add_row(vec![
            Cell::new(entry.occurrence.due.to_string()),
            Cell::new(entry.occurrence.weekday().to_string()),
            match &entry.template_title {
                Some(title) => Cell::new(title),
                None => Cell::new("(template missing)").fg(Color::Red),
            },
            Cell::new(short_id(&entry.rule_id)),
        ]);
    }

    println!("{table}");
}
