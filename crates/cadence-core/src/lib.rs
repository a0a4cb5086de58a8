//! # Cadence Core Library
//!
//! A recurring task engine: rules attached to template tasks produce concrete
//! task occurrences as their dates come due.
//!
//! ## Features
//!
//! - **Declarative Rules**: daily, weekly, monthly and yearly frequencies with
//!   intervals, weekday and day-of-month sets, end dates and a weekend policy
//! - **Per-Rule Cursors**: each rule remembers the last date it generated, so
//!   runs are idempotent and resume cleanly after interruption
//! - **Fault Isolation**: a broken rule is reported and skipped, never fatal to
//!   the batch
//! - **Optimistic Concurrency**: versioned rule rows, bounded retries
//!
//! ## Core Modules
//!
//! - [`db`]: Database connection and migration management
//! - [`models`]: Core data structures and transfer objects
//! - [`recurrence`]: Pure occurrence date calculation and weekend policy
//! - [`materializer`]: Template to occurrence copying
//! - [`generator`]: Batch processor over all active rules
//! - [`repository`]: Data access layer with Repository pattern
//! - [`notify`]: Post-commit notification hook
//! - [`error`]: Error types
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use cadence_core::{
//!     db,
//!     generator::RecurrenceGenerator,
//!     models::{Frequency, GenerationConfig, NewRuleData, NewTaskData},
//!     repository::{RuleRepository, SqliteRepository, TaskRepository},
//! };
//! use chrono::NaiveDate;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = db::establish_connection("tasks.db").await?;
//!     let repo = SqliteRepository::new(pool);
//!
//!     let template = repo
//!         .add_task(NewTaskData {
//!             title: "Water the plants".to_string(),
//!             due_date: NaiveDate::from_ymd_opt(2026, 2, 20),
//!             ..Default::default()
//!         })
//!         .await?;
//!     repo.create_rule(NewRuleData::new(template.id, Frequency::Weekly)).await?;
//!
//!     let generator = RecurrenceGenerator::new(repo, GenerationConfig::default());
//!     let today = chrono::Utc::now().date_naive();
//!     let report = generator.process_due_recurrences(today).await?;
//!     println!("generated {} tasks", report.generated);
//!
//!     Ok(())
//! }
//! ```

pub mod db;
pub mod error;
pub mod generator;
pub mod materializer;
pub mod models;
pub mod notify;
pub mod recurrence;
pub mod repository;
