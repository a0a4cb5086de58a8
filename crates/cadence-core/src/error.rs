use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Ambiguous short ID. Did you mean one of these?")]
    AmbiguousId(Vec<(String, String)>), // Vec of (ID, Title)

    #[error("Invalid recurrence rule: {0}")]
    InvalidRuleConfiguration(String),

    #[error("Template task for recurrence rule {0} is unavailable")]
    TemplateUnavailable(Uuid),

    #[error("Recurrence rule {0} was modified concurrently")]
    PersistenceConflict(Uuid),
}
