use cadence_core::models::GenerationConfig;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const CONFIG_FILE: &str = "cadence.toml";

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// SQLite file, or `sqlite::memory:`
    pub database_path: String,
    /// Fallback filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Owner assigned to new tasks when `--owner` is not given
    pub owner_id: Option<Uuid>,
    pub generation: GenerationSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "cadence.db".to_string(),
            log_level: "warn".to_string(),
            owner_id: None,
            generation: GenerationSettings::default(),
        }
    }
}

/// Batch generation settings as they appear in `cadence.toml`
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GenerationSettings {
    /// Whether to materialize every missed occurrence in one run
    pub enable_catchup: bool,
    /// Occurrences per rule per run when catching up
    pub max_catchup_per_rule: usize,
    pub max_conflict_retries: usize,
    /// Rules processed in parallel
    pub concurrency: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        let core = GenerationConfig::default();
        Self {
            enable_catchup: core.enable_catchup,
            max_catchup_per_rule: core.max_catchup_per_rule,
            max_conflict_retries: core.max_conflict_retries,
            concurrency: core.concurrency,
        }
    }
}

impl From<&GenerationSettings> for GenerationConfig {
    fn from(settings: &GenerationSettings) -> Self {
        Self {
            enable_catchup: settings.enable_catchup,
            max_catchup_per_rule: settings.max_catchup_per_rule.max(1),
            max_conflict_retries: settings.max_conflict_retries,
            concurrency: settings.concurrency.max(1),
        }
    }
}

impl Config {
    /// Defaults, then `cadence.toml`, then `CADENCE_*` variables
    /// (`CADENCE_GENERATION__CONCURRENCY=8` for nested keys).
    pub fn new() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed("CADENCE_").split("__"))
    }

    pub fn generation_config(&self) -> GenerationConfig {
        GenerationConfig::from(&self.generation)
    }

    pub fn owner(&self) -> Uuid {
        self.owner_id.unwrap_or_else(Uuid::nil)
    }
}
