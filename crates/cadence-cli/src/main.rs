use cadence_core::db;
use cadence_core::error::CoreError;
use cadence_core::repository::SqliteRepository;
use clap::Parser;
use owo_colors::{OwoColorize, Style};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;
mod parser;
mod util;
mod views;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    let config = match config::Config::new() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} Invalid configuration: {}", "Error:".red().bold(), e);
            std::process::exit(2);
        }
    };
    init_tracing(&config, cli.verbose);
    debug!(database_path = %config.database_path, "configuration loaded");

    let db_pool = match db::establish_connection(&config.database_path).await {
        Ok(pool) => pool,
        Err(e) => {
            handle_error(e.into());
            std::process::exit(1);
        }
    };
    let repository = SqliteRepository::new(db_pool);

    let result = match cli.command {
        cli::Commands::Run(command) => {
            commands::run::run_generation(&repository, config.generation_config(), command).await
        }
        cli::Commands::Task(command) => {
            commands::task::task_command(&repository, command.command, &config).await
        }
        cli::Commands::Rule(command) => commands::rule::rule_command(&repository, command.command).await,
        cli::Commands::Stats(command) => commands::stats::show_stats(&repository, command).await,
    };

    if let Err(e) = result {
        handle_error(e);
        std::process::exit(1);
    }
}

/// Logs go to stderr so `run --json` output stays parseable.
fn init_tracing(config: &config::Config, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.log_level))
            .unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn handle_error(err: anyhow::Error) {
    let error_style = Style::new().red().bold();

    if let Some(core_error) = err.chain().find_map(|e| e.downcast_ref::<CoreError>()) {
        match core_error {
            CoreError::NotFound(s) => {
                eprintln!("{} {}", "Error:".style(error_style), s);
            }
            CoreError::AmbiguousId(candidates) => {
                eprintln!("{}", "Error: Ambiguous ID.".style(error_style));
                eprintln!("Did you mean one of these?");
                for (id, label) in candidates {
                    eprintln!("  {} ({})", id.yellow(), label);
                }
            }
            CoreError::InvalidInput(s) => {
                eprintln!("{} Invalid input: {}", "Error:".style(error_style), s);
            }
            CoreError::InvalidRuleConfiguration(s) => {
                eprintln!("{} Invalid recurrence rule: {}", "Error:".style(error_style), s.yellow());
            }
            CoreError::TemplateUnavailable(rule_id) => {
                eprintln!(
                    "{} Recurrence broken - template missing for rule {}",
                    "Error:".style(error_style),
                    rule_id.yellow()
                );
            }
            CoreError::PersistenceConflict(rule_id) => {
                eprintln!(
                    "{} Rule {} was changed by someone else; please retry.",
                    "Error:".style(error_style),
                    rule_id.yellow()
                );
            }
            CoreError::Database(e) => {
                eprintln!("{} Database error: {}", "Error:".style(error_style), e);
            }
            _ => eprintln!("{} {}", "Error:".style(error_style), err),
        }
    } else {
        eprintln!("{} {}", "Error:".style(error_style), err);
    }
}
