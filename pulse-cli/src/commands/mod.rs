//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod account;
mod category;
mod job;
mod report;

pub use account::AccountCommands;
pub use category::CategoryCommands;
pub use job::JobCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Scraping job management
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },
    /// Tracked account management
    Account {
        #[command(subcommand)]
        command: AccountCommands,
    },
    /// Category management
    Category {
        #[command(subcommand)]
        command: CategoryCommands,
    },
    /// Follower totals per platform
    Report,
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The CLI configuration
///
/// # Returns
/// Result indicating success or failure
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Job { command } => job::handle_job_command(command, config).await,
        Commands::Account { command } => account::handle_account_command(command, config).await,
        Commands::Category { command } => {
            category::handle_category_command(command, config).await
        }
        Commands::Report => report::show_platform_report(config).await,
    }
}
