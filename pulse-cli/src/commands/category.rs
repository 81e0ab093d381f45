//! Category command handlers

use anyhow::{Result, bail};
use clap::Subcommand;
use colored::*;

use crate::config::Config;

/// Category subcommands
#[derive(Subcommand)]
pub enum CategoryCommands {
    /// Create a category
    Add {
        /// Category name
        name: String,
    },
    /// List categories
    List,
}

pub async fn handle_category_command(command: CategoryCommands, config: &Config) -> Result<()> {
    let client = config.client();

    match command {
        CategoryCommands::Add { name } => match client.create_category(name.trim()).await {
            Ok(category) => {
                println!(
                    "{} Category {} created ({})",
                    "✓".green(),
                    category.name.bold(),
                    category.id.to_string().dimmed()
                );
                Ok(())
            }
            Err(e) if e.is_conflict() => bail!("Category '{}' already exists", name.trim()),
            Err(e) => Err(e.into()),
        },
        CategoryCommands::List => {
            let categories = client.list_categories().await?;
            if categories.is_empty() {
                println!("{}", "No categories found.".yellow());
            }
            for category in categories {
                println!(
                    "  {} {:<30} {}",
                    "▸".cyan(),
                    category.name,
                    category.id.to_string().dimmed()
                );
            }
            Ok(())
        }
    }
}
