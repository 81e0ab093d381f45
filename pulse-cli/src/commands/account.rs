//! Account command handlers

use anyhow::{Result, bail};
use clap::Subcommand;
use colored::*;
use pulse_core::domain::account::{Account, Platform, normalize_handle};
use pulse_core::dto::account::CreateAccount;

use crate::config::Config;
use crate::id_resolver::{resolve_account_id, resolve_category_id};

/// Account subcommands
#[derive(Subcommand)]
pub enum AccountCommands {
    /// Start tracking an account
    Add {
        /// instagram, tiktok or twitter
        platform: Platform,
        /// Handle, with or without a leading @
        handle: String,
        /// Display name
        #[arg(short, long)]
        name: Option<String>,
        /// Category name, ID or prefix
        #[arg(short, long)]
        category: Option<String>,
    },
    /// List tracked accounts
    List {
        /// Only accounts in this category (name, ID or prefix)
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Show follower history and growth of an account
    History {
        /// Account ID or unambiguous prefix
        id: String,
    },
}

pub async fn handle_account_command(command: AccountCommands, config: &Config) -> Result<()> {
    let client = config.client();

    match command {
        AccountCommands::Add {
            platform,
            handle,
            name,
            category,
        } => {
            let category_id = match category {
                Some(c) => Some(resolve_category_id(&client, &c).await?),
                None => None,
            };
            let req = CreateAccount {
                handle: normalize_handle(&handle),
                platform,
                display_name: name,
                category_id,
            };

            match client.create_account(&req).await {
                Ok(account) => {
                    println!(
                        "{} Tracking {} ({})",
                        "✓".green(),
                        label(&account).bold(),
                        account.id.to_string().dimmed()
                    );
                    Ok(())
                }
                Err(e) if e.is_conflict() => {
                    bail!("{} @{} is already tracked", req.platform, req.handle)
                }
                Err(e) => Err(e.into()),
            }
        }
        AccountCommands::List { category } => {
            let category_id = match category {
                Some(c) => Some(resolve_category_id(&client, &c).await?),
                None => None,
            };
            let accounts = client.list_accounts(category_id).await?;

            if accounts.is_empty() {
                println!("{}", "No accounts found.".yellow());
                return Ok(());
            }

            println!("{}", format!("Found {} account(s):", accounts.len()).bold());
            for account in accounts {
                println!(
                    "  {} {:<40} {}",
                    "▸".cyan(),
                    label(&account),
                    account.id.to_string().dimmed()
                );
            }
            Ok(())
        }
        AccountCommands::History { id } => {
            let account_id = resolve_account_id(&client, &id).await?;
            let history = client.get_account_history(account_id).await?;

            println!("{}", label(&history.account).bold());
            if history.snapshots.is_empty() {
                println!("{}", "  No snapshots yet.".yellow());
                return Ok(());
            }

            for snapshot in &history.snapshots {
                println!(
                    "  {}  {:>12}",
                    snapshot
                        .captured_at
                        .format("%Y-%m-%d %H:%M")
                        .to_string()
                        .dimmed(),
                    snapshot.follower_count
                );
            }

            match history.growth_percent {
                Some(growth) if growth >= 0.0 => {
                    println!("  Growth: {}", format!("+{:.2}%", growth).green())
                }
                Some(growth) => println!("  Growth: {}", format!("{:.2}%", growth).red()),
                None => println!("  Growth: {}", "n/a".dimmed()),
            }
            Ok(())
        }
    }
}

/// `Instagram @nasa (NASA)`
fn label(account: &Account) -> String {
    match &account.display_name {
        Some(name) => format!("{} @{} ({})", account.platform, account.handle, name),
        None => format!("{} @{}", account.platform, account.handle),
    }
}
