//! Platform report

use anyhow::Result;
use colored::*;

use crate::config::Config;

/// Print account count and total followers per platform
pub async fn show_platform_report(config: &Config) -> Result<()> {
    let summaries = config.client().platform_report().await?;

    if summaries.is_empty() {
        println!("{}", "No follower data yet. Trigger a job first.".yellow());
        return Ok(());
    }

    println!(
        "{}",
        format!("{:<12} {:>10} {:>16}", "Platform", "Accounts", "Followers").bold()
    );
    for summary in &summaries {
        println!(
            "{:<12} {:>10} {:>16}",
            summary.platform.to_string(),
            summary.account_count,
            summary.total_followers
        );
    }

    let total: u64 = summaries.iter().map(|s| s.total_followers).sum();
    println!("{}", format!("{:<12} {:>10} {:>16}", "Total", "", total).dimmed());

    Ok(())
}
