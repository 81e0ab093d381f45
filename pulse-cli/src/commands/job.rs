//! Job command handlers
//!
//! Handles all job-related CLI commands including triggering,
//! watching progress, listing and viewing details.

use anyhow::{Result, bail};
use clap::Subcommand;
use colored::*;
use pulse_client::{PollOutcome, PulseClient, ProgressPoller};
use pulse_core::domain::job::{JobStatus, ScrapingJob};
use pulse_core::dto::job::JobStatusView;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::Config;
use crate::id_resolver::{resolve_category_id, resolve_job_id};

/// Job subcommands
#[derive(Subcommand)]
pub enum JobCommands {
    /// Trigger a scraping job
    Trigger {
        /// Only scrape accounts in this category (name, ID or prefix)
        #[arg(short, long)]
        category: Option<String>,

        /// Watch the job until it finishes
        #[arg(short, long)]
        watch: bool,
    },
    /// Show job progress once
    Status {
        /// Job ID or unambiguous prefix
        id: String,
    },
    /// Follow job progress until it finishes
    Watch {
        /// Job ID or unambiguous prefix
        id: String,

        /// Seconds between status checks
        #[arg(short, long, default_value_t = 3)]
        interval: u64,
    },
    /// List recent jobs
    List,
    /// Get job details, including per-account errors
    Get {
        /// Job ID or unambiguous prefix
        id: String,
    },
}

/// Handle job commands
///
/// Routes job subcommands to their respective handlers.
///
/// # Arguments
/// * `command` - The job command to execute
/// * `config` - The CLI configuration
pub async fn handle_job_command(command: JobCommands, config: &Config) -> Result<()> {
    let client = Arc::new(config.client());

    match command {
        JobCommands::Trigger { category, watch } => {
            let job_id = trigger_job(&client, category.as_deref()).await?;
            if watch {
                println!();
                watch_job(client, job_id, Duration::from_secs(3)).await?;
            }
            Ok(())
        }
        JobCommands::Status { id } => show_status(&client, &id).await,
        JobCommands::Watch { id, interval } => {
            if interval == 0 {
                bail!("--interval must be at least 1 second");
            }
            let job_id = resolve_job_id(&client, &id).await?;
            watch_job(client, job_id, Duration::from_secs(interval)).await
        }
        JobCommands::List => list_jobs(&client).await,
        JobCommands::Get { id } => get_job(&client, &id).await,
    }
}

/// Trigger a job and print its ID
async fn trigger_job(client: &PulseClient, category: Option<&str>) -> Result<Uuid> {
    let category_id = match category {
        Some(category) => Some(resolve_category_id(client, category).await?),
        None => None,
    };

    match client.trigger_job(category_id).await {
        Ok(created) => {
            println!(
                "{} Job {} triggered",
                "✓".green(),
                created.job_id.to_string().cyan()
            );
            Ok(created.job_id)
        }
        Err(e) if e.is_conflict() => {
            bail!("A scraping job is already running for this scope; wait for it to finish")
        }
        Err(e) => Err(e.into()),
    }
}

/// Print the current progress of a job
async fn show_status(client: &PulseClient, id: &str) -> Result<()> {
    let job_id = resolve_job_id(client, id).await?;
    let status = client.get_job_status(job_id).await?;

    println!("Job {}", job_id.to_string().cyan());
    println!("  Status:   {}", colorize_status(&status.status));
    println!("  Progress: {}", render_progress(&status));

    Ok(())
}

/// Follow a job with the progress poller until it reaches a terminal state
///
/// Ctrl-C stops watching without affecting the job.
async fn watch_job(client: Arc<PulseClient>, job_id: Uuid, interval: Duration) -> Result<()> {
    let mut poller = ProgressPoller::with_interval(Arc::clone(&client), interval);
    let mut done = poller.watch(job_id);
    let mut progress = poller.subscribe();

    println!("Watching job {} ...", job_id.to_string().cyan());

    let outcome = loop {
        tokio::select! {
            outcome = &mut done => break outcome?,
            changed = progress.changed() => {
                if changed.is_err() {
                    continue;
                }
                if let Some(status) = progress.borrow_and_update().clone() {
                    if !status.status.is_terminal() {
                        println!("  {}", render_progress(&status));
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                poller.stop();
                println!("{}", "Stopped watching; the job keeps running.".yellow());
                return Ok(());
            }
        }
    };

    match outcome {
        PollOutcome::Completed { status, .. } => {
            println!("  {}", render_progress(&status));
            println!("{} Job completed", "✓".green());
            Ok(())
        }
        PollOutcome::Failed { status, .. } => {
            println!("  {}", render_progress(&status));
            let job = client.get_job(job_id).await?;
            print_errors(&job);
            bail!("Job {} failed", job_id)
        }
        PollOutcome::NotFound { .. } => bail!("Job {} not found", job_id),
    }
}

/// List recent jobs
async fn list_jobs(client: &PulseClient) -> Result<()> {
    let jobs = client.list_jobs().await?;

    if jobs.is_empty() {
        println!("{}", "No jobs found.".yellow());
    } else {
        println!("{}", format!("Found {} job(s):", jobs.len()).bold());
        println!();
        for job in jobs {
            print_job_summary(&job);
        }
    }

    Ok(())
}

/// Get and display a single job
async fn get_job(client: &PulseClient, id: &str) -> Result<()> {
    let job_id = resolve_job_id(client, id).await?;
    let job = client.get_job(job_id).await?;

    print_job_details(&job);

    Ok(())
}

/// `[#########-----------] 45% (9/20)`
fn render_progress(status: &JobStatusView) -> String {
    const WIDTH: usize = 20;
    let filled = (usize::from(status.progress) * WIDTH / 100).min(WIDTH);
    format!(
        "[{}{}] {:>3}% ({}/{})",
        "#".repeat(filled),
        "-".repeat(WIDTH - filled),
        status.progress,
        status.completed_count,
        status.total_accounts
    )
}

/// Print a job summary from a full ScrapingJob
fn print_job_summary(job: &ScrapingJob) {
    println!("  {} Job {}", "▸".cyan(), job.id.to_string().dimmed());
    println!("    Scope:    {}", job.scope().key().dimmed());
    println!("    Status:   {}", colorize_status(&job.status));
    println!(
        "    Progress: {}/{} ({} error(s))",
        job.completed_count,
        job.total_accounts,
        job.errors.len()
    );
    println!(
        "    Created:  {}",
        job.created_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
    println!();
}

/// Print detailed job information
fn print_job_details(job: &ScrapingJob) {
    println!("{}", "Job Details:".bold());
    println!("  ID:        {}", job.id.to_string().cyan());
    println!("  Scope:     {}", job.scope().key());
    println!("  Status:    {}", colorize_status(&job.status));
    println!(
        "  Progress:  {}",
        render_progress(&JobStatusView::from(job))
    );
    println!("  Created:   {}", job.created_at.format("%Y-%m-%d %H:%M:%S"));

    if let Some(runner) = &job.runner_id {
        println!("  Runner:    {}", runner);
    }

    if let Some(started) = job.started_at {
        println!("  Started:   {}", started.format("%Y-%m-%d %H:%M:%S"));
    }

    if let Some(finished) = job.finished_at {
        println!("  Finished:  {}", finished.format("%Y-%m-%d %H:%M:%S"));

        if let Some(started) = job.started_at {
            let duration = finished.signed_duration_since(started);
            println!("  Duration:  {}s", duration.num_seconds());
        }
    }

    print_errors(job);
}

fn print_errors(job: &ScrapingJob) {
    if job.errors.is_empty() {
        return;
    }

    println!("\n{}", format!("Errors ({}):", job.errors.len()).bold());
    for error in &job.errors {
        let who = match error.platform {
            Some(platform) => format!("{} @{}", platform, error.handle),
            None => "job".to_string(),
        };
        println!(
            "  {} {} {}",
            error.occurred_at.format("%H:%M:%S").to_string().dimmed(),
            who.yellow(),
            error.message.red()
        );
    }
}

/// Colorize job status for display
fn colorize_status(status: &JobStatus) -> colored::ColoredString {
    let status_str = status.as_str();
    match status {
        JobStatus::Pending => status_str.yellow(),
        JobStatus::Running => status_str.cyan(),
        JobStatus::Completed => status_str.green(),
        JobStatus::Failed => status_str.red(),
    }
}
