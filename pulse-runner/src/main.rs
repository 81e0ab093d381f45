//! Pulse Runner
//!
//! A stateless worker that executes follower-scraping jobs.
//!
//! Architecture:
//! - Configuration: Load settings from environment or defaults
//! - Repositories: HTTP communication with the Pulse server (jobs)
//! - Services: Business logic (job running, follower scraping)
//! - Scheduler: Job polling and lifecycle management
//!
//! The runner polls the server for pending jobs, claims them, fetches the
//! follower count of every enrolled account and reports each outcome back.

mod config;
mod repository;
mod scheduler;
mod service;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::repository::{HttpJobRepository, JobRepository};
use crate::scheduler::JobPoller;
use crate::service::{HttpScraper, JobRunner, Scraper};
use pulse_client::PulseClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pulse_runner=info,pulse_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Pulse Runner");

    // Load configuration
    let config = load_config()?;
    info!(
        "Loaded configuration: runner_id={}, server_url={}, scraper_url={}",
        config.runner_id, config.server_url, config.scraper_url
    );

    // Initialize server client
    let client = Arc::new(PulseClient::new(config.server_url.clone()));
    wait_for_server(&client).await?;
    info!("Server reachable");

    // Initialize services
    let jobs: Arc<dyn JobRepository> = Arc::new(HttpJobRepository::new(Arc::clone(&client)));
    let scraper: Arc<dyn Scraper> = Arc::new(
        HttpScraper::new(
            &config.scraper_url,
            config.scraper_token.clone(),
            config.fetch_timeout,
        )
        .context("Failed to initialize scraper")?,
    );
    let runner = Arc::new(JobRunner::new(
        Arc::clone(&jobs),
        scraper,
        config.runner_id.clone(),
        config.max_concurrent_fetches,
    ));

    info!("Services initialized");

    // Create job poller
    let poller = JobPoller::new(config.clone(), jobs, runner);

    info!(
        "Poll interval: {:?}, fetch timeout: {:?}, concurrent fetches per job: {}",
        config.poll_interval, config.fetch_timeout, config.max_concurrent_fetches
    );

    // Start polling loop
    info!("Starting job polling loop");
    if let Err(e) = poller.run().await {
        error!("Poller error: {}", e);
        return Err(e);
    }

    Ok(())
}

/// Loads configuration from environment variables with fallback to defaults
fn load_config() -> Result<Config> {
    match Config::from_env() {
        Ok(config) => {
            config.validate()?;
            Ok(config)
        }
        Err(e) => {
            info!("Failed to load config from environment ({}), using defaults", e);
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }
}

/// Wait for the server with retry logic and exponential backoff
///
/// This handles the case where the server may not be ready yet when
/// the runner starts (common in container environments).
async fn wait_for_server(client: &PulseClient) -> Result<()> {
    const MAX_RETRIES: u32 = 10;
    const INITIAL_DELAY_MS: u64 = 500;
    const MAX_DELAY_MS: u64 = 30_000;

    let mut attempt = 0;
    let mut delay_ms = INITIAL_DELAY_MS;

    loop {
        attempt += 1;

        match client.list_pending_jobs().await {
            Ok(_) => {
                if attempt > 1 {
                    info!("Reached server after {} attempt(s)", attempt);
                }
                return Ok(());
            }
            Err(e) => {
                if attempt >= MAX_RETRIES {
                    error!("Server unreachable after {} attempts", MAX_RETRIES);
                    return Err(anyhow::anyhow!("Failed to reach Pulse server: {}", e));
                }

                warn!(
                    "Server not reachable (attempt {}/{}): {}",
                    attempt, MAX_RETRIES, e
                );
                warn!("Retrying in {} ms...", delay_ms);

                tokio::time::sleep(Duration::from_millis(delay_ms)).await;

                // Exponential backoff with cap
                delay_ms = (delay_ms * 2).min(MAX_DELAY_MS);
            }
        }
    }
}
