//! Runner configuration
//!
//! Defines all configurable parameters for the runner including
//! polling intervals, fetch concurrency, and server and scraper connection settings.

use std::time::Duration;

/// Runner configuration
///
/// All timeouts and intervals are configurable to allow tuning
/// for different deployment scenarios (dev vs prod, fast vs slow networks).
#[derive(Debug, Clone)]
pub struct Config {
    /// Unique identifier for this runner instance
    pub runner_id: String,

    /// Pulse server base URL (e.g., "http://localhost:8080")
    pub server_url: String,

    /// Follower-count source base URL (e.g., "http://localhost:9090")
    pub scraper_url: String,

    /// Bearer token sent to the scraper, if it requires one
    pub scraper_token: Option<String>,

    /// How often to poll the server for pending jobs
    pub poll_interval: Duration,

    /// Max parallel jobs the runner can handle
    pub max_parallel_jobs: usize,

    /// Max follower fetches in flight within one job
    pub max_concurrent_fetches: usize,

    /// Maximum time a single follower fetch may take
    pub fetch_timeout: Duration,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(runner_id: String, server_url: String, scraper_url: String) -> Self {
        Self {
            runner_id,
            server_url,
            scraper_url,
            scraper_token: None,
            poll_interval: Duration::from_secs(5),
            max_parallel_jobs: 2,
            max_concurrent_fetches: 4,
            fetch_timeout: Duration::from_secs(30),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - RUNNER_ID (required)
    /// - PULSE_SERVER_URL (required)
    /// - SCRAPER_URL (required)
    /// - SCRAPER_TOKEN (optional)
    /// - POLL_INTERVAL (optional, seconds, default: 5)
    /// - MAX_PARALLEL_JOBS (optional, default: 2)
    /// - MAX_CONCURRENT_FETCHES (optional, default: 4)
    /// - FETCH_TIMEOUT (optional, seconds, default: 30)
    pub fn from_env() -> anyhow::Result<Self> {
        let runner_id = std::env::var("RUNNER_ID")
            .map_err(|_| anyhow::anyhow!("RUNNER_ID environment variable not set"))?;

        let server_url = std::env::var("PULSE_SERVER_URL")
            .map_err(|_| anyhow::anyhow!("PULSE_SERVER_URL environment variable not set"))?;

        let scraper_url = std::env::var("SCRAPER_URL")
            .map_err(|_| anyhow::anyhow!("SCRAPER_URL environment variable not set"))?;

        let scraper_token = std::env::var("SCRAPER_TOKEN")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let poll_interval = std::env::var("POLL_INTERVAL")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(5));

        let max_parallel_jobs = std::env::var("MAX_PARALLEL_JOBS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(2);

        let max_concurrent_fetches = std::env::var("MAX_CONCURRENT_FETCHES")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(4);

        let fetch_timeout = std::env::var("FETCH_TIMEOUT")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));

        Ok(Self {
            runner_id,
            server_url,
            scraper_url,
            scraper_token,
            poll_interval,
            max_parallel_jobs,
            max_concurrent_fetches,
            fetch_timeout,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.runner_id.is_empty() {
            anyhow::bail!("runner_id cannot be empty");
        }

        for (name, url) in [
            ("server_url", &self.server_url),
            ("scraper_url", &self.scraper_url),
        ] {
            if url.is_empty() {
                anyhow::bail!("{} cannot be empty", name);
            }
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("{} must start with http:// or https://", name);
            }
        }

        if self.poll_interval.as_secs() == 0 {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.max_parallel_jobs == 0 {
            anyhow::bail!("max_parallel_jobs must be greater than 0");
        }

        if self.max_concurrent_fetches == 0 {
            anyhow::bail!("max_concurrent_fetches must be greater than 0");
        }

        if self.fetch_timeout.is_zero() {
            anyhow::bail!("fetch_timeout must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(
            uuid::Uuid::new_v4().to_string(),
            "http://localhost:8080".to_string(),
            "http://localhost:9090".to_string(),
        )
    }
}
