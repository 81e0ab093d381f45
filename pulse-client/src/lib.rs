//! Pulse HTTP Client
//!
//! A simple, type-safe HTTP client for communicating with the Pulse server API,
//! plus the [`ProgressPoller`] that watches a scraping job until it finishes.
//!
//! This crate provides a unified interface for the CLI and the runner to interact
//! with the server.
//!
//! # Example
//!
//! ```no_run
//! use pulse_client::PulseClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = PulseClient::new("http://localhost:8080");
//!
//!     // Trigger a job over every tracked account
//!     let created = client.trigger_job(None).await?;
//!     let status = client.get_job_status(created.job_id).await?;
//!
//!     println!("Job {} is {} ({}%)", created.job_id, status.status, status.progress);
//!     Ok(())
//! }
//! ```

mod accounts;
pub mod error;
mod jobs;
pub mod poller;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use poller::{PollOutcome, PollerState, ProgressPoller, StatusSource};

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the Pulse server API
///
/// This client provides methods for all server API endpoints, organized
/// into logical groups:
/// - Job lifecycle (trigger, status, history)
/// - Runner-facing job endpoints (pending, start, account outcomes, finish)
/// - Accounts, categories and reports
#[derive(Debug, Clone)]
pub struct PulseClient {
    /// Base URL of the server (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl PulseClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the server API (e.g., "http://localhost:8080")
    ///
    /// # Example
    /// ```
    /// use pulse_client::PulseClient;
    ///
    /// let client = PulseClient::new("http://localhost:8080");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    ///
    /// # Example
    /// ```
    /// use pulse_client::PulseClient;
    /// use reqwest::Client;
    /// use std::time::Duration;
    ///
    /// let http_client = Client::builder()
    ///     .timeout(Duration::from_secs(10))
    ///     .build()
    ///     .unwrap();
    ///
    /// let client = PulseClient::with_client("http://localhost:8080", http_client);
    /// ```
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the server
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    ///
    /// This method checks the status code and returns an appropriate error if
    /// the request failed, or deserializes the response body if successful.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(
                status.as_u16(),
                error::extract_message(&error_text),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}
