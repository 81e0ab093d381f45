//! Jobs repository
//!
//! Handles communication with the server for job-related operations:
//! - Fetching pending jobs
//! - Claiming (starting) jobs
//! - Reading the accounts a job enrolled
//! - Reporting per-account outcomes
//! - Finishing or failing jobs

use anyhow::{Context, Result};
use async_trait::async_trait;
use pulse_client::PulseClient;
use pulse_core::domain::account::Account;
use pulse_core::domain::job::ScrapingJob;
use pulse_core::dto::job::{AccountOutcome, JobStatusView};
use std::sync::Arc;
use uuid::Uuid;

/// Repository trait for job-related operations with the server
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Fetches jobs waiting for a runner
    async fn fetch_pending_jobs(&self) -> Result<Vec<ScrapingJob>>;

    /// Claims a job for execution (PENDING -> RUNNING) on behalf of `runner_id`
    ///
    /// Fails with a 409 `ClientError` when another runner already claimed the
    /// job or its scope is busy.
    async fn start_job(&self, job_id: Uuid, runner_id: &str) -> Result<ScrapingJob>;

    /// Accounts fixed at job creation
    async fn fetch_enrolled_accounts(&self, job_id: Uuid) -> Result<Vec<Account>>;

    /// Reports the outcome of one enrolled account
    ///
    /// # Arguments
    /// * `job_id` - The running job
    /// * `account_id` - The enrolled account that was attempted
    /// * `outcome` - Follower count or failure message
    async fn record_outcome(
        &self,
        job_id: Uuid,
        account_id: Uuid,
        outcome: &AccountOutcome,
    ) -> Result<JobStatusView>;

    /// Finishes a job after every account was attempted
    async fn finish_job(&self, job_id: Uuid) -> Result<ScrapingJob>;

    /// Fails a job after a catastrophic error
    async fn fail_job(&self, job_id: Uuid, message: &str) -> Result<ScrapingJob>;
}

/// HTTP implementation of JobRepository
pub struct HttpJobRepository {
    client: Arc<PulseClient>,
}

impl HttpJobRepository {
    /// Creates a new HTTP job repository
    pub fn new(client: Arc<PulseClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl JobRepository for HttpJobRepository {
    async fn fetch_pending_jobs(&self) -> Result<Vec<ScrapingJob>> {
        self.client
            .list_pending_jobs()
            .await
            .context("Failed to fetch pending jobs")
    }

    async fn start_job(&self, job_id: Uuid, runner_id: &str) -> Result<ScrapingJob> {
        self.client
            .start_job(job_id, runner_id)
            .await
            .context("Failed to start job")
    }

    async fn fetch_enrolled_accounts(&self, job_id: Uuid) -> Result<Vec<Account>> {
        self.client
            .list_job_accounts(job_id)
            .await
            .context("Failed to fetch enrolled accounts")
    }

    async fn record_outcome(
        &self,
        job_id: Uuid,
        account_id: Uuid,
        outcome: &AccountOutcome,
    ) -> Result<JobStatusView> {
        self.client
            .record_account_outcome(job_id, account_id, outcome)
            .await
            .context("Failed to record account outcome")
    }

    async fn finish_job(&self, job_id: Uuid) -> Result<ScrapingJob> {
        self.client
            .finish_job(job_id)
            .await
            .context("Failed to finish job")
    }

    async fn fail_job(&self, job_id: Uuid, message: &str) -> Result<ScrapingJob> {
        self.client
            .fail_job(job_id, message)
            .await
            .context("Failed to fail job")
    }
}
