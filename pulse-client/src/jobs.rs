//! Job-related API endpoints

use crate::PulseClient;
use crate::error::Result;
use pulse_core::domain::account::Account;
use pulse_core::domain::job::ScrapingJob;
use pulse_core::dto::job::{
    AccountOutcome, FailJob, JobCreated, JobStatusView, StartJob, TriggerJob,
};
use uuid::Uuid;

impl PulseClient {
    // =============================================================================
    // Job Lifecycle
    // =============================================================================

    /// Trigger a scraping job
    ///
    /// # Arguments
    /// * `category_id` - Restrict the job to one category; `None` enrolls every account
    ///
    /// # Returns
    /// The ID of the created job. A 409 `ApiError` means the scope already
    /// has an active job.
    pub async fn trigger_job(&self, category_id: Option<Uuid>) -> Result<JobCreated> {
        let response = self
            .client
            .post(self.url("/jobs"))
            .json(&TriggerJob { category_id })
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get the status and progress counters of a job
    pub async fn get_job_status(&self, job_id: Uuid) -> Result<JobStatusView> {
        let response = self
            .client
            .get(self.url(&format!("/jobs/{}/status", job_id)))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get a job by ID, including recorded errors
    pub async fn get_job(&self, job_id: Uuid) -> Result<ScrapingJob> {
        let response = self
            .client
            .get(self.url(&format!("/jobs/{}", job_id)))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// List jobs, newest first
    pub async fn list_jobs(&self) -> Result<Vec<ScrapingJob>> {
        let response = self.client.get(self.url("/jobs")).send().await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Job Execution (Runner-specific)
    // =============================================================================

    /// List jobs waiting for a runner
    pub async fn list_pending_jobs(&self) -> Result<Vec<ScrapingJob>> {
        let response = self.client.get(self.url("/jobs/pending")).send().await?;

        self.handle_response(response).await
    }

    /// Claim a pending job (PENDING -> RUNNING)
    ///
    /// # Arguments
    /// * `job_id` - The job to claim
    /// * `runner_id` - The runner claiming it, recorded on the job
    pub async fn start_job(&self, job_id: Uuid, runner_id: &str) -> Result<ScrapingJob> {
        let response = self
            .client
            .post(self.url(&format!("/jobs/{}/start", job_id)))
            .json(&StartJob {
                runner_id: runner_id.to_string(),
            })
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// List the accounts enrolled in a job
    pub async fn list_job_accounts(&self, job_id: Uuid) -> Result<Vec<Account>> {
        let response = self
            .client
            .get(self.url(&format!("/jobs/{}/accounts", job_id)))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Record the outcome of one enrolled account
    ///
    /// # Returns
    /// The job status after the account was counted
    pub async fn record_account_outcome(
        &self,
        job_id: Uuid,
        account_id: Uuid,
        outcome: &AccountOutcome,
    ) -> Result<JobStatusView> {
        let response = self
            .client
            .post(self.url(&format!("/jobs/{}/accounts/{}", job_id, account_id)))
            .json(outcome)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Finish a running job after every account was attempted
    pub async fn finish_job(&self, job_id: Uuid) -> Result<ScrapingJob> {
        let response = self
            .client
            .post(self.url(&format!("/jobs/{}/finish", job_id)))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Fail a running job after a catastrophic error
    pub async fn fail_job(&self, job_id: Uuid, message: impl Into<String>) -> Result<ScrapingJob> {
        let response = self
            .client
            .post(self.url(&format!("/jobs/{}/fail", job_id)))
            .json(&FailJob {
                message: message.into(),
            })
            .send()
            .await?;

        self.handle_response(response).await
    }
}
