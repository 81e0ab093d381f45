//! Job Service
//!
//! Business logic for the scraping job lifecycle: trigger, start, per-account
//! progress, finish and catastrophic failure.

use pulse_core::domain::account::Account;
use pulse_core::domain::job::{JobScope, JobStatus, ScrapingJob};
use pulse_core::dto::job::{AccountOutcome, JobStatusView, TriggerJob};
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

use crate::repository::{account_repository, job_repository};

/// Maximum number of jobs returned by the history listing
pub const HISTORY_LIMIT: i64 = 200;

/// Service error type
#[derive(Debug)]
pub enum JobError {
    NotFound(Uuid),
    CategoryNotFound(Uuid),
    AccountNotEnrolled { job_id: Uuid, account_id: Uuid },
    /// Scope already held by an active job, or the job lost a race for it
    Conflict(String),
    InvalidState(String),
    ValidationError(String),
    DatabaseError(sqlx::Error),
}

impl From<sqlx::Error> for JobError {
    fn from(err: sqlx::Error) -> Self {
        JobError::DatabaseError(err)
    }
}

/// Create a job over every account in the requested scope
///
/// A scope without accounts produces a job that is started and finished in
/// the same step, so it is stored as COMPLETED with 0% progress.
pub async fn trigger_job(pool: &PgPool, req: TriggerJob) -> Result<ScrapingJob, JobError> {
    if let Some(category_id) = req.category_id {
        account_repository::find_category(pool, category_id)
            .await?
            .ok_or(JobError::CategoryNotFound(category_id))?;
    }

    let scope = JobScope::from_category(req.category_id);
    let account_ids = account_repository::ids_in_scope(pool, scope).await?;
    let total = u32::try_from(account_ids.len())
        .map_err(|_| JobError::ValidationError("Too many accounts in scope".to_string()))?;

    let mut job = ScrapingJob::new(scope, total);
    if total == 0 {
        job.start()
            .and_then(|_| job.finish())
            .map_err(|e| JobError::InvalidState(e.to_string()))?;
    }

    if !job_repository::create(pool, &job, &account_ids).await? {
        tracing::info!("Rejected trigger: scope {} already has an active job", scope.key());
        return Err(JobError::Conflict(format!(
            "A scraping job is already active for scope {}",
            scope.key()
        )));
    }

    tracing::info!(
        "Job created: {} (scope {}, {} account(s), status {})",
        job.id,
        scope.key(),
        total,
        job.status
    );

    Ok(job)
}

/// Get a job by ID
pub async fn get_job(pool: &PgPool, id: Uuid) -> Result<ScrapingJob, JobError> {
    let job = job_repository::find_by_id(pool, id)
        .await?
        .ok_or(JobError::NotFound(id))?;

    Ok(job)
}

/// Current status of a job for polling clients
pub async fn get_status(pool: &PgPool, id: Uuid) -> Result<JobStatusView, JobError> {
    let status = job_repository::find_status(pool, id)
        .await?
        .ok_or(JobError::NotFound(id))?;

    Ok(status)
}

/// List jobs, newest first
pub async fn list_jobs(pool: &PgPool) -> Result<Vec<ScrapingJob>, JobError> {
    let jobs = job_repository::list_all(pool, HISTORY_LIMIT).await?;
    Ok(jobs)
}

/// List jobs by status
pub async fn list_jobs_by_status(
    pool: &PgPool,
    status: JobStatus,
) -> Result<Vec<ScrapingJob>, JobError> {
    let jobs = job_repository::find_by_status(pool, status).await?;
    Ok(jobs)
}

/// Accounts enrolled in a job
pub async fn list_enrolled_accounts(pool: &PgPool, id: Uuid) -> Result<Vec<Account>, JobError> {
    // Verify job exists
    let _job = job_repository::find_by_id(pool, id)
        .await?
        .ok_or(JobError::NotFound(id))?;

    let accounts = account_repository::find_enrolled(pool, id).await?;
    Ok(accounts)
}

/// Claim a PENDING job for execution by `runner_id`
pub async fn start_job(
    pool: &PgPool,
    id: Uuid,
    runner_id: &str,
) -> Result<ScrapingJob, JobError> {
    validate_runner_id(runner_id)?;

    if !job_repository::mark_running(pool, id, runner_id).await? {
        let job = job_repository::find_by_id(pool, id)
            .await?
            .ok_or(JobError::NotFound(id))?;

        return Err(match job.status {
            JobStatus::Pending => JobError::Conflict(format!(
                "Another job is already running for scope {}",
                job.scope().key()
            )),
            status => JobError::Conflict(format!(
                "Job {} is not in PENDING state (current: {})",
                id, status
            )),
        });
    }

    tracing::info!("Job {} started by runner {}", id, runner_id);

    get_job(pool, id).await
}

/// Record the outcome of one enrolled account
pub async fn record_account_outcome(
    pool: &PgPool,
    job_id: Uuid,
    account_id: Uuid,
    outcome: AccountOutcome,
) -> Result<JobStatusView, JobError> {
    let status = get_status(pool, job_id).await?;
    ensure_running(job_id, status.status)?;

    let (account, attempted) = account_repository::find_enrollment(pool, job_id, account_id)
        .await?
        .ok_or(JobError::AccountNotEnrolled { job_id, account_id })?;

    if attempted {
        return Err(JobError::Conflict(format!(
            "Account {} was already attempted by job {}",
            account_id, job_id
        )));
    }

    if !job_repository::record_outcome(pool, job_id, &account, &outcome).await? {
        return Err(JobError::Conflict(format!(
            "Outcome for account {} was not recorded; job {} changed concurrently",
            account_id, job_id
        )));
    }

    match &outcome {
        AccountOutcome::Scraped { follower_count } => tracing::debug!(
            "Job {}: {} @{} has {} followers",
            job_id,
            account.platform,
            account.handle,
            follower_count
        ),
        AccountOutcome::Failed { message } => tracing::warn!(
            "Job {}: {} @{} failed: {}",
            job_id,
            account.platform,
            account.handle,
            message
        ),
    }

    get_status(pool, job_id).await
}

/// Finish a RUNNING job once all accounts have been attempted
pub async fn finish_job(pool: &PgPool, id: Uuid) -> Result<ScrapingJob, JobError> {
    match job_repository::finish(pool, id).await? {
        Some(status) => tracing::info!("Job {} finished with status: {}", id, status),
        None => {
            let job = get_job(pool, id).await?;
            ensure_running(id, job.status)?;
        }
    }

    get_job(pool, id).await
}

/// Move a RUNNING job straight to FAILED after a catastrophic error
pub async fn fail_job(pool: &PgPool, id: Uuid, message: String) -> Result<ScrapingJob, JobError> {
    validate_failure_message(&message)?;

    if !job_repository::mark_failed(pool, id, &message).await? {
        let job = get_job(pool, id).await?;
        ensure_running(id, job.status)?;
    }

    tracing::warn!("Job {} failed: {}", id, message);

    get_job(pool, id).await
}

/// Fail RUNNING jobs whose runner stopped reporting for `max_idle`
///
/// This should be called periodically; a job stuck in RUNNING holds its
/// scope and no new job can be triggered for it.
pub async fn fail_stale_jobs(pool: &PgPool, max_idle: Duration) -> Result<usize, JobError> {
    let max_idle = chrono::Duration::from_std(max_idle)
        .map_err(|_| JobError::ValidationError("Stale job timeout is too large".to_string()))?;

    let ids = job_repository::fail_stale(pool, max_idle).await?;
    for id in &ids {
        tracing::warn!(
            "Job {} failed: no progress for {} s",
            id,
            max_idle.num_seconds()
        );
    }

    Ok(ids.len())
}

// =============================================================================
// Validation
// =============================================================================

fn ensure_running(id: Uuid, status: JobStatus) -> Result<(), JobError> {
    if status == JobStatus::Running {
        Ok(())
    } else {
        Err(JobError::InvalidState(format!(
            "Job {} is not in RUNNING state (current: {})",
            id, status
        )))
    }
}

fn validate_runner_id(runner_id: &str) -> Result<(), JobError> {
    if runner_id.trim().is_empty() {
        return Err(JobError::ValidationError(
            "Runner ID cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_failure_message(message: &str) -> Result<(), JobError> {
    if message.trim().is_empty() {
        return Err(JobError::ValidationError(
            "Failure message cannot be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_db;

    #[test]
    fn test_ensure_running() {
        let id = Uuid::new_v4();
        assert!(ensure_running(id, JobStatus::Running).is_ok());
        assert!(matches!(
            ensure_running(id, JobStatus::Pending),
            Err(JobError::InvalidState(_))
        ));
        assert!(matches!(
            ensure_running(id, JobStatus::Completed),
            Err(JobError::InvalidState(_))
        ));
    }

    #[test]
    fn test_validate_runner_id() {
        assert!(validate_runner_id("runner-1").is_ok());
        assert!(matches!(
            validate_runner_id(" "),
            Err(JobError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_failure_message() {
        assert!(validate_failure_message("scraper unreachable").is_ok());
        assert!(validate_failure_message("   ").is_err());
    }

    #[tokio::test]
    async fn test_trigger_while_running_conflicts() {
        let Some(pool) = test_db::pool().await else {
            return;
        };
        let category = test_db::category(&pool).await;
        test_db::account_in(&pool, &category).await;
        let req = TriggerJob {
            category_id: Some(category.id),
        };

        let first = trigger_job(&pool, req.clone()).await.unwrap();
        start_job(&pool, first.id, "runner-1").await.unwrap();

        assert!(matches!(
            trigger_job(&pool, req).await,
            Err(JobError::Conflict(_))
        ));
        let scope_jobs: Vec<_> = list_jobs(&pool)
            .await
            .unwrap()
            .into_iter()
            .filter(|job| job.category_id == Some(category.id))
            .collect();
        assert_eq!(scope_jobs.len(), 1);
    }

    #[tokio::test]
    async fn test_status_of_unknown_job_is_not_found() {
        let Some(pool) = test_db::pool().await else {
            return;
        };
        let id = Uuid::new_v4();

        assert!(matches!(
            get_status(&pool, id).await,
            Err(JobError::NotFound(missing)) if missing == id
        ));
    }

    #[tokio::test]
    async fn test_second_outcome_for_account_conflicts() {
        let Some(pool) = test_db::pool().await else {
            return;
        };
        let category = test_db::category(&pool).await;
        let account = test_db::account_in(&pool, &category).await;
        test_db::account_in(&pool, &category).await;

        let job = trigger_job(
            &pool,
            TriggerJob {
                category_id: Some(category.id),
            },
        )
        .await
        .unwrap();
        start_job(&pool, job.id, "runner-1").await.unwrap();

        let outcome = AccountOutcome::Scraped { follower_count: 7 };
        let status = record_account_outcome(&pool, job.id, account.id, outcome.clone())
            .await
            .unwrap();
        assert_eq!(status.completed_count, 1);

        assert!(matches!(
            record_account_outcome(&pool, job.id, account.id, outcome).await,
            Err(JobError::Conflict(_))
        ));
        assert_eq!(get_status(&pool, job.id).await.unwrap().completed_count, 1);
    }

    #[tokio::test]
    async fn test_empty_claimant_is_rejected() {
        let Some(pool) = test_db::pool().await else {
            return;
        };
        let category = test_db::category(&pool).await;
        test_db::account_in(&pool, &category).await;
        let job = trigger_job(
            &pool,
            TriggerJob {
                category_id: Some(category.id),
            },
        )
        .await
        .unwrap();

        assert!(matches!(
            start_job(&pool, job.id, "").await,
            Err(JobError::ValidationError(_))
        ));
        assert_eq!(get_job(&pool, job.id).await.unwrap().status, JobStatus::Pending);
    }
}
