//! Job API Handlers
//!
//! HTTP endpoints for the scraping job lifecycle.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use pulse_core::domain::account::Account;
use pulse_core::domain::job::{JobStatus, ScrapingJob};
use pulse_core::dto::job::{
    AccountOutcome, FailJob, JobCreated, JobStatusView, StartJob, TriggerJob,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::api::error::ApiResult;
use crate::service::job_service;

// =============================================================================
// Trigger and Status Endpoints
// =============================================================================

/// POST /jobs
/// Trigger a scraping job for all accounts or one category
pub async fn trigger_job(
    State(pool): State<PgPool>,
    body: Option<Json<TriggerJob>>,
) -> ApiResult<(StatusCode, Json<JobCreated>)> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    tracing::info!("Triggering job (category: {:?})", req.category_id);

    let job = job_service::trigger_job(&pool, req).await?;

    Ok((StatusCode::CREATED, Json(JobCreated { job_id: job.id })))
}

/// GET /jobs/{id}/status
/// Current status and progress counters of a job
pub async fn get_job_status(
    State(pool): State<PgPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<JobStatusView>> {
    tracing::debug!("Getting status of job: {}", id);

    let status = job_service::get_status(&pool, id).await?;

    Ok(Json(status))
}

/// GET /jobs/{id}
/// Full job record including recorded errors
pub async fn get_job(
    State(pool): State<PgPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ScrapingJob>> {
    tracing::debug!("Getting job: {}", id);

    let job = job_service::get_job(&pool, id).await?;

    Ok(Json(job))
}

/// GET /jobs
/// Job history, newest first
pub async fn list_jobs(State(pool): State<PgPool>) -> ApiResult<Json<Vec<ScrapingJob>>> {
    tracing::debug!("Listing jobs");

    let jobs = job_service::list_jobs(&pool).await?;

    Ok(Json(jobs))
}

// =============================================================================
// Runner Endpoints
// =============================================================================

/// GET /jobs/pending
/// Jobs waiting for a runner, oldest first
pub async fn list_pending_jobs(State(pool): State<PgPool>) -> ApiResult<Json<Vec<ScrapingJob>>> {
    tracing::debug!("Listing pending jobs");

    let jobs = job_service::list_jobs_by_status(&pool, JobStatus::Pending).await?;

    Ok(Json(jobs))
}

/// POST /jobs/{id}/start
/// Claim a pending job for a runner; 409 if its scope already has a running job
pub async fn start_job(
    State(pool): State<PgPool>,
    Path(id): Path<Uuid>,
    Json(req): Json<StartJob>,
) -> ApiResult<Json<ScrapingJob>> {
    tracing::info!("Runner {} starting job: {}", req.runner_id, id);

    let job = job_service::start_job(&pool, id, &req.runner_id).await?;

    Ok(Json(job))
}

/// GET /jobs/{id}/accounts
/// Accounts enrolled in a job
pub async fn list_job_accounts(
    State(pool): State<PgPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Account>>> {
    tracing::debug!("Listing accounts of job: {}", id);

    let accounts = job_service::list_enrolled_accounts(&pool, id).await?;

    Ok(Json(accounts))
}

/// POST /jobs/{id}/accounts/{account_id}
/// Record the outcome of one enrolled account
pub async fn record_account_outcome(
    State(pool): State<PgPool>,
    Path((id, account_id)): Path<(Uuid, Uuid)>,
    Json(outcome): Json<AccountOutcome>,
) -> ApiResult<Json<JobStatusView>> {
    tracing::debug!("Recording outcome of account {} for job {}", account_id, id);

    let status = job_service::record_account_outcome(&pool, id, account_id, outcome).await?;

    Ok(Json(status))
}

/// POST /jobs/{id}/finish
/// Finish a running job after every account was attempted
pub async fn finish_job(
    State(pool): State<PgPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ScrapingJob>> {
    tracing::info!("Finishing job: {}", id);

    let job = job_service::finish_job(&pool, id).await?;

    Ok(Json(job))
}

/// POST /jobs/{id}/fail
/// Fail a running job after a catastrophic error
pub async fn fail_job(
    State(pool): State<PgPool>,
    Path(id): Path<Uuid>,
    Json(req): Json<FailJob>,
) -> ApiResult<Json<ScrapingJob>> {
    tracing::info!("Failing job: {}", id);

    let job = job_service::fail_job(&pool, id, req.message).await?;

    Ok(Json(job))
}
