//! Job Repository
//!
//! Handles all database operations related to scraping jobs. Every state
//! change is a conditional write so the invariants hold under concurrent
//! requests, not only in application memory.

use chrono::{DateTime, Utc};
use pulse_core::domain::account::{Account, Platform};
use pulse_core::domain::job::{AccountError, JobStatus, ScrapingJob, final_status};
use pulse_core::dto::job::{AccountOutcome, JobStatusView};
use sqlx::PgPool;
use uuid::Uuid;

/// Insert a job and its enrollment, unless the scope already has an active job
///
/// Returns `false` when another PENDING or RUNNING job holds the scope. The
/// partial unique index on `scope_key` backs the `NOT EXISTS` check when two
/// triggers race.
pub async fn create(
    pool: &PgPool,
    job: &ScrapingJob,
    account_ids: &[Uuid],
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO scraping_jobs (id, status, category_id, scope_key, total_accounts,
                                   completed_count, created_at, updated_at, started_at, finished_at)
        SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $10
        WHERE NOT EXISTS (
            SELECT 1 FROM scraping_jobs
            WHERE scope_key = $4 AND status IN ('PENDING', 'RUNNING')
        )
        "#,
    )
    .bind(job.id)
    .bind(job.status.as_str())
    .bind(job.category_id)
    .bind(job.scope().key())
    .bind(to_db_count(job.total_accounts))
    .bind(to_db_count(job.completed_count))
    .bind(job.created_at)
    .bind(job.updated_at)
    .bind(job.started_at)
    .bind(job.finished_at)
    .execute(&mut *tx)
    .await;

    let inserted = match inserted {
        Ok(result) => result.rows_affected() == 1,
        Err(err) if is_unique_violation(&err) => false,
        Err(err) => return Err(err),
    };

    if !inserted {
        tx.rollback().await?;
        return Ok(false);
    }

    if !account_ids.is_empty() {
        sqlx::query(
            r#"
            INSERT INTO job_accounts (job_id, account_id)
            SELECT $1, UNNEST($2::uuid[])
            "#,
        )
        .bind(job.id)
        .bind(account_ids)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(true)
}

/// Find a job by ID, including its recorded errors
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<ScrapingJob>, sqlx::Error> {
    let row = sqlx::query_as::<_, JobRow>(
        r#"
        SELECT id, status, category_id, total_accounts, completed_count, runner_id,
               created_at, updated_at, started_at, finished_at
        FROM scraping_jobs
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let errors = find_errors(pool, id).await?;
    Ok(Some(row.into_job(errors)))
}

/// Read only the fields polling clients need
pub async fn find_status(pool: &PgPool, id: Uuid) -> Result<Option<JobStatusView>, sqlx::Error> {
    let row = sqlx::query_as::<_, (String, i32, i32)>(
        "SELECT status, completed_count, total_accounts FROM scraping_jobs WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(status, completed, total)| {
        JobStatusView::new(
            string_to_status(&status),
            from_db_count(completed),
            from_db_count(total),
        )
    }))
}

/// Find jobs by status, oldest first
pub async fn find_by_status(
    pool: &PgPool,
    status: JobStatus,
) -> Result<Vec<ScrapingJob>, sqlx::Error> {
    let rows = sqlx::query_as::<_, JobRow>(
        r#"
        SELECT id, status, category_id, total_accounts, completed_count, runner_id,
               created_at, updated_at, started_at, finished_at
        FROM scraping_jobs
        WHERE status = $1
        ORDER BY created_at ASC
        "#,
    )
    .bind(status.as_str())
    .fetch_all(pool)
    .await?;

    // Errors are not loaded for status listings
    Ok(rows.into_iter().map(|r| r.into_job(Vec::new())).collect())
}

/// List jobs, newest first
pub async fn list_all(pool: &PgPool, limit: i64) -> Result<Vec<ScrapingJob>, sqlx::Error> {
    let rows = sqlx::query_as::<_, JobRow>(
        r#"
        SELECT id, status, category_id, total_accounts, completed_count, runner_id,
               created_at, updated_at, started_at, finished_at
        FROM scraping_jobs
        ORDER BY created_at DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut jobs = Vec::with_capacity(rows.len());
    for row in rows {
        let errors = find_errors(pool, row.id).await?;
        jobs.push(row.into_job(errors));
    }
    Ok(jobs)
}

/// Errors recorded on a job, in insertion order
pub async fn find_errors(pool: &PgPool, job_id: Uuid) -> Result<Vec<AccountError>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ErrorRow>(
        r#"
        SELECT account_id, handle, platform, message, occurred_at
        FROM job_errors
        WHERE job_id = $1
        ORDER BY id ASC
        "#,
    )
    .bind(job_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// PENDING -> RUNNING for `runner_id`, unless another job of the same scope
/// is RUNNING
///
/// Returns `false` when the conditional write matched nothing.
pub async fn mark_running(
    pool: &PgPool,
    id: Uuid,
    runner_id: &str,
) -> Result<bool, sqlx::Error> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE scraping_jobs
        SET status = 'RUNNING', started_at = $2, updated_at = $2, runner_id = $3
        WHERE id = $1
          AND status = 'PENDING'
          AND NOT EXISTS (
              SELECT 1 FROM scraping_jobs other
              WHERE other.scope_key = scraping_jobs.scope_key
                AND other.status = 'RUNNING'
                AND other.id <> $1
          )
        "#,
    )
    .bind(id)
    .bind(now)
    .bind(runner_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Count one attempted account and store its snapshot or error
///
/// The counter only moves while the job is RUNNING, below `total_accounts`,
/// and for an enrolled account not yet attempted. Returns `false` (and
/// writes nothing) otherwise.
pub async fn record_outcome(
    pool: &PgPool,
    job_id: Uuid,
    account: &Account,
    outcome: &AccountOutcome,
) -> Result<bool, sqlx::Error> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    // Row lock on the job serializes counter updates
    let counted = sqlx::query(
        r#"
        UPDATE scraping_jobs
        SET completed_count = completed_count + 1, updated_at = $2
        WHERE id = $1 AND status = 'RUNNING' AND completed_count < total_accounts
        "#,
    )
    .bind(job_id)
    .bind(now)
    .execute(&mut *tx)
    .await?
    .rows_affected()
        == 1;

    if !counted {
        tx.rollback().await?;
        return Ok(false);
    }

    let marked = sqlx::query(
        r#"
        UPDATE job_accounts
        SET attempted_at = $3
        WHERE job_id = $1 AND account_id = $2 AND attempted_at IS NULL
        "#,
    )
    .bind(job_id)
    .bind(account.id)
    .bind(now)
    .execute(&mut *tx)
    .await?
    .rows_affected()
        == 1;

    if !marked {
        tx.rollback().await?;
        return Ok(false);
    }

    match outcome {
        AccountOutcome::Scraped { follower_count } => {
            sqlx::query(
                r#"
                INSERT INTO follower_snapshots (id, account_id, job_id, platform, follower_count, captured_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(account.id)
            .bind(job_id)
            .bind(account.platform.as_str())
            .bind(i64::try_from(*follower_count).unwrap_or(i64::MAX))
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        AccountOutcome::Failed { message } => {
            let error = AccountError::for_account(account, message.clone());
            insert_error(&mut tx, job_id, &error).await?;
        }
    }

    tx.commit().await?;
    Ok(true)
}

/// RUNNING -> COMPLETED | FAILED
///
/// Unattempted accounts are recorded as one synthetic error before the
/// final status is decided. Returns `None` when the job was not RUNNING.
pub async fn finish(pool: &PgPool, id: Uuid) -> Result<Option<JobStatus>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, (i32, i32)>(
        r#"
        SELECT completed_count, total_accounts
        FROM scraping_jobs
        WHERE id = $1 AND status = 'RUNNING'
        FOR UPDATE
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some((completed, total)) = row else {
        tx.rollback().await?;
        return Ok(None);
    };
    let (completed, total) = (from_db_count(completed), from_db_count(total));

    if completed < total {
        let error = AccountError::synthetic(format!(
            "{} enrolled account(s) were never attempted",
            total - completed
        ));
        insert_error(&mut tx, id, &error).await?;
    }

    let (error_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM job_errors WHERE job_id = $1")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

    let status = final_status(error_count == 0, completed, total);
    let now = Utc::now();

    sqlx::query(
        r#"
        UPDATE scraping_jobs
        SET status = $2, finished_at = $3, updated_at = $3
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(status.as_str())
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some(status))
}

/// Catastrophic RUNNING -> FAILED with a synthetic error entry
///
/// `completed_count` is left at whatever was reached. Returns `false` when
/// the job was not RUNNING.
pub async fn mark_failed(pool: &PgPool, id: Uuid, message: &str) -> Result<bool, sqlx::Error> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        r#"
        UPDATE scraping_jobs
        SET status = 'FAILED', finished_at = $2, updated_at = $2
        WHERE id = $1 AND status = 'RUNNING'
        "#,
    )
    .bind(id)
    .bind(now)
    .execute(&mut *tx)
    .await?
    .rows_affected()
        == 1;

    if !updated {
        tx.rollback().await?;
        return Ok(false);
    }

    insert_error(&mut tx, id, &AccountError::synthetic(message)).await?;
    tx.commit().await?;
    Ok(true)
}

/// Fail every RUNNING job without progress for `max_idle`
///
/// `updated_at` moves on start and on every recorded outcome, so an old value
/// means the runner stopped reporting. Each job gets a synthetic error.
/// Returns the IDs of the failed jobs.
pub async fn fail_stale(
    pool: &PgPool,
    max_idle: chrono::Duration,
) -> Result<Vec<Uuid>, sqlx::Error> {
    let now = Utc::now();
    let cutoff = now - max_idle;
    let mut tx = pool.begin().await?;

    let ids: Vec<(Uuid,)> = sqlx::query_as(
        r#"
        UPDATE scraping_jobs
        SET status = 'FAILED', finished_at = $2, updated_at = $2
        WHERE status = 'RUNNING' AND updated_at < $1
        RETURNING id
        "#,
    )
    .bind(cutoff)
    .bind(now)
    .fetch_all(&mut *tx)
    .await?;

    let message = format!(
        "No progress reported for {} s; runner presumed lost",
        max_idle.num_seconds()
    );
    for (id,) in &ids {
        insert_error(&mut tx, *id, &AccountError::synthetic(message.clone())).await?;
    }

    tx.commit().await?;
    Ok(ids.into_iter().map(|(id,)| id).collect())
}

async fn insert_error(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    job_id: Uuid,
    error: &AccountError,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO job_errors (job_id, account_id, handle, platform, message, occurred_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(job_id)
    .bind(error.account_id)
    .bind(&error.handle)
    .bind(error.platform.map(|p| p.as_str()))
    .bind(&error.message)
    .bind(error.occurred_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

// =============================================================================
// Helper Functions
// =============================================================================

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

fn string_to_status(s: &str) -> JobStatus {
    s.parse().unwrap_or_else(|_| {
        tracing::warn!("Unknown job status in database: {}", s);
        JobStatus::Failed
    })
}

fn to_db_count(count: u32) -> i32 {
    i32::try_from(count).unwrap_or(i32::MAX)
}

fn from_db_count(count: i32) -> u32 {
    u32::try_from(count).unwrap_or(0)
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    status: String,
    category_id: Option<Uuid>,
    total_accounts: i32,
    completed_count: i32,
    runner_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl JobRow {
    fn into_job(self, errors: Vec<AccountError>) -> ScrapingJob {
        ScrapingJob {
            id: self.id,
            status: string_to_status(&self.status),
            category_id: self.category_id,
            total_accounts: from_db_count(self.total_accounts),
            completed_count: from_db_count(self.completed_count),
            errors,
            runner_id: self.runner_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ErrorRow {
    account_id: Option<Uuid>,
    handle: String,
    platform: Option<String>,
    message: String,
    occurred_at: DateTime<Utc>,
}

impl From<ErrorRow> for AccountError {
    fn from(row: ErrorRow) -> Self {
        AccountError {
            account_id: row.account_id,
            handle: row.handle,
            platform: row.platform.and_then(|p| p.parse::<Platform>().ok()),
            message: row.message,
            occurred_at: row.occurred_at,
        }
    }
}
