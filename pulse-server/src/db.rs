use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Create categories table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id UUID PRIMARY KEY,
            name VARCHAR(255) NOT NULL UNIQUE,
            created_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create accounts table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS accounts (
            id UUID PRIMARY KEY,
            handle VARCHAR(255) NOT NULL,
            platform VARCHAR(20) NOT NULL,
            display_name TEXT,
            category_id UUID REFERENCES categories(id) ON DELETE SET NULL,
            created_at TIMESTAMPTZ NOT NULL,
            UNIQUE (platform, handle)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create scraping jobs table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS scraping_jobs (
            id UUID PRIMARY KEY,
            status VARCHAR(20) NOT NULL,
            category_id UUID REFERENCES categories(id) ON DELETE SET NULL,
            scope_key VARCHAR(64) NOT NULL,
            total_accounts INTEGER NOT NULL CHECK (total_accounts >= 0),
            completed_count INTEGER NOT NULL DEFAULT 0,
            runner_id VARCHAR(255),
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL,
            started_at TIMESTAMPTZ,
            finished_at TIMESTAMPTZ,
            CHECK (completed_count >= 0 AND completed_count <= total_accounts)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Databases created before jobs recorded their runner
    sqlx::query("ALTER TABLE scraping_jobs ADD COLUMN IF NOT EXISTS runner_id VARCHAR(255)")
        .execute(pool)
        .await?;

    // At most one active (PENDING or RUNNING) job per scope
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_scraping_jobs_active_scope
        ON scraping_jobs(scope_key)
        WHERE status IN ('PENDING', 'RUNNING')
        "#,
    )
    .execute(pool)
    .await?;

    // Create enrollment table (accounts fixed at job creation)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS job_accounts (
            job_id UUID NOT NULL REFERENCES scraping_jobs(id) ON DELETE CASCADE,
            account_id UUID NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
            attempted_at TIMESTAMPTZ,
            PRIMARY KEY (job_id, account_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create job errors table (append-only)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS job_errors (
            id BIGSERIAL PRIMARY KEY,
            job_id UUID NOT NULL REFERENCES scraping_jobs(id) ON DELETE CASCADE,
            account_id UUID,
            handle VARCHAR(255) NOT NULL,
            platform VARCHAR(20),
            message TEXT NOT NULL,
            occurred_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create follower snapshots table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS follower_snapshots (
            id UUID PRIMARY KEY,
            account_id UUID NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
            job_id UUID NOT NULL REFERENCES scraping_jobs(id) ON DELETE CASCADE,
            platform VARCHAR(20) NOT NULL,
            follower_count BIGINT NOT NULL CHECK (follower_count >= 0),
            captured_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for better query performance
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_scraping_jobs_status ON scraping_jobs(status)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_scraping_jobs_running_idle ON scraping_jobs(updated_at) WHERE status = 'RUNNING'",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_scraping_jobs_created_at ON scraping_jobs(created_at DESC)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_job_errors_job_id ON job_errors(job_id, id)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_follower_snapshots_account ON follower_snapshots(account_id, captured_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_accounts_category ON accounts(category_id)")
        .execute(pool)
        .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
