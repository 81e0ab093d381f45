//! Snapshot Repository
//!
//! Read access to follower snapshots. Snapshots are written by the job
//! repository as part of recording an account outcome.

use chrono::{DateTime, Utc};
use pulse_core::domain::account::{FollowerSnapshot, Platform};
use sqlx::PgPool;
use uuid::Uuid;

/// Snapshots of one account, oldest first
pub async fn find_by_account(
    pool: &PgPool,
    account_id: Uuid,
) -> Result<Vec<FollowerSnapshot>, sqlx::Error> {
    let rows = sqlx::query_as::<_, SnapshotRow>(
        r#"
        SELECT id, account_id, job_id, platform, follower_count, captured_at
        FROM follower_snapshots
        WHERE account_id = $1
        ORDER BY captured_at ASC
        "#,
    )
    .bind(account_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().filter_map(|r| r.into_snapshot()).collect())
}

/// Most recent snapshot of every account
pub async fn find_latest_per_account(pool: &PgPool) -> Result<Vec<FollowerSnapshot>, sqlx::Error> {
    let rows = sqlx::query_as::<_, SnapshotRow>(
        r#"
        SELECT DISTINCT ON (account_id)
               id, account_id, job_id, platform, follower_count, captured_at
        FROM follower_snapshots
        ORDER BY account_id, captured_at DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().filter_map(|r| r.into_snapshot()).collect())
}

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    id: Uuid,
    account_id: Uuid,
    job_id: Uuid,
    platform: String,
    follower_count: i64,
    captured_at: DateTime<Utc>,
}

impl SnapshotRow {
    fn into_snapshot(self) -> Option<FollowerSnapshot> {
        let platform = self.platform.parse::<Platform>().ok()?;
        Some(FollowerSnapshot {
            id: self.id,
            account_id: self.account_id,
            job_id: self.job_id,
            platform,
            follower_count: u64::try_from(self.follower_count).unwrap_or(0),
            captured_at: self.captured_at,
        })
    }
}
