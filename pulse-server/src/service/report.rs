//! Report Service
//!
//! Aggregations over follower snapshots.

use pulse_core::domain::report::{PlatformSummary, summarize_by_platform};
use sqlx::PgPool;

use crate::repository::snapshot_repository;

/// Per-platform totals over the latest snapshot of each account
pub async fn platform_summary(pool: &PgPool) -> Result<Vec<PlatformSummary>, sqlx::Error> {
    let latest = snapshot_repository::find_latest_per_account(pool).await?;
    Ok(summarize_by_platform(&latest))
}
