//! Follower growth and per-platform aggregation

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::account::{FollowerSnapshot, Platform};

/// Totals for one platform over the latest snapshot of each account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformSummary {
    pub platform: Platform,
    pub account_count: u32,
    pub total_followers: u64,
}

/// Percentage change from `previous` to `current`
///
/// `None` when there is no baseline to compare against.
pub fn growth_percent(previous: u64, current: u64) -> Option<f64> {
    if previous == 0 {
        return None;
    }
    let delta = current as f64 - previous as f64;
    Some(delta / previous as f64 * 100.0)
}

/// Growth between the oldest and newest snapshot of a history
pub fn history_growth(snapshots: &[FollowerSnapshot]) -> Option<f64> {
    let first = snapshots.iter().min_by_key(|s| s.captured_at)?;
    let last = snapshots.iter().max_by_key(|s| s.captured_at)?;
    growth_percent(first.follower_count, last.follower_count)
}

/// Group latest snapshots (one per account) by platform
///
/// Platforms without snapshots are omitted; output is ordered by platform.
pub fn summarize_by_platform(latest: &[FollowerSnapshot]) -> Vec<PlatformSummary> {
    let mut totals: BTreeMap<Platform, (u32, u64)> = BTreeMap::new();

    for snapshot in latest {
        let entry = totals.entry(snapshot.platform).or_default();
        entry.0 += 1;
        entry.1 += snapshot.follower_count;
    }

    totals
        .into_iter()
        .map(|(platform, (account_count, total_followers))| PlatformSummary {
            platform,
            account_count,
            total_followers,
        })
        .collect()
}
