//! Job DTOs for inter-service communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::job::{JobStatus, ScrapingJob, progress_percent};

/// Request to trigger a new scraping job
///
/// An absent `category_id` enrolls every tracked account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerJob {
    #[serde(default)]
    pub category_id: Option<Uuid>,
}

/// Response to a successful trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCreated {
    pub job_id: Uuid,
}

/// Current state of a job as exposed to polling clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub status: JobStatus,
    pub completed_count: u32,
    pub total_accounts: u32,
    /// Rounded percentage, 0 for a job without accounts
    pub progress: u8,
}

/// Result of scraping one enrolled account, reported by the runner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "outcome",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum AccountOutcome {
    Scraped { follower_count: u64 },
    Failed { message: String },
}

/// Claim request sent by a runner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartJob {
    pub runner_id: String,
}

/// Catastrophic failure report from the runner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailJob {
    pub message: String,
}

impl JobStatusView {
    pub fn new(status: JobStatus, completed_count: u32, total_accounts: u32) -> Self {
        Self {
            status,
            completed_count,
            total_accounts,
            progress: progress_percent(completed_count, total_accounts),
        }
    }
}

impl From<&ScrapingJob> for JobStatusView {
    fn from(job: &ScrapingJob) -> Self {
        JobStatusView::new(job.status, job.completed_count, job.total_accounts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_view_wire_format() {
        let view = JobStatusView::new(JobStatus::Running, 1, 4);
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "status": "RUNNING",
                "completedCount": 1,
                "totalAccounts": 4,
                "progress": 25
            })
        );
    }

    #[test]
    fn test_trigger_without_category() {
        let req: TriggerJob = serde_json::from_str("{}").unwrap();
        assert!(req.category_id.is_none());
    }

    #[test]
    fn test_account_outcome_wire_format() {
        let scraped: AccountOutcome =
            serde_json::from_str(r#"{"outcome":"SCRAPED","followerCount":42}"#).unwrap();
        assert_eq!(scraped, AccountOutcome::Scraped { follower_count: 42 });

        let failed = serde_json::to_value(AccountOutcome::Failed {
            message: "rate limited".to_string(),
        })
        .unwrap();
        assert_eq!(
            failed,
            serde_json::json!({ "outcome": "FAILED", "message": "rate limited" })
        );
    }

    #[test]
    fn test_start_job_wire_format() {
        let req: StartJob = serde_json::from_str(r#"{"runnerId":"runner-1"}"#).unwrap();
        assert_eq!(req.runner_id, "runner-1");
    }
}
