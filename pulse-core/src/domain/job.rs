//! Scraping job domain types
//!
//! A [`ScrapingJob`] is one run of the follower scraper over the accounts
//! enrolled in its scope. The methods on it are the job state machine:
//!
//! ```text
//! PENDING --start--> RUNNING --finish--> COMPLETED | FAILED
//!                       |
//!                       +--fail (catastrophic)--> FAILED
//! ```
//!
//! The server persists the same transitions with conditional writes; these
//! in-memory methods are used wherever a job is driven without a database
//! and by the shared [`final_status`] rule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::account::{Account, Platform};

/// Handle recorded on synthetic (job-level) error entries
pub const SYNTHETIC_HANDLE: &str = "*";

/// Scraping job record
///
/// Structure shared between server (persists) and runner (drives).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapingJob {
    pub id: Uuid,
    pub status: JobStatus,
    pub category_id: Option<Uuid>,
    pub total_accounts: u32,
    pub completed_count: u32,
    pub errors: Vec<AccountError>,
    /// Runner that claimed the job
    #[serde(default)]
    pub runner_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Job lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Per-account failure (or synthetic job-level failure) recorded on a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountError {
    /// Absent for synthetic entries
    pub account_id: Option<Uuid>,
    pub handle: String,
    pub platform: Option<Platform>,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

/// Enrollment boundary of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobScope {
    All,
    Category(Uuid),
}

/// Rejected state machine transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("cannot move job from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("job is not running (current: {0})")]
    NotRunning(JobStatus),

    #[error("all {total} enrolled accounts have already been attempted")]
    Overflow { total: u32 },
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    /// COMPLETED and FAILED admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// PENDING or RUNNING; holds the scope
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(JobStatus::Pending),
            "RUNNING" => Ok(JobStatus::Running),
            "COMPLETED" => Ok(JobStatus::Completed),
            "FAILED" => Ok(JobStatus::Failed),
            _ => Err(format!("Invalid job status: {}", s)),
        }
    }
}

impl JobScope {
    pub fn from_category(category_id: Option<Uuid>) -> Self {
        match category_id {
            Some(id) => JobScope::Category(id),
            None => JobScope::All,
        }
    }

    pub fn category_id(&self) -> Option<Uuid> {
        match self {
            JobScope::All => None,
            JobScope::Category(id) => Some(*id),
        }
    }

    /// Stable key the job store uses for the one-active-job-per-scope constraint
    pub fn key(&self) -> String {
        match self {
            JobScope::All => "all".to_string(),
            JobScope::Category(id) => format!("category:{}", id),
        }
    }
}

impl AccountError {
    pub fn for_account(account: &Account, message: impl Into<String>) -> Self {
        Self {
            account_id: Some(account.id),
            handle: account.handle.clone(),
            platform: Some(account.platform),
            message: message.into(),
            occurred_at: Utc::now(),
        }
    }

    /// Job-level entry not tied to any account
    pub fn synthetic(message: impl Into<String>) -> Self {
        Self {
            account_id: None,
            handle: SYNTHETIC_HANDLE.to_string(),
            platform: None,
            message: message.into(),
            occurred_at: Utc::now(),
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.account_id.is_none()
    }
}

/// Progress shown to clients: `round(completed / total * 100)`, 0 for an empty job
pub fn progress_percent(completed: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let ratio = f64::from(completed.min(total)) / f64::from(total);
    (ratio * 100.0).round() as u8
}

/// Terminal status a running job finishes with
///
/// COMPLETED only when every enrolled account was attempted and nothing
/// was recorded in `errors`.
pub fn final_status(errors_empty: bool, completed: u32, total: u32) -> JobStatus {
    if errors_empty && completed == total {
        JobStatus::Completed
    } else {
        JobStatus::Failed
    }
}

impl ScrapingJob {
    /// New PENDING job over `total_accounts` enrolled accounts
    pub fn new(scope: JobScope, total_accounts: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Pending,
            category_id: scope.category_id(),
            total_accounts,
            completed_count: 0,
            errors: Vec::new(),
            runner_id: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn scope(&self) -> JobScope {
        JobScope::from_category(self.category_id)
    }

    pub fn progress_percent(&self) -> u8 {
        progress_percent(self.completed_count, self.total_accounts)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// PENDING -> RUNNING
    pub fn start(&mut self) -> Result<(), TransitionError> {
        self.transition(JobStatus::Running)?;
        self.started_at = Some(self.updated_at);
        Ok(())
    }

    /// Count an account that was scraped successfully
    pub fn record_success(&mut self) -> Result<(), TransitionError> {
        self.count_attempt()
    }

    /// Count an account that failed and keep its error
    pub fn record_failure(&mut self, error: AccountError) -> Result<(), TransitionError> {
        self.count_attempt()?;
        self.errors.push(error);
        Ok(())
    }

    /// RUNNING -> COMPLETED | FAILED once all accounts have been attempted
    ///
    /// Accounts left unattempted are reported with one synthetic entry so a
    /// short job never finishes as COMPLETED.
    pub fn finish(&mut self) -> Result<JobStatus, TransitionError> {
        if self.status != JobStatus::Running {
            return Err(TransitionError::NotRunning(self.status));
        }

        let missing = self.total_accounts - self.completed_count;
        if missing > 0 {
            self.errors.push(AccountError::synthetic(format!(
                "{} enrolled account(s) were never attempted",
                missing
            )));
        }

        let status = final_status(
            self.errors.is_empty(),
            self.completed_count,
            self.total_accounts,
        );
        self.transition(status)?;
        self.finished_at = Some(self.updated_at);
        Ok(status)
    }

    /// Catastrophic failure: RUNNING -> FAILED with a synthetic error,
    /// leaving `completed_count` where it is
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(JobStatus::Failed)?;
        self.errors.push(AccountError::synthetic(message));
        self.finished_at = Some(self.updated_at);
        Ok(())
    }

    fn count_attempt(&mut self) -> Result<(), TransitionError> {
        if self.status != JobStatus::Running {
            return Err(TransitionError::NotRunning(self.status));
        }
        if self.completed_count >= self.total_accounts {
            return Err(TransitionError::Overflow {
                total: self.total_accounts,
            });
        }
        self.completed_count += 1;
        self.updated_at = Utc::now();
        Ok(())
    }

    fn transition(&mut self, next: JobStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}
