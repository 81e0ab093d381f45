//! Job runner
//!
//! Drives one scraping job from claim to terminal state:
//! - Claiming the job (PENDING -> RUNNING)
//! - Loading enrolled accounts and checking the scraper before any fetch
//! - Fetching follower counts with bounded concurrency
//! - Reporting each account's outcome one at a time
//! - Finishing the job, or failing it on a catastrophic error
//!
//! Account-level failures are recorded and never abort the job. Each account
//! is attempted exactly once. The finish and fail reports are retried with
//! backoff.

use anyhow::Result;
use pulse_client::ClientError;
use pulse_core::domain::account::Account;
use pulse_core::domain::job::{JobStatus, ScrapingJob};
use pulse_core::dto::job::AccountOutcome;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::repository::JobRepository;
use crate::service::scraper::{ScrapeError, Scraper};

/// Exponential backoff for the reports that end a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

pub struct JobRunner {
    jobs: Arc<dyn JobRepository>,
    scraper: Arc<dyn Scraper>,
    runner_id: String,
    max_concurrent_fetches: usize,
    retry: RetryPolicy,
}

impl JobRunner {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        scraper: Arc<dyn Scraper>,
        runner_id: impl Into<String>,
        max_concurrent_fetches: usize,
    ) -> Self {
        Self {
            jobs,
            scraper,
            runner_id: runner_id.into(),
            max_concurrent_fetches: max_concurrent_fetches.max(1),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Runs a pending job to completion
    ///
    /// # Returns
    /// The terminal status, or `None` when the job could not be claimed
    /// because another runner holds it or its scope.
    pub async fn run(&self, job_id: Uuid) -> Result<Option<JobStatus>> {
        let job = match self.jobs.start_job(job_id, &self.runner_id).await {
            Ok(job) => job,
            Err(e) if is_conflict(&e) => {
                info!("Job {} not claimed: {:#}", job_id, e);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        info!(
            "Claimed job {} ({} account(s), scope {})",
            job_id,
            job.total_accounts,
            job.scope().key()
        );

        let accounts = match self.jobs.fetch_enrolled_accounts(job_id).await {
            Ok(accounts) => accounts,
            Err(e) => {
                return self
                    .fail(job_id, format!("Could not load enrolled accounts: {:#}", e))
                    .await;
            }
        };

        if !accounts.is_empty() {
            if let Err(e) = self.scraper.health_check().await {
                return self
                    .fail(job_id, format!("Scraping source unavailable: {:#}", e))
                    .await;
            }
        }

        self.process_accounts(job_id, accounts).await;

        let job = self
            .report_terminal(job_id, "finish", || self.jobs.finish_job(job_id))
            .await?;
        info!(
            "Job {} finished with status {} ({}/{} account(s), {} error(s))",
            job_id,
            job.status,
            job.completed_count,
            job.total_accounts,
            job.errors.len()
        );

        Ok(Some(job.status))
    }

    /// Fetch concurrently, report serially
    async fn process_accounts(&self, job_id: Uuid, accounts: Vec<Account>) {
        let permits = Arc::new(Semaphore::new(self.max_concurrent_fetches));
        let mut fetches = JoinSet::new();

        for account in accounts {
            let scraper = Arc::clone(&self.scraper);
            let permits = Arc::clone(&permits);
            fetches.spawn(async move {
                let result = match permits.acquire_owned().await {
                    Ok(_permit) => scraper.fetch_followers(&account).await,
                    Err(_) => Err(ScrapeError::Network("fetch pool closed".to_string())),
                };
                (account, result)
            });
        }

        while let Some(joined) = fetches.join_next().await {
            let (account, result) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    // The account stays unattempted and is reported at finish
                    error!("Fetch task for job {} panicked: {}", job_id, e);
                    continue;
                }
            };

            let outcome = match result {
                Ok(follower_count) => AccountOutcome::Scraped { follower_count },
                Err(e) => AccountOutcome::Failed {
                    message: e.to_string(),
                },
            };

            match self.jobs.record_outcome(job_id, account.id, &outcome).await {
                Ok(status) => debug!(
                    "Job {}: {} @{} recorded ({}%)",
                    job_id, account.platform, account.handle, status.progress
                ),
                Err(e) => warn!(
                    "Job {}: could not record outcome for {} @{}: {:#}",
                    job_id, account.platform, account.handle, e
                ),
            }
        }
    }

    async fn fail(&self, job_id: Uuid, message: String) -> Result<Option<JobStatus>> {
        error!("Job {} failed: {}", job_id, message);
        let job = self
            .report_terminal(job_id, "fail", || self.jobs.fail_job(job_id, &message))
            .await?;
        Ok(Some(job.status))
    }

    /// Send a finish or fail report until the server answers
    ///
    /// Transport and 5xx errors are retried with exponential backoff. A 4xx
    /// answer is final: the job is unknown or no longer RUNNING.
    async fn report_terminal<F, Fut>(
        &self,
        job_id: Uuid,
        action: &str,
        mut send: F,
    ) -> Result<ScrapingJob>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<ScrapingJob>>,
    {
        let mut attempt = 0;
        let mut delay = self.retry.initial_delay;

        loop {
            attempt += 1;

            match send().await {
                Ok(job) => {
                    if attempt > 1 {
                        info!("Job {}: {} reported after {} attempt(s)", job_id, action, attempt);
                    }
                    return Ok(job);
                }
                Err(e) if is_client_error(&e) || attempt >= self.retry.max_attempts => {
                    error!(
                        "Job {}: could not {} after {} attempt(s): {:#}",
                        job_id, action, attempt, e
                    );
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        "Job {}: {} failed (attempt {}/{}): {:#}; retrying in {:?}",
                        job_id, action, attempt, self.retry.max_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(self.retry.max_delay);
                }
            }
        }
    }
}

fn is_conflict(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ClientError>()
        .is_some_and(ClientError::is_conflict)
}

fn is_client_error(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ClientError>()
        .is_some_and(ClientError::is_client_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryJobRepository;
    use async_trait::async_trait;
    use chrono::Utc;
    use pulse_core::domain::account::Platform;
    use pulse_core::domain::job::SYNTHETIC_HANDLE;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers from a table keyed by handle; unknown handles do not exist
    #[derive(Default)]
    struct ScriptedScraper {
        counts: HashMap<String, std::result::Result<u64, ScrapeError>>,
        healthy: bool,
        calls: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedScraper {
        fn healthy(counts: Vec<(&str, std::result::Result<u64, ScrapeError>)>) -> Self {
            Self {
                counts: counts
                    .into_iter()
                    .map(|(h, r)| (h.to_string(), r))
                    .collect(),
                healthy: true,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl Scraper for ScriptedScraper {
        async fn health_check(&self) -> Result<()> {
            if self.healthy {
                Ok(())
            } else {
                anyhow::bail!("connection refused")
            }
        }

        async fn fetch_followers(
            &self,
            account: &Account,
        ) -> std::result::Result<u64, ScrapeError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.calls.lock().unwrap().push(account.handle.clone());
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            self.counts
                .get(&account.handle)
                .cloned()
                .unwrap_or_else(|| {
                    Err(ScrapeError::InvalidHandle {
                        platform: account.platform,
                        handle: account.handle.clone(),
                    })
                })
        }
    }

    fn account(handle: &str) -> Account {
        Account {
            id: Uuid::new_v4(),
            handle: handle.to_string(),
            platform: Platform::Instagram,
            display_name: None,
            category_id: None,
            created_at: Utc::now(),
        }
    }

    fn runner(
        repo: &Arc<InMemoryJobRepository>,
        scraper: &Arc<ScriptedScraper>,
        fetches: usize,
    ) -> JobRunner {
        JobRunner::new(repo.clone(), scraper.clone(), "runner-test", fetches).with_retry_policy(
            RetryPolicy {
                max_attempts: 3,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
            },
        )
    }

    #[tokio::test]
    async fn test_all_accounts_scraped_completes() {
        let repo = Arc::new(InMemoryJobRepository::default());
        let scraper = Arc::new(ScriptedScraper::healthy(vec![
            ("nasa", Ok(100)),
            ("esa", Ok(50)),
            ("jaxa", Ok(10)),
        ]));
        let job_id = repo.insert(vec![account("nasa"), account("esa"), account("jaxa")]);

        let status = runner(&repo, &scraper, 2).run(job_id).await.unwrap();

        assert_eq!(status, Some(JobStatus::Completed));
        let job = repo.job(job_id);
        assert_eq!(job.completed_count, 3);
        assert!(job.errors.is_empty());
        assert_eq!(job.progress_percent(), 100);
        assert_eq!(job.runner_id.as_deref(), Some("runner-test"));
    }

    #[tokio::test]
    async fn test_partial_failure_fails_job_but_counts_everything() {
        let repo = Arc::new(InMemoryJobRepository::default());
        let scraper = Arc::new(ScriptedScraper::healthy(vec![
            ("nasa", Ok(100)),
            (
                "busy",
                Err(ScrapeError::RateLimited {
                    platform: Platform::Instagram,
                }),
            ),
        ]));
        let job_id = repo.insert(vec![account("nasa"), account("busy"), account("ghost")]);

        let status = runner(&repo, &scraper, 4).run(job_id).await.unwrap();

        assert_eq!(status, Some(JobStatus::Failed));
        let job = repo.job(job_id);
        assert_eq!(job.completed_count, 3);
        assert_eq!(job.errors.len(), 2);
        let mut handles: Vec<_> = job.errors.iter().map(|e| e.handle.as_str()).collect();
        handles.sort();
        assert_eq!(handles, vec!["busy", "ghost"]);
    }

    #[tokio::test]
    async fn test_each_account_attempted_once() {
        let repo = Arc::new(InMemoryJobRepository::default());
        let scraper = Arc::new(ScriptedScraper::healthy(vec![("a", Ok(1)), ("b", Ok(2))]));
        let job_id = repo.insert(vec![account("a"), account("b")]);

        runner(&repo, &scraper, 1).run(job_id).await.unwrap();

        let mut calls = scraper.calls.lock().unwrap().clone();
        calls.sort();
        assert_eq!(calls, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_fetch_concurrency_is_bounded() {
        let repo = Arc::new(InMemoryJobRepository::default());
        let handles: Vec<String> = (0..12).map(|i| format!("acc{}", i)).collect();
        let scraper = Arc::new(ScriptedScraper::healthy(
            handles.iter().map(|h| (h.as_str(), Ok(5))).collect(),
        ));
        let job_id = repo.insert(handles.iter().map(|h| account(h)).collect());

        let status = runner(&repo, &scraper, 3).run(job_id).await.unwrap();

        assert_eq!(status, Some(JobStatus::Completed));
        assert!(scraper.max_in_flight.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_unhealthy_scraper_fails_before_any_fetch() {
        let repo = Arc::new(InMemoryJobRepository::default());
        let scraper = Arc::new(ScriptedScraper {
            healthy: false,
            ..Default::default()
        });
        let job_id = repo.insert(vec![account("nasa"), account("esa")]);

        let status = runner(&repo, &scraper, 2).run(job_id).await.unwrap();

        assert_eq!(status, Some(JobStatus::Failed));
        let job = repo.job(job_id);
        assert_eq!(job.completed_count, 0);
        assert_eq!(job.errors.len(), 1);
        assert_eq!(job.errors[0].handle, SYNTHETIC_HANDLE);
        assert!(scraper.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_accounts_fail_the_job() {
        let repo = Arc::new(InMemoryJobRepository::default());
        *repo.fail_account_listing.lock().unwrap() = true;
        let scraper = Arc::new(ScriptedScraper::healthy(vec![]));
        let job_id = repo.insert(vec![account("nasa")]);

        let status = runner(&repo, &scraper, 2).run(job_id).await.unwrap();

        assert_eq!(status, Some(JobStatus::Failed));
        assert!(repo.job(job_id).errors[0].is_synthetic());
    }

    #[tokio::test]
    async fn test_lost_report_is_flagged_at_finish() {
        let repo = Arc::new(InMemoryJobRepository::default());
        let scraper = Arc::new(ScriptedScraper::healthy(vec![("a", Ok(1)), ("b", Ok(2))]));
        let lost = account("b");
        repo.drop_reports_for.lock().unwrap().insert(lost.id);
        let job_id = repo.insert(vec![account("a"), lost]);

        let status = runner(&repo, &scraper, 2).run(job_id).await.unwrap();

        assert_eq!(status, Some(JobStatus::Failed));
        let job = repo.job(job_id);
        assert_eq!(job.completed_count, 1);
        assert_eq!(job.errors.len(), 1);
        assert!(job.errors[0].is_synthetic());
    }

    #[tokio::test]
    async fn test_empty_job_skips_health_check() {
        let repo = Arc::new(InMemoryJobRepository::default());
        let scraper = Arc::new(ScriptedScraper::default());
        let job_id = repo.insert(Vec::new());

        let status = runner(&repo, &scraper, 2).run(job_id).await.unwrap();

        assert_eq!(status, Some(JobStatus::Completed));
    }

    #[tokio::test]
    async fn test_already_claimed_job_is_skipped() {
        let repo = Arc::new(InMemoryJobRepository::default());
        let scraper = Arc::new(ScriptedScraper::healthy(vec![("nasa", Ok(1))]));
        let job_id = repo.insert(vec![account("nasa")]);
        repo.start_job(job_id, "runner-other").await.unwrap();

        let status = runner(&repo, &scraper, 2).run(job_id).await.unwrap();

        assert_eq!(status, None);
        assert_eq!(repo.job(job_id).status, JobStatus::Running);
        assert_eq!(repo.job(job_id).runner_id.as_deref(), Some("runner-other"));
        assert!(scraper.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_job_is_an_error() {
        let repo = Arc::new(InMemoryJobRepository::default());
        let scraper = Arc::new(ScriptedScraper::default());

        assert!(runner(&repo, &scraper, 2).run(Uuid::new_v4()).await.is_err());
    }

    #[tokio::test]
    async fn test_lost_finish_report_is_retried() {
        let repo = Arc::new(InMemoryJobRepository::default());
        *repo.lose_terminal_reports.lock().unwrap() = 1;
        let scraper = Arc::new(ScriptedScraper::healthy(vec![("nasa", Ok(100))]));
        let job_id = repo.insert(vec![account("nasa")]);

        let status = runner(&repo, &scraper, 2).run(job_id).await.unwrap();

        assert_eq!(status, Some(JobStatus::Completed));
        assert_eq!(repo.job(job_id).status, JobStatus::Completed);
        assert_eq!(*repo.terminal_attempts.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_lost_fail_report_is_retried() {
        let repo = Arc::new(InMemoryJobRepository::default());
        *repo.lose_terminal_reports.lock().unwrap() = 2;
        let scraper = Arc::new(ScriptedScraper {
            healthy: false,
            ..Default::default()
        });
        let job_id = repo.insert(vec![account("nasa")]);

        let status = runner(&repo, &scraper, 2).run(job_id).await.unwrap();

        assert_eq!(status, Some(JobStatus::Failed));
        assert_eq!(repo.job(job_id).status, JobStatus::Failed);
        assert_eq!(*repo.terminal_attempts.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_finish_gives_up_after_max_attempts() {
        let repo = Arc::new(InMemoryJobRepository::default());
        *repo.lose_terminal_reports.lock().unwrap() = 10;
        let scraper = Arc::new(ScriptedScraper::healthy(vec![("nasa", Ok(100))]));
        let job_id = repo.insert(vec![account("nasa")]);

        assert!(runner(&repo, &scraper, 2).run(job_id).await.is_err());

        // Left for the server's stale-job sweep
        assert_eq!(repo.job(job_id).status, JobStatus::Running);
        assert_eq!(*repo.terminal_attempts.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_rejected_finish_is_not_retried() {
        let repo = Arc::new(InMemoryJobRepository::default());
        let scraper = Arc::new(ScriptedScraper::healthy(vec![("nasa", Ok(100))]));
        let job_id = repo.insert(vec![account("nasa")]);
        let runner = runner(&repo, &scraper, 2);

        runner.run(job_id).await.unwrap();
        let err = runner
            .report_terminal(job_id, "finish", || repo.finish_job(job_id))
            .await
            .unwrap_err();

        assert!(is_client_error(&err));
        assert_eq!(*repo.terminal_attempts.lock().unwrap(), 2);
    }
}
