//! Job poller
//!
//! Polls the server for pending jobs and runs them.
//! Each job runs in its own task; a semaphore caps how many run at once.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::Config;
use crate::repository::JobRepository;
use crate::service::JobRunner;

/// Job poller that continuously polls for and executes jobs
pub struct JobPoller {
    config: Config,
    jobs: Arc<dyn JobRepository>,
    runner: Arc<JobRunner>,
    semaphore: Arc<Semaphore>,
}

impl JobPoller {
    /// Creates a new job poller
    pub fn new(config: Config, jobs: Arc<dyn JobRepository>, runner: Arc<JobRunner>) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_parallel_jobs));
        Self {
            config,
            jobs,
            runner,
            semaphore,
        }
    }

    /// Starts the polling loop
    pub async fn run(&self) -> Result<()> {
        info!(
            "Starting job poller (interval: {:?}, max parallel jobs: {})",
            self.config.poll_interval, self.config.max_parallel_jobs
        );

        let mut interval = time::interval(self.config.poll_interval);

        loop {
            interval.tick().await;

            debug!("Polling for pending jobs");

            match self.poll_once().await {
                Ok(dispatched) => {
                    if dispatched > 0 {
                        info!("Dispatched {} job(s) this cycle", dispatched);
                    }
                }
                Err(e) => {
                    error!("Error during poll cycle: {:#}", e);
                }
            }
        }
    }

    /// Performs a single poll cycle
    ///
    /// Jobs beyond the free capacity are left PENDING for a later cycle.
    pub async fn poll_once(&self) -> Result<usize> {
        let jobs = self.jobs.fetch_pending_jobs().await?;

        if jobs.is_empty() {
            debug!("No jobs available");
            return Ok(0);
        }

        debug!("Found {} pending job(s)", jobs.len());

        let mut dispatched = 0;
        for job in jobs {
            // Try to acquire semaphore permit, skip if at max capacity
            match Arc::clone(&self.semaphore).try_acquire_owned() {
                Ok(permit) => {
                    self.spawn_job_task(job.id, permit);
                    dispatched += 1;
                }
                Err(_) => {
                    debug!("Max parallel jobs reached, leaving job {} for later", job.id);
                    break;
                }
            }
        }

        Ok(dispatched)
    }

    /// Spawns a task to run a single job
    fn spawn_job_task(&self, job_id: Uuid, permit: OwnedSemaphorePermit) -> JoinHandle<()> {
        let runner = Arc::clone(&self.runner);

        tokio::spawn(async move {
            match runner.run(job_id).await {
                Ok(Some(status)) => info!("Job {} ended as {}", job_id, status),
                Ok(None) => debug!("Job {} was taken by another runner", job_id),
                Err(e) => error!("Failed to run job {}: {:#}", job_id, e),
            }
            // Permit is released when dropped
            drop(permit);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryJobRepository;
    use crate::service::Scraper;
    use async_trait::async_trait;
    use pulse_core::domain::account::Account;
    use pulse_core::domain::job::JobStatus;
    use std::time::Duration;

    struct Unreachable;

    #[async_trait]
    impl Scraper for Unreachable {
        async fn health_check(&self) -> Result<()> {
            anyhow::bail!("unreachable")
        }

        async fn fetch_followers(
            &self,
            _account: &Account,
        ) -> std::result::Result<u64, crate::service::ScrapeError> {
            unreachable!("health check fails first")
        }
    }

    fn poller(repo: &Arc<InMemoryJobRepository>, max_parallel_jobs: usize) -> JobPoller {
        let mut config = Config::default();
        config.max_parallel_jobs = max_parallel_jobs;
        let runner = Arc::new(JobRunner::new(
            repo.clone(),
            Arc::new(Unreachable),
            config.runner_id.clone(),
            2,
        ));
        JobPoller::new(config, repo.clone(), runner)
    }

    #[tokio::test]
    async fn test_poll_once_without_jobs() {
        let repo = Arc::new(InMemoryJobRepository::default());
        assert_eq!(poller(&repo, 2).poll_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_poll_once_respects_parallel_limit() {
        let repo = Arc::new(InMemoryJobRepository::default());
        let ids: Vec<_> = (0..3).map(|_| repo.insert(Vec::new())).collect();
        let poller = poller(&repo, 2);

        assert_eq!(poller.poll_once().await.unwrap(), 2);

        // Empty jobs finish quickly; the left-over one is picked up next cycle
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(poller.poll_once().await.unwrap(), 1);
        tokio::time::sleep(Duration::from_millis(50)).await;

        for id in ids {
            let job = repo.job(id);
            assert_eq!(job.status, JobStatus::Completed);
            assert_eq!(job.runner_id.as_ref(), Some(&poller.config.runner_id));
        }
    }
}
