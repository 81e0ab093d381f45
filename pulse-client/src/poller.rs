//! Job progress poller
//!
//! [`ProgressPoller`] watches one scraping job at a time. It checks the job's
//! status immediately, then once per interval, publishing every observed
//! [`JobStatusView`] on a watch channel. When the job reaches COMPLETED or
//! FAILED, or turns out not to exist, the poller stops and delivers a single
//! [`PollOutcome`] to the caller.
//!
//! The poller owns its polling task. Calling [`ProgressPoller::stop`], watching
//! another job, or dropping the poller cancels the task, so no progress is
//! published after teardown.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use pulse_core::domain::job::JobStatus;
use pulse_core::dto::job::JobStatusView;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::PulseClient;
use crate::error::Result;

/// Time between two status checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Where the poller reads job status from
#[async_trait]
pub trait StatusSource: Send + Sync + 'static {
    async fn fetch_status(&self, job_id: Uuid) -> Result<JobStatusView>;
}

#[async_trait]
impl StatusSource for PulseClient {
    async fn fetch_status(&self, job_id: Uuid) -> Result<JobStatusView> {
        self.get_job_status(job_id).await
    }
}

/// Lifecycle of a poller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    /// No job is being watched
    Idle,
    /// Status checks are running for this job
    Polling(Uuid),
    /// A terminal outcome was delivered for this job
    Done(Uuid),
}

/// Terminal result of watching a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Completed { job_id: Uuid, status: JobStatusView },
    /// The job failed; some accounts may still have been scraped
    Failed { job_id: Uuid, status: JobStatusView },
    /// The server does not know the job
    NotFound { job_id: Uuid },
}

impl PollOutcome {
    pub fn job_id(&self) -> Uuid {
        match self {
            PollOutcome::Completed { job_id, .. }
            | PollOutcome::Failed { job_id, .. }
            | PollOutcome::NotFound { job_id } => *job_id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PollOutcome::Completed { .. })
    }

    /// Last status read before the poller stopped, if the job exists
    pub fn status(&self) -> Option<&JobStatusView> {
        match self {
            PollOutcome::Completed { status, .. } | PollOutcome::Failed { status, .. } => {
                Some(status)
            }
            PollOutcome::NotFound { .. } => None,
        }
    }

    fn from_terminal(job_id: Uuid, status: JobStatusView) -> Self {
        if status.status == JobStatus::Completed {
            PollOutcome::Completed { job_id, status }
        } else {
            PollOutcome::Failed { job_id, status }
        }
    }
}

/// Invoked once with the terminal outcome
pub type CompletionCallback = Box<dyn FnOnce(&PollOutcome) + Send + 'static>;

struct Shared {
    /// Bumped on every watch/stop; a task only completes its own generation
    generation: u64,
    state: PollerState,
    notify: Option<oneshot::Sender<PollOutcome>>,
    callback: Option<CompletionCallback>,
}

/// Watches a single job until it reaches a terminal state
pub struct ProgressPoller<S: StatusSource> {
    source: Arc<S>,
    interval: Duration,
    shared: Arc<Mutex<Shared>>,
    progress: Arc<watch::Sender<Option<JobStatusView>>>,
    task: Option<JoinHandle<()>>,
}

impl<S: StatusSource> ProgressPoller<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self::with_interval(source, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_interval(source: Arc<S>, interval: Duration) -> Self {
        let (progress, _) = watch::channel(None);
        Self {
            source,
            interval,
            shared: Arc::new(Mutex::new(Shared {
                generation: 0,
                state: PollerState::Idle,
                notify: None,
                callback: None,
            })),
            progress: Arc::new(progress),
            task: None,
        }
    }

    pub fn state(&self) -> PollerState {
        lock(&self.shared).state
    }

    /// Latest status observed for the watched job
    pub fn progress(&self) -> Option<JobStatusView> {
        self.progress.borrow().clone()
    }

    /// Receive every status observed from now on
    pub fn subscribe(&self) -> watch::Receiver<Option<JobStatusView>> {
        self.progress.subscribe()
    }

    /// Start watching `job_id`, replacing any job watched before
    ///
    /// The returned receiver yields the terminal outcome. It is closed without
    /// a value if the poller is stopped, dropped or pointed at another job
    /// first.
    pub fn watch(&mut self, job_id: Uuid) -> oneshot::Receiver<PollOutcome> {
        self.start(job_id, None)
    }

    /// Like [`watch`](Self::watch), also invoking `callback` with the outcome
    pub fn watch_with_callback<F>(
        &mut self,
        job_id: Uuid,
        callback: F,
    ) -> oneshot::Receiver<PollOutcome>
    where
        F: FnOnce(&PollOutcome) + Send + 'static,
    {
        self.start(job_id, Some(Box::new(callback)))
    }

    /// Cancel polling and return to Idle
    pub fn stop(&mut self) {
        self.abort_task();
        let mut shared = lock(&self.shared);
        shared.generation += 1;
        shared.state = PollerState::Idle;
        shared.notify = None;
        shared.callback = None;
    }

    fn start(
        &mut self,
        job_id: Uuid,
        callback: Option<CompletionCallback>,
    ) -> oneshot::Receiver<PollOutcome> {
        self.abort_task();

        let (tx, rx) = oneshot::channel();
        let generation = {
            let mut shared = lock(&self.shared);
            shared.generation += 1;
            shared.state = PollerState::Polling(job_id);
            shared.notify = Some(tx);
            shared.callback = callback;
            // Under the lock so a stale tick cannot publish after the reset
            self.progress.send_replace(None);
            shared.generation
        };

        tracing::debug!("Watching job {} every {:?}", job_id, self.interval);

        self.task = Some(tokio::spawn(poll_loop(
            Arc::clone(&self.source),
            self.interval,
            Arc::clone(&self.shared),
            Arc::clone(&self.progress),
            generation,
            job_id,
        )));

        rx
    }

    fn abort_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl<S: StatusSource> Drop for ProgressPoller<S> {
    fn drop(&mut self) {
        self.abort_task();
    }
}

async fn poll_loop<S: StatusSource>(
    source: Arc<S>,
    interval: Duration,
    shared: Arc<Mutex<Shared>>,
    progress: Arc<watch::Sender<Option<JobStatusView>>>,
    generation: u64,
    job_id: Uuid,
) {
    // The first tick completes immediately
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        match source.fetch_status(job_id).await {
            Ok(status) => {
                let terminal = status.status.is_terminal();
                if !publish(&shared, &progress, generation, status.clone()) {
                    return;
                }
                if terminal {
                    complete(&shared, generation, PollOutcome::from_terminal(job_id, status));
                    return;
                }
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!("Job {} not found, stopping", job_id);
                complete(&shared, generation, PollOutcome::NotFound { job_id });
                return;
            }
            Err(e) => {
                tracing::warn!("Status check for job {} failed, retrying: {}", job_id, e);
            }
        }
    }
}

/// Publish `status` if `generation` is still the one being watched
///
/// Returns false when the poller was stopped or moved to another job.
fn publish(
    shared: &Mutex<Shared>,
    progress: &watch::Sender<Option<JobStatusView>>,
    generation: u64,
    status: JobStatusView,
) -> bool {
    let shared = lock(shared);
    if shared.generation != generation {
        return false;
    }
    progress.send_replace(Some(status));
    true
}

/// Deliver the terminal outcome if `generation` is still the one being watched
///
/// Returns false when the outcome was already delivered or the poller moved on.
fn complete(shared: &Mutex<Shared>, generation: u64, outcome: PollOutcome) -> bool {
    let (notify, callback) = {
        let mut shared = lock(shared);
        if shared.generation != generation || !matches!(shared.state, PollerState::Polling(_)) {
            return false;
        }
        shared.state = PollerState::Done(outcome.job_id());
        (shared.notify.take(), shared.callback.take())
    };

    if let Some(callback) = callback {
        callback(&outcome);
    }
    if let Some(notify) = notify {
        // Receiver may have been dropped by a caller that only wanted the callback
        let _ = notify.send(outcome);
    }
    true
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TICK: Duration = Duration::from_millis(10);
    const WAIT: Duration = Duration::from_secs(2);

    /// Replays scripted responses; the last one repeats forever
    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<JobStatusView>>>,
        last: Mutex<Option<JobStatusView>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<JobStatusView>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                last: Mutex::new(None),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StatusSource for ScriptedSource {
        async fn fetch_status(&self, _job_id: Uuid) -> Result<JobStatusView> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.responses.lock().unwrap().pop_front();
            match next {
                Some(Ok(view)) => {
                    *self.last.lock().unwrap() = Some(view.clone());
                    Ok(view)
                }
                Some(Err(e)) => Err(e),
                None => self
                    .last
                    .lock()
                    .unwrap()
                    .clone()
                    .ok_or_else(|| ClientError::api_error(503, "no script")),
            }
        }
    }

    fn running(done: u32, total: u32) -> Result<JobStatusView> {
        Ok(JobStatusView::new(JobStatus::Running, done, total))
    }

    fn finished(status: JobStatus, done: u32, total: u32) -> Result<JobStatusView> {
        Ok(JobStatusView::new(status, done, total))
    }

    #[tokio::test]
    async fn test_first_check_is_immediate() {
        let source = ScriptedSource::new(vec![running(0, 3)]);
        let mut poller = ProgressPoller::with_interval(source.clone(), Duration::from_secs(3600));
        let job_id = Uuid::new_v4();

        let _rx = poller.watch(job_id);
        let mut progress = poller.subscribe();

        tokio::time::timeout(WAIT, progress.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(source.calls(), 1);
        assert_eq!(poller.state(), PollerState::Polling(job_id));
        assert_eq!(poller.progress().unwrap().total_accounts, 3);
    }

    #[tokio::test]
    async fn test_completion_fires_once_and_stops_polling() {
        let source = ScriptedSource::new(vec![
            running(0, 2),
            running(1, 2),
            finished(JobStatus::Completed, 2, 2),
        ]);
        let mut poller = ProgressPoller::with_interval(source.clone(), TICK);
        let job_id = Uuid::new_v4();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        let rx = poller.watch_with_callback(job_id, move |outcome| {
            assert!(outcome.is_success());
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let outcome = tokio::time::timeout(WAIT, rx).await.unwrap().unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.job_id(), job_id);
        assert_eq!(outcome.status().unwrap().progress, 100);
        assert_eq!(poller.state(), PollerState::Done(job_id));

        let calls = source.calls();
        tokio::time::sleep(TICK * 5).await;
        assert_eq!(source.calls(), calls);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_job_reports_failure_with_counts() {
        let source = ScriptedSource::new(vec![running(1, 3), finished(JobStatus::Failed, 3, 3)]);
        let mut poller = ProgressPoller::with_interval(source, TICK);
        let job_id = Uuid::new_v4();

        let outcome = tokio::time::timeout(WAIT, poller.watch(job_id))
            .await
            .unwrap()
            .unwrap();

        assert!(!outcome.is_success());
        assert!(matches!(outcome, PollOutcome::Failed { .. }));
        assert_eq!(outcome.status().unwrap().completed_count, 3);
    }

    #[tokio::test]
    async fn test_unknown_job_is_terminal() {
        let source = ScriptedSource::new(vec![Err(ClientError::api_error(404, "Job not found"))]);
        let mut poller = ProgressPoller::with_interval(source.clone(), TICK);
        let job_id = Uuid::new_v4();

        let outcome = tokio::time::timeout(WAIT, poller.watch(job_id))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome, PollOutcome::NotFound { job_id });
        assert_eq!(poller.state(), PollerState::Done(job_id));
        tokio::time::sleep(TICK * 5).await;
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let source = ScriptedSource::new(vec![
            Err(ClientError::api_error(503, "unavailable")),
            Err(ClientError::InternalError("connection reset".to_string())),
            finished(JobStatus::Completed, 1, 1),
        ]);
        let mut poller = ProgressPoller::with_interval(source.clone(), TICK);

        let outcome = tokio::time::timeout(WAIT, poller.watch(Uuid::new_v4()))
            .await
            .unwrap()
            .unwrap();

        assert!(outcome.is_success());
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn test_watching_another_job_abandons_the_first() {
        let source = ScriptedSource::new(vec![running(0, 5)]);
        let mut poller = ProgressPoller::with_interval(source, TICK);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        let first_rx = poller.watch(first);
        let _second_rx = poller.watch(second);

        assert!(first_rx.await.is_err());
        assert_eq!(poller.state(), PollerState::Polling(second));
    }

    #[tokio::test]
    async fn test_stop_cancels_polling() {
        let source = ScriptedSource::new(vec![running(0, 5)]);
        let mut poller = ProgressPoller::with_interval(source.clone(), TICK);

        let rx = poller.watch(Uuid::new_v4());
        tokio::time::sleep(TICK * 3).await;
        poller.stop();

        assert_eq!(poller.state(), PollerState::Idle);
        assert!(rx.await.is_err());

        let calls = source.calls();
        tokio::time::sleep(TICK * 5).await;
        assert_eq!(source.calls(), calls);
    }

    #[tokio::test]
    async fn test_drop_cancels_polling() {
        let source = ScriptedSource::new(vec![running(0, 5)]);
        let mut poller = ProgressPoller::with_interval(source.clone(), TICK);

        let rx = poller.watch(Uuid::new_v4());
        drop(poller);

        assert!(rx.await.is_err());
        let calls = source.calls();
        tokio::time::sleep(TICK * 5).await;
        assert_eq!(source.calls(), calls);
    }

    #[test]
    fn test_complete_is_fire_once() {
        let job_id = Uuid::new_v4();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let (tx, mut rx) = oneshot::channel();
        let shared = Mutex::new(Shared {
            generation: 7,
            state: PollerState::Polling(job_id),
            notify: Some(tx),
            callback: Some(Box::new(move |_: &PollOutcome| {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        });
        let outcome = PollOutcome::from_terminal(
            job_id,
            JobStatusView::new(JobStatus::Completed, 1, 1),
        );

        // Two ticks racing to report the same terminal state
        assert!(complete(&shared, 7, outcome.clone()));
        assert!(!complete(&shared, 7, outcome.clone()));

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(rx.try_recv().unwrap(), outcome);
        assert_eq!(lock(&shared).state, PollerState::Done(job_id));
    }

    #[test]
    fn test_complete_ignores_stale_generation() {
        let job_id = Uuid::new_v4();
        let (tx, mut rx) = oneshot::channel();
        let shared = Mutex::new(Shared {
            generation: 2,
            state: PollerState::Polling(job_id),
            notify: Some(tx),
            callback: None,
        });

        assert!(!complete(&shared, 1, PollOutcome::NotFound { job_id }));
        assert_eq!(lock(&shared).state, PollerState::Polling(job_id));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_publish_ignores_stale_generation() {
        let job_id = Uuid::new_v4();
        let shared = Mutex::new(Shared {
            generation: 3,
            state: PollerState::Polling(job_id),
            notify: None,
            callback: None,
        });
        let (progress, rx) = watch::channel(None);

        // A tick from the previous watch finishing after the re-watch
        let old = JobStatusView::new(JobStatus::Running, 4, 5);
        assert!(!publish(&shared, &progress, 2, old));
        assert!(rx.borrow().is_none());

        let current = JobStatusView::new(JobStatus::Running, 1, 2);
        assert!(publish(&shared, &progress, 3, current.clone()));
        assert_eq!(*rx.borrow(), Some(current));
    }

    #[tokio::test]
    async fn test_rewatch_clears_previous_progress() {
        let source = ScriptedSource::new(vec![running(2, 4)]);
        let mut poller = ProgressPoller::with_interval(source, Duration::from_secs(3600));
        let first = Uuid::new_v4();

        let _rx = poller.watch(first);
        let mut progress = poller.subscribe();
        tokio::time::timeout(WAIT, progress.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(poller.progress().is_some());

        poller.stop();
        let _rx = poller.watch(Uuid::new_v4());
        // The new task has not had a chance to run on this thread yet
        assert!(poller.progress().is_none());
    }
}
