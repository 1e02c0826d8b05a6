//! Background loops that keep PR watches and review watches current.

pub mod config;
pub mod pass;

pub use config::PollerConfig;
pub use pass::{PassReport, poll_review_watch_now, run_pr_pass, run_review_pass};

use chrono::{DateTime, Utc};
use os_core::types::ReviewWatchId;
use os_core::{GithubService, RequestContext, ReviewPollQueue, Store};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Owns the PR-feedback loop and the review-queue loop.
pub struct Poller<S: Store> {
    service: Arc<GithubService<S>>,
    config: PollerConfig,
    queue: Option<ReviewPollQueue>,
    running: Option<Running>,
}

struct Running {
    cancel: CancellationToken,
    pr_loop: JoinHandle<()>,
    review_loop: JoinHandle<Option<ReviewPollQueue>>,
}

impl<S: Store + Send + 'static> Poller<S> {
    pub fn new(service: Arc<GithubService<S>>, config: PollerConfig) -> Self {
        Self {
            service,
            config,
            queue: None,
            running: None,
        }
    }

    /// Review watch ids received here are polled immediately by the review loop.
    #[must_use]
    pub fn with_review_queue(mut self, queue: ReviewPollQueue) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Spawns both loops. Does nothing when they are already running.
    pub fn start(&mut self) {
        if self.running.is_some() {
            debug!("poller already running");
            return;
        }
        let cancel = CancellationToken::new();
        let pr_loop = tokio::spawn(pr_loop(
            Arc::clone(&self.service),
            self.config.pr_interval,
            cancel.clone(),
        ));
        let review_loop = tokio::spawn(review_loop(
            Arc::clone(&self.service),
            self.config.review_tick(),
            self.queue.take(),
            cancel.clone(),
        ));
        info!(
            pr_interval_secs = self.config.pr_interval.as_secs(),
            review_tick_secs = self.config.review_tick().as_secs(),
            "poller started"
        );
        self.running = Some(Running {
            cancel,
            pr_loop,
            review_loop,
        });
    }

    /// Cancels both loops and waits for them to exit. Does nothing when
    /// the poller is not running.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        running.cancel.cancel();
        if let Err(err) = running.pr_loop.await {
            warn!(error = %err, "pr loop ended abnormally");
        }
        match running.review_loop.await {
            Ok(queue) => self.queue = queue,
            Err(err) => warn!(error = %err, "review loop ended abnormally"),
        }
        info!("poller stopped");
    }
}

impl<S: Store> Drop for Poller<S> {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            running.cancel.cancel();
        }
    }
}

fn ticker(period: Duration) -> Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn pr_loop<S: Store + Send + 'static>(
    service: Arc<GithubService<S>>,
    period: Duration,
    cancel: CancellationToken,
) {
    let ctx = RequestContext::poller();
    let mut interval = ticker(period);
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }
        match run_pr_pass(&service, &ctx).await {
            Ok(report) => debug!(?report, "pr pass finished"),
            Err(err) => warn!(error = %err, "pr pass failed"),
        }
    }
}

enum Wake {
    Tick(Instant),
    Queued(Option<ReviewWatchId>),
}

/// Maps a scheduled tick onto the wall clock read when the loop started.
/// Using the tick's deadline rather than the time the task woke keeps
/// consecutive passes exactly one period apart.
fn scheduled_at(origin: (Instant, DateTime<Utc>), tick: Instant) -> DateTime<Utc> {
    let elapsed = tick.saturating_duration_since(origin.0);
    origin.1 + chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero())
}

async fn next_queued(queue: &mut Option<ReviewPollQueue>) -> Option<ReviewWatchId> {
    match queue {
        Some(queue) => queue.recv().await,
        None => std::future::pending().await,
    }
}

async fn review_loop<S: Store + Send + 'static>(
    service: Arc<GithubService<S>>,
    period: Duration,
    mut queue: Option<ReviewPollQueue>,
    cancel: CancellationToken,
) -> Option<ReviewPollQueue> {
    let ctx = RequestContext::poller();
    let origin = (Instant::now(), Utc::now());
    let mut interval = ticker(period);
    loop {
        let wake = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            tick = interval.tick() => Wake::Tick(tick),
            id = next_queued(&mut queue) => Wake::Queued(id),
        };
        let result = match wake {
            Wake::Tick(tick) => run_review_pass(&service, &ctx, scheduled_at(origin, tick)).await,
            Wake::Queued(Some(id)) => poll_review_watch_now(&service, &ctx, &id).await,
            Wake::Queued(None) => {
                debug!("review poll queue closed");
                queue = None;
                continue;
            }
        };
        match result {
            Ok(report) => debug!(?report, "review pass finished"),
            Err(err) => warn!(error = %err, "review pass failed"),
        }
    }
    queue
}
