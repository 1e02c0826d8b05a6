//! One sweep over the persisted watches. Loops in [`crate::Poller`] call
//! these on every tick; tests call them directly.

use chrono::{DateTime, Utc};
use os_core::types::{PrWatch, ReviewWatch, ReviewWatchId, WatchPhase};
use os_core::{GithubService, OverseerError, RequestContext, Store};
use tracing::{debug, info};

/// What a pass did, mostly for logs and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub checked: usize,
    pub changed: usize,
    pub removed: usize,
    pub failed: usize,
}

impl PassReport {
    fn record(&mut self, outcome: Result<Outcome, OverseerError>, what: &str, id: &str) {
        self.checked += 1;
        match outcome {
            Ok(Outcome::Unchanged) => {}
            Ok(Outcome::Changed(count)) => self.changed += count,
            Ok(Outcome::Removed) => self.removed += 1,
            Err(err) => {
                self.failed += 1;
                debug!(watch = what, watch_id = id, error = %err, "watch poll failed");
            }
        }
    }
}

enum Outcome {
    Unchanged,
    Changed(usize),
    Removed,
}

/// Searching watches look for their pull request; tracking watches fetch
/// feedback, report changes, and are removed once the PR is merged or closed.
pub async fn run_pr_pass<S: Store>(
    service: &GithubService<S>,
    ctx: &RequestContext,
) -> Result<PassReport, OverseerError> {
    let mut report = PassReport::default();
    if !service.is_available() {
        debug!("github unavailable; skipping pr pass");
        return Ok(report);
    }
    for watch in service.list_active_pr_watches()? {
        let outcome = poll_pr_watch(service, ctx, &watch).await;
        report.record(outcome, "pr", watch.id.as_str());
    }
    Ok(report)
}

async fn poll_pr_watch<S: Store>(
    service: &GithubService<S>,
    ctx: &RequestContext,
    watch: &PrWatch,
) -> Result<Outcome, OverseerError> {
    match watch.phase() {
        WatchPhase::Searching => Ok(match service.detect_pr_for_watch(ctx, watch).await? {
            Some(_) => Outcome::Changed(1),
            None => Outcome::Unchanged,
        }),
        WatchPhase::Tracking => {
            let (feedback, has_new) = service.check_pr_watch(watch).await?;
            if feedback.pr.state.is_terminal() {
                service.sync_task_pr(ctx, &watch.task_id, &feedback)?;
                service.delete_pr_watch(&watch.id)?;
                info!(
                    watch_id = %watch.id,
                    session_id = %watch.session_id,
                    pr_number = watch.pr_number,
                    state = ?feedback.pr.state,
                    "pull request finished; watch removed"
                );
                return Ok(Outcome::Removed);
            }
            if !has_new {
                return Ok(Outcome::Unchanged);
            }
            service.publish_feedback_changed(ctx, watch, &feedback);
            service.sync_task_pr(ctx, &watch.task_id, &feedback)?;
            Ok(Outcome::Changed(1))
        }
    }
}

/// Polls every enabled review watch that is due at `now` and announces
/// each newly discovered pull request. Polled watches are stamped with
/// `now`, so a watch stays on its own schedule however long the pass takes.
pub async fn run_review_pass<S: Store>(
    service: &GithubService<S>,
    ctx: &RequestContext,
    now: DateTime<Utc>,
) -> Result<PassReport, OverseerError> {
    let mut report = PassReport::default();
    if !service.is_available() {
        debug!("github unavailable; skipping review pass");
        return Ok(report);
    }
    for watch in service.list_enabled_review_watches()? {
        if !watch.is_due(now) {
            continue;
        }
        let outcome = poll_review_watch(service, ctx, &watch, now).await;
        report.record(outcome, "review", watch.id.as_str());
    }
    Ok(report)
}

/// Polls one review watch right away, ignoring its schedule. Unknown or
/// disabled watches are skipped.
pub async fn poll_review_watch_now<S: Store>(
    service: &GithubService<S>,
    ctx: &RequestContext,
    id: &ReviewWatchId,
) -> Result<PassReport, OverseerError> {
    let mut report = PassReport::default();
    let Some(watch) = service.get_review_watch(id)? else {
        debug!(review_watch_id = %id, "queued review watch no longer exists");
        return Ok(report);
    };
    if !watch.enabled {
        return Ok(report);
    }
    let outcome = poll_review_watch(service, ctx, &watch, Utc::now()).await;
    report.record(outcome, "review", watch.id.as_str());
    Ok(report)
}

async fn poll_review_watch<S: Store>(
    service: &GithubService<S>,
    ctx: &RequestContext,
    watch: &ReviewWatch,
    now: DateTime<Utc>,
) -> Result<Outcome, OverseerError> {
    let prs = service.check_review_watch(watch, now).await?;
    for pr in &prs {
        service.publish_review_pr_discovered(ctx, watch, pr);
    }
    if !prs.is_empty() {
        info!(review_watch_id = %watch.id, count = prs.len(), "pull requests awaiting review");
    }
    Ok(if prs.is_empty() {
        Outcome::Unchanged
    } else {
        Outcome::Changed(prs.len())
    })
}
