use crate::aggregate::{
    assemble_feedback, has_new_feedback, merge_check_sources, merge_comments, saturating_u32,
};
use crate::error::{GithubError, OverseerError, WatchError};
use crate::github::GithubClient;
use crate::pr_watches::PrWatchRepository;
use crate::query::build_review_queries;
use crate::review_watches::{ReviewPrTaskRepository, ReviewWatchRepository};
use crate::store::Store;
use crate::task_prs::TaskPrRepository;
use crate::trigger::ReviewPollTrigger;
use crate::types::{
    ChecksState, ClientKind, ClientStatus, CreatePrWatchInput, CreateReviewWatchInput, EventBody,
    PrFeedback, PrWatch, PrWatchId, PullRequest, RecordReviewPrTaskInput, ReviewEvent,
    ReviewPrTask, ReviewSummary, ReviewWatch, ReviewWatchId, TaskPr, UpdateReviewWatchInput,
    UpsertTaskPrInput,
};
use crate::validation::{
    clamp_poll_interval, validate_pr_watch_input, validate_review_watch_input,
    validate_review_watch_update,
};
use chrono::{DateTime, Utc};
use os_events::bus::EventBus;
use os_events::types::{EventRecord, EventSource};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub source: EventSource,
    pub correlation_id: Option<String>,
}

impl RequestContext {
    pub fn new(source: EventSource, correlation_id: Option<String>) -> Self {
        Self {
            source,
            correlation_id,
        }
    }

    pub fn poller() -> Self {
        Self::new(EventSource::Poller, None)
    }
}

/// Watch lifecycle, feedback aggregation and review-queue search over one
/// store and one remote client.
pub struct GithubService<S: Store> {
    store: Arc<Mutex<S>>,
    client: Arc<dyn GithubClient>,
    event_bus: EventBus,
    review_trigger: Option<ReviewPollTrigger>,
}

impl<S: Store> GithubService<S> {
    pub fn new(store: S, client: Arc<dyn GithubClient>, event_bus: EventBus) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            client,
            event_bus,
            review_trigger: None,
        }
    }

    #[must_use]
    pub fn with_review_trigger(mut self, trigger: ReviewPollTrigger) -> Self {
        self.review_trigger = Some(trigger);
        self
    }

    pub fn client_kind(&self) -> ClientKind {
        self.client.kind()
    }

    pub fn is_available(&self) -> bool {
        self.client.kind() != ClientKind::Noop
    }

    pub async fn status(&self) -> ClientStatus {
        let kind = self.client.kind();
        let available = self.is_available();
        let user = if available {
            match self.client.authenticated_user().await {
                Ok(user) => Some(user),
                Err(err) => {
                    debug!(error = %err, "could not resolve authenticated github user");
                    None
                }
            }
        } else {
            None
        };
        ClientStatus {
            kind,
            available,
            user,
        }
    }

    fn ensure_available(&self) -> Result<(), OverseerError> {
        if self.is_available() {
            Ok(())
        } else {
            Err(GithubError::NotAvailable.into())
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, S>, OverseerError> {
        self.store.lock().map_err(|_| OverseerError::Internal {
            message: "store lock poisoned".to_string(),
        })
    }

    fn with_store<T, F>(&self, f: F) -> Result<T, OverseerError>
    where
        F: FnOnce(&S) -> Result<T, OverseerError>,
    {
        let store = self.lock()?;
        f(&store)
    }

    fn with_tx<T, F>(&self, f: F) -> Result<T, OverseerError>
    where
        F: FnOnce(&S) -> Result<T, OverseerError>,
    {
        let store = self.lock()?;
        store.with_tx(f)
    }

    fn publish(&self, ctx: &RequestContext, body: EventBody) {
        let kind = body.kind();
        let record = match build_event_record(ctx, body) {
            Ok(record) => record,
            Err(err) => {
                debug!(event = kind, error = %err, "failed to encode event");
                return;
            }
        };
        if self.event_bus.publish(record).is_err() {
            debug!(event = kind, "event dropped: no subscribers");
        }
    }

    // PR watches

    pub fn create_pr_watch(&self, input: CreatePrWatchInput) -> Result<PrWatch, OverseerError> {
        validate_pr_watch_input(&input)?;
        self.with_tx(|store| {
            if let Some(existing) = store.pr_watches().get_by_session(&input.session_id)? {
                return Ok(existing);
            }
            let watch = store.pr_watches().create(input)?;
            info!(
                watch_id = %watch.id,
                session_id = %watch.session_id,
                owner = %watch.owner,
                repo = %watch.repo,
                pr_number = watch.pr_number,
                "pr watch created"
            );
            Ok(watch)
        })
    }

    pub fn get_pr_watch(&self, id: &PrWatchId) -> Result<Option<PrWatch>, OverseerError> {
        self.with_store(|store| Ok(store.pr_watches().get(id)?))
    }

    pub fn get_pr_watch_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<PrWatch>, OverseerError> {
        self.with_store(|store| Ok(store.pr_watches().get_by_session(session_id)?))
    }

    pub fn list_active_pr_watches(&self) -> Result<Vec<PrWatch>, OverseerError> {
        self.with_store(|store| Ok(store.pr_watches().list()?))
    }

    pub fn list_pr_watches_for_task(&self, task_id: &str) -> Result<Vec<PrWatch>, OverseerError> {
        self.with_store(|store| Ok(store.pr_watches().list_for_task(task_id)?))
    }

    pub fn delete_pr_watch(&self, id: &PrWatchId) -> Result<(), OverseerError> {
        self.with_store(|store| Ok(store.pr_watches().delete(id)?))?;
        info!(watch_id = %id, "pr watch deleted");
        Ok(())
    }

    // Feedback

    pub async fn get_pr_feedback(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<PrFeedback, OverseerError> {
        self.ensure_available()?;
        let pr = self.client.get_pr(owner, repo, number).await?;
        let git_ref = pr.checks_ref().to_string();
        let (reviews, review_comments, issue_comments, check_runs, statuses) = futures::join!(
            self.client.list_reviews(owner, repo, number),
            self.client.list_review_comments(owner, repo, number, None),
            self.client.list_issue_comments(owner, repo, number, None),
            self.client.list_check_runs(owner, repo, &git_ref),
            self.client.list_status_contexts(owner, repo, &git_ref),
        );
        let statuses = statuses.unwrap_or_else(|err| {
            debug!(owner, repo, pr_number = number, error = %err, "status contexts unavailable");
            Vec::new()
        });
        let comments = merge_comments(review_comments?, issue_comments?);
        let checks = merge_check_sources(check_runs?, statuses);
        Ok(assemble_feedback(pr, reviews?, comments, checks))
    }

    /// Fetches current feedback for a tracking watch and records what was
    /// seen. The returned flag is true when there is something new.
    pub async fn check_pr_watch(
        &self,
        watch: &PrWatch,
    ) -> Result<(PrFeedback, bool), OverseerError> {
        if watch.pr_number == 0 {
            return Err(WatchError::InvalidInput {
                message: format!("watch {} has no pull request yet", watch.id),
            }
            .into());
        }
        let feedback = self
            .get_pr_feedback(&watch.owner, &watch.repo, watch.pr_number)
            .await?;
        let has_new = has_new_feedback(watch, &feedback);
        let last_comment_at = feedback.last_comment_at.or(watch.last_comment_at);
        self.with_store(|store| {
            store.pr_watches().record_check(
                &watch.id,
                Utc::now(),
                last_comment_at,
                feedback.checks_state,
            )?;
            Ok(())
        })?;
        Ok((feedback, has_new))
    }

    /// Looks for an open pull request on the watch's branch. A miss or a
    /// remote failure only advances `last_checked_at`.
    pub async fn detect_pr_for_watch(
        &self,
        ctx: &RequestContext,
        watch: &PrWatch,
    ) -> Result<Option<TaskPr>, OverseerError> {
        self.ensure_available()?;
        if watch.pr_number != 0 {
            return Err(WatchError::InvalidInput {
                message: format!("watch {} already tracks #{}", watch.id, watch.pr_number),
            }
            .into());
        }
        let found = self
            .client
            .find_pr_by_branch(&watch.owner, &watch.repo, &watch.branch)
            .await;
        let pr = match found {
            Ok(Some(pr)) => pr,
            Ok(None) => {
                debug!(watch_id = %watch.id, branch = %watch.branch, "no open pull request for branch");
                self.touch_watch(&watch.id)?;
                return Ok(None);
            }
            Err(err) => {
                debug!(watch_id = %watch.id, branch = %watch.branch, error = %err, "pull request lookup failed");
                self.touch_watch(&watch.id)?;
                return Ok(None);
            }
        };

        let input = detected_task_pr(&watch.task_id, &pr);
        let task_pr = self.with_tx(|store| {
            store
                .pr_watches()
                .set_pr_number(&watch.id, pr.number, Utc::now())?;
            // An earlier session may already have synced this PR's summary.
            match store.task_prs().get(&watch.task_id, pr.number)? {
                Some(existing) => Ok(existing),
                None => Ok(store.task_prs().upsert(input)?),
            }
        })?;
        info!(
            watch_id = %watch.id,
            task_id = %watch.task_id,
            owner = %pr.owner,
            repo = %pr.repo,
            pr_number = pr.number,
            "pull request detected"
        );
        self.publish(
            ctx,
            EventBody::TaskPrUpdated {
                task_pr: task_pr.clone(),
            },
        );
        Ok(Some(task_pr))
    }

    fn touch_watch(&self, id: &PrWatchId) -> Result<(), OverseerError> {
        self.with_store(|store| {
            store.pr_watches().touch(id, Utc::now())?;
            Ok(())
        })
    }

    // Task/PR association

    pub async fn associate_pr_with_task(
        &self,
        ctx: &RequestContext,
        task_id: &str,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<TaskPr, OverseerError> {
        if task_id.trim().is_empty() {
            return Err(WatchError::InvalidInput {
                message: "task_id is required".to_string(),
            }
            .into());
        }
        let feedback = self.get_pr_feedback(owner, repo, number).await?;
        self.sync_task_pr(ctx, task_id, &feedback)
    }

    /// Rewrites every summary field of the task/PR row from `feedback`.
    pub fn sync_task_pr(
        &self,
        ctx: &RequestContext,
        task_id: &str,
        feedback: &PrFeedback,
    ) -> Result<TaskPr, OverseerError> {
        let input = synced_task_pr(task_id, feedback);
        let task_pr = self.with_store(|store| Ok(store.task_prs().upsert(input)?))?;
        self.publish(
            ctx,
            EventBody::TaskPrUpdated {
                task_pr: task_pr.clone(),
            },
        );
        Ok(task_pr)
    }

    pub fn get_task_pr(
        &self,
        task_id: &str,
        pr_number: u64,
    ) -> Result<Option<TaskPr>, OverseerError> {
        self.with_store(|store| Ok(store.task_prs().get(task_id, pr_number)?))
    }

    pub fn list_task_prs(&self, task_id: &str) -> Result<Vec<TaskPr>, OverseerError> {
        self.with_store(|store| Ok(store.task_prs().list_for_task(task_id)?))
    }

    pub fn publish_feedback_changed(
        &self,
        ctx: &RequestContext,
        watch: &PrWatch,
        feedback: &PrFeedback,
    ) {
        self.publish(
            ctx,
            EventBody::PrFeedbackChanged {
                watch_id: watch.id.clone(),
                session_id: watch.session_id.clone(),
                task_id: watch.task_id.clone(),
                owner: watch.owner.clone(),
                repo: watch.repo.clone(),
                pr_number: feedback.pr.number,
                comment_count: saturating_u32(feedback.comments.len()),
                checks_state: feedback.checks_state,
                review_state: feedback.review_state,
                pending_review_count: feedback.pending_review_count,
            },
        );
    }

    pub async fn submit_review(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        event: ReviewEvent,
        body: &str,
    ) -> Result<(), OverseerError> {
        self.ensure_available()?;
        self.client
            .submit_review(owner, repo, number, event, body)
            .await?;
        info!(owner, repo, pr_number = number, event = ?event, "review submitted");
        Ok(())
    }

    pub async fn list_open_prs(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<PullRequest>, OverseerError> {
        self.ensure_available()?;
        Ok(self.client.list_open_prs(owner, repo).await?)
    }

    // Review watches

    pub fn create_review_watch(
        &self,
        mut input: CreateReviewWatchInput,
    ) -> Result<ReviewWatch, OverseerError> {
        validate_review_watch_input(&input)?;
        input.poll_interval_seconds = Some(clamp_poll_interval(input.poll_interval_seconds));
        let watch = self.with_store(|store| Ok(store.review_watches().create(input)?))?;
        info!(
            review_watch_id = %watch.id,
            workspace_id = %watch.workspace_id,
            "review watch created"
        );
        if let Some(trigger) = &self.review_trigger {
            if watch.enabled {
                trigger.request(&watch.id);
            }
        }
        Ok(watch)
    }

    pub fn get_review_watch(&self, id: &ReviewWatchId) -> Result<Option<ReviewWatch>, OverseerError> {
        self.with_store(|store| Ok(store.review_watches().get(id)?))
    }

    pub fn list_review_watches(&self, workspace_id: &str) -> Result<Vec<ReviewWatch>, OverseerError> {
        self.with_store(|store| Ok(store.review_watches().list_for_workspace(workspace_id)?))
    }

    pub fn list_enabled_review_watches(&self) -> Result<Vec<ReviewWatch>, OverseerError> {
        self.with_store(|store| Ok(store.review_watches().list_enabled()?))
    }

    pub fn update_review_watch(
        &self,
        id: &ReviewWatchId,
        mut patch: UpdateReviewWatchInput,
    ) -> Result<ReviewWatch, OverseerError> {
        validate_review_watch_update(&patch)?;
        if let Some(secs) = patch.poll_interval_seconds {
            patch.poll_interval_seconds = Some(clamp_poll_interval(Some(secs)));
        }
        self.with_store(|store| Ok(store.review_watches().update(id, patch)?))
    }

    pub fn delete_review_watch(&self, id: &ReviewWatchId) -> Result<(), OverseerError> {
        self.with_store(|store| Ok(store.review_watches().delete(id)?))?;
        info!(review_watch_id = %id, "review watch deleted");
        Ok(())
    }

    /// Pull requests awaiting review for `watch` that have not been handled
    /// yet. Nothing is recorded in the ledger here; callers record each PR
    /// once downstream work exists. A successful poll is stamped with `now`,
    /// the time the caller scheduled it.
    pub async fn check_review_watch(
        &self,
        watch: &ReviewWatch,
        now: DateTime<Utc>,
    ) -> Result<Vec<PullRequest>, OverseerError> {
        self.ensure_available()?;
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        for query in build_review_queries(watch) {
            for pr in self.client.search_prs(&query).await? {
                if seen.insert(pr.key()) {
                    found.push(pr);
                }
            }
        }

        let mut fresh = self.with_store(|store| {
            let ledger = store.review_pr_tasks();
            let mut fresh = Vec::with_capacity(found.len());
            for pr in found {
                if !ledger.exists(&watch.id, &pr.owner, &pr.repo, pr.number)? {
                    fresh.push(pr);
                }
            }
            Ok(fresh)
        })?;

        for pr in &mut fresh {
            if !pr.lacks_branches() {
                continue;
            }
            match self.client.get_pr(&pr.owner, &pr.repo, pr.number).await {
                Ok(full) => *pr = full,
                Err(err) => debug!(
                    review_watch_id = %watch.id,
                    owner = %pr.owner,
                    repo = %pr.repo,
                    pr_number = pr.number,
                    error = %err,
                    "could not enrich search result"
                ),
            }
        }

        self.with_store(|store| {
            store.review_watches().set_last_polled(&watch.id, now)?;
            Ok(())
        })?;
        Ok(fresh)
    }

    pub fn record_review_pr_task(
        &self,
        input: RecordReviewPrTaskInput,
    ) -> Result<ReviewPrTask, OverseerError> {
        self.with_store(|store| Ok(store.review_pr_tasks().record(input)?))
    }

    pub fn list_review_pr_tasks(
        &self,
        review_watch_id: &ReviewWatchId,
    ) -> Result<Vec<ReviewPrTask>, OverseerError> {
        self.with_store(|store| Ok(store.review_pr_tasks().list_for_watch(review_watch_id)?))
    }

    pub fn publish_review_pr_discovered(
        &self,
        ctx: &RequestContext,
        watch: &ReviewWatch,
        pr: &PullRequest,
    ) {
        self.publish(
            ctx,
            EventBody::ReviewPrDiscovered {
                review_watch_id: watch.id.clone(),
                workspace_id: watch.workspace_id.clone(),
                workflow_id: watch.workflow_id.clone(),
                workflow_step_id: watch.workflow_step_id.clone(),
                agent_profile_id: watch.agent_profile_id.clone(),
                executor_profile_id: watch.executor_profile_id.clone(),
                prompt: watch.prompt.clone(),
                pr: pr.clone(),
            },
        );
    }
}

fn detected_task_pr(task_id: &str, pr: &PullRequest) -> UpsertTaskPrInput {
    UpsertTaskPrInput {
        task_id: task_id.to_string(),
        owner: pr.owner.clone(),
        repo: pr.repo.clone(),
        pr_number: pr.number,
        pr_url: pr.url.clone(),
        title: pr.title.clone(),
        head_branch: pr.head_branch.clone(),
        base_branch: pr.base_branch.clone(),
        author: pr.author.clone(),
        state: pr.state,
        review_state: ReviewSummary::None,
        checks_state: ChecksState::None,
        review_count: 0,
        pending_review_count: saturating_u32(pr.requested_reviewers.len()),
        comment_count: 0,
        additions: pr.additions,
        deletions: pr.deletions,
        merged_at: pr.merged_at,
        closed_at: pr.closed_at,
    }
}

fn synced_task_pr(task_id: &str, feedback: &PrFeedback) -> UpsertTaskPrInput {
    UpsertTaskPrInput {
        review_state: feedback.review_state,
        checks_state: feedback.checks_state,
        review_count: saturating_u32(feedback.reviews.len()),
        pending_review_count: feedback.pending_review_count,
        comment_count: saturating_u32(feedback.comments.len()),
        ..detected_task_pr(task_id, &feedback.pr)
    }
}

fn build_event_record(ctx: &RequestContext, body: EventBody) -> Result<EventRecord, OverseerError> {
    let value = serde_json::to_value(body).map_err(|err| OverseerError::Internal {
        message: err.to_string(),
    })?;
    Ok(EventRecord {
        id: format!("evt_{}", ulid::Ulid::new()),
        at: Utc::now(),
        correlation_id: ctx.correlation_id.clone(),
        source: ctx.source,
        body: value,
    })
}
