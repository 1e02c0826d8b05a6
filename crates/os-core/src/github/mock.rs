//! Deterministic in-memory client. Fixtures are injected explicitly; nothing
//! touches the network.

use crate::error::GithubError;
use crate::github::GithubClient;
use crate::types::{
    CheckRun, ClientKind, Comment, CommentKind, PrState, PullRequest, Review, ReviewEvent,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

type PrKey = (String, String, u64);
type RefKey = (String, String, String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedReview {
    pub owner: String,
    pub repo: String,
    pub number: u64,
    pub event: ReviewEvent,
    pub body: String,
}

#[derive(Default)]
struct MockState {
    user: String,
    prs: BTreeMap<PrKey, PullRequest>,
    reviews: HashMap<PrKey, Vec<Review>>,
    review_comments: HashMap<PrKey, Vec<Comment>>,
    issue_comments: HashMap<PrKey, Vec<Comment>>,
    check_runs: HashMap<RefKey, Vec<CheckRun>>,
    status_contexts: HashMap<RefKey, Vec<CheckRun>>,
    review_queue: Vec<PrKey>,
    search_overrides: HashMap<String, Vec<PullRequest>>,
    failing: HashSet<&'static str>,
    delays: HashMap<&'static str, Duration>,
    calls: HashMap<&'static str, usize>,
    submitted: Vec<SubmittedReview>,
}

pub struct MockClient {
    state: Mutex<MockState>,
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

fn key(owner: &str, repo: &str, number: u64) -> PrKey {
    (owner.to_string(), repo.to_string(), number)
}

fn ref_key(owner: &str, repo: &str, git_ref: &str) -> RefKey {
    (owner.to_string(), repo.to_string(), git_ref.to_string())
}

impl MockClient {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                user: "mock-user".to_string(),
                ..MockState::default()
            }),
        }
    }

    /// An open pull request fixture with sensible defaults.
    pub fn sample_pr(owner: &str, repo: &str, number: u64, branch: &str) -> PullRequest {
        PullRequest {
            owner: owner.to_string(),
            repo: repo.to_string(),
            number,
            title: format!("PR #{number}"),
            url: format!("https://github.com/{owner}/{repo}/pull/{number}"),
            state: PrState::Open,
            author: "octocat".to_string(),
            head_branch: branch.to_string(),
            head_sha: format!("sha-{number}"),
            base_branch: "main".to_string(),
            draft: false,
            mergeable: Some(true),
            additions: 10,
            deletions: 2,
            requested_reviewers: Vec::new(),
            created_at: Some(Utc::now()),
            updated_at: Some(Utc::now()),
            merged_at: None,
            closed_at: None,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not wedge the remaining assertions.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Counts the call, then waits out any latency set with [`Self::delay`].
    async fn pause(&self, method: &'static str) {
        let delay = {
            let mut state = self.lock();
            *state.calls.entry(method).or_default() += 1;
            state.delays.get(method).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn enter(&self, method: &'static str) -> Result<MutexGuard<'_, MockState>, GithubError> {
        let state = self.lock();
        if state.failing.contains(method) {
            return Err(GithubError::Transport {
                message: format!("injected failure in {method}"),
            });
        }
        Ok(state)
    }

    pub fn set_user(&self, user: &str) {
        self.lock().user = user.to_string();
    }

    pub fn add_pr(&self, pr: PullRequest) {
        let mut state = self.lock();
        state.prs.insert(pr.key(), pr);
    }

    /// Moves a fixture to `state`, stamping merge/close times the way GitHub does.
    pub fn set_pr_state(&self, owner: &str, repo: &str, number: u64, pr_state: PrState) {
        let mut state = self.lock();
        if let Some(pr) = state.prs.get_mut(&key(owner, repo, number)) {
            pr.state = pr_state;
            match pr_state {
                PrState::Merged => {
                    pr.merged_at = Some(Utc::now());
                    pr.closed_at = Some(Utc::now());
                }
                PrState::Closed => pr.closed_at = Some(Utc::now()),
                PrState::Open => {
                    pr.merged_at = None;
                    pr.closed_at = None;
                }
            }
        }
    }

    pub fn set_reviews(&self, owner: &str, repo: &str, number: u64, reviews: Vec<Review>) {
        self.lock().reviews.insert(key(owner, repo, number), reviews);
    }

    pub fn add_comment(&self, owner: &str, repo: &str, number: u64, comment: Comment) {
        let mut state = self.lock();
        let bucket = match comment.kind {
            CommentKind::Review => &mut state.review_comments,
            CommentKind::Issue => &mut state.issue_comments,
        };
        bucket
            .entry(key(owner, repo, number))
            .or_default()
            .push(comment);
    }

    pub fn set_check_runs(&self, owner: &str, repo: &str, git_ref: &str, runs: Vec<CheckRun>) {
        self.lock()
            .check_runs
            .insert(ref_key(owner, repo, git_ref), runs);
    }

    pub fn set_status_contexts(
        &self,
        owner: &str,
        repo: &str,
        git_ref: &str,
        statuses: Vec<CheckRun>,
    ) {
        self.lock()
            .status_contexts
            .insert(ref_key(owner, repo, git_ref), statuses);
    }

    /// Places an existing fixture in the authenticated user's review queue.
    pub fn request_review(&self, owner: &str, repo: &str, number: u64) {
        let mut state = self.lock();
        let pr_key = key(owner, repo, number);
        if !state.review_queue.contains(&pr_key) {
            state.review_queue.push(pr_key);
        }
    }

    /// Pins the exact result of one search query.
    pub fn set_search_results(&self, query: &str, prs: Vec<PullRequest>) {
        self.lock()
            .search_overrides
            .insert(query.to_string(), prs);
    }

    pub fn fail(&self, method: &'static str) {
        self.lock().failing.insert(method);
    }

    /// Makes every later call to `method` take at least `by`.
    pub fn delay(&self, method: &'static str, by: Duration) {
        self.lock().delays.insert(method, by);
    }

    pub fn recover(&self, method: &'static str) {
        self.lock().failing.remove(method);
    }

    pub fn calls(&self, method: &str) -> usize {
        self.lock().calls.get(method).copied().unwrap_or(0)
    }

    pub fn submitted_reviews(&self) -> Vec<SubmittedReview> {
        self.lock().submitted.clone()
    }
}

fn strip_branches(pr: &PullRequest) -> PullRequest {
    PullRequest {
        head_branch: String::new(),
        head_sha: String::new(),
        base_branch: String::new(),
        ..pr.clone()
    }
}

fn matches_qualifiers(pr: &PullRequest, query: &str) -> bool {
    for token in query.split_whitespace() {
        if let Some(full) = token.strip_prefix("repo:") {
            if full != format!("{}/{}", pr.owner, pr.repo) {
                return false;
            }
        } else if let Some(org) = token.strip_prefix("org:") {
            if org != pr.owner {
                return false;
            }
        }
    }
    true
}

fn since_filter(comments: Option<&Vec<Comment>>, since: Option<DateTime<Utc>>) -> Vec<Comment> {
    comments
        .map(|items| {
            items
                .iter()
                .filter(|comment| since.is_none_or(|since| comment.created_at > since))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl GithubClient for MockClient {
    fn kind(&self) -> ClientKind {
        ClientKind::Mock
    }

    async fn authenticated_user(&self) -> Result<String, GithubError> {
        self.pause("authenticated_user").await;
        let state = self.enter("authenticated_user")?;
        Ok(state.user.clone())
    }

    async fn get_pr(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<PullRequest, GithubError> {
        self.pause("get_pr").await;
        let state = self.enter("get_pr")?;
        state
            .prs
            .get(&key(owner, repo, number))
            .cloned()
            .ok_or_else(|| GithubError::NotFound {
                what: format!("{owner}/{repo}#{number}"),
            })
    }

    async fn find_pr_by_branch(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<Option<PullRequest>, GithubError> {
        self.pause("find_pr_by_branch").await;
        let state = self.enter("find_pr_by_branch")?;
        Ok(state
            .prs
            .values()
            .find(|pr| {
                pr.owner == owner
                    && pr.repo == repo
                    && pr.head_branch == branch
                    && pr.state == PrState::Open
            })
            .cloned())
    }

    async fn list_open_prs(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<PullRequest>, GithubError> {
        self.pause("list_open_prs").await;
        let state = self.enter("list_open_prs")?;
        Ok(state
            .prs
            .values()
            .filter(|pr| pr.owner == owner && pr.repo == repo && pr.state == PrState::Open)
            .cloned()
            .collect())
    }

    async fn search_prs(&self, query: &str) -> Result<Vec<PullRequest>, GithubError> {
        self.pause("search_prs").await;
        let state = self.enter("search_prs")?;
        if let Some(pinned) = state.search_overrides.get(query) {
            return Ok(pinned.clone());
        }
        Ok(state
            .review_queue
            .iter()
            .filter_map(|pr_key| state.prs.get(pr_key))
            .filter(|pr| pr.state == PrState::Open && matches_qualifiers(pr, query))
            .map(strip_branches)
            .collect())
    }

    async fn list_reviews(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<Vec<Review>, GithubError> {
        self.pause("list_reviews").await;
        let state = self.enter("list_reviews")?;
        Ok(state
            .reviews
            .get(&key(owner, repo, number))
            .cloned()
            .unwrap_or_default())
    }

    async fn list_review_comments(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Comment>, GithubError> {
        self.pause("list_review_comments").await;
        let state = self.enter("list_review_comments")?;
        Ok(since_filter(
            state.review_comments.get(&key(owner, repo, number)),
            since,
        ))
    }

    async fn list_issue_comments(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Comment>, GithubError> {
        self.pause("list_issue_comments").await;
        let state = self.enter("list_issue_comments")?;
        Ok(since_filter(
            state.issue_comments.get(&key(owner, repo, number)),
            since,
        ))
    }

    async fn list_check_runs(
        &self,
        owner: &str,
        repo: &str,
        git_ref: &str,
    ) -> Result<Vec<CheckRun>, GithubError> {
        self.pause("list_check_runs").await;
        let state = self.enter("list_check_runs")?;
        Ok(state
            .check_runs
            .get(&ref_key(owner, repo, git_ref))
            .cloned()
            .unwrap_or_default())
    }

    async fn list_status_contexts(
        &self,
        owner: &str,
        repo: &str,
        git_ref: &str,
    ) -> Result<Vec<CheckRun>, GithubError> {
        self.pause("list_status_contexts").await;
        let state = self.enter("list_status_contexts")?;
        Ok(state
            .status_contexts
            .get(&ref_key(owner, repo, git_ref))
            .cloned()
            .unwrap_or_default())
    }

    async fn submit_review(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        event: ReviewEvent,
        body: &str,
    ) -> Result<(), GithubError> {
        self.pause("submit_review").await;
        let mut state = self.enter("submit_review")?;
        if !state.prs.contains_key(&key(owner, repo, number)) {
            return Err(GithubError::NotFound {
                what: format!("{owner}/{repo}#{number}"),
            });
        }
        state.submitted.push(SubmittedReview {
            owner: owner.to_string(),
            repo: repo.to_string(),
            number,
            event,
            body: body.to_string(),
        });
        Ok(())
    }
}
