//! Remote capability over the GitHub API.
//!
//! Every concrete client converts its own wire shapes into the domain types in
//! [`crate::types::github`] through the helpers in [`convert`], so state
//! normalisation lives in exactly one place.

pub mod convert;
pub mod mock;
pub mod noop;

use crate::error::GithubError;
use crate::types::{CheckRun, ClientKind, Comment, PullRequest, Review, ReviewEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use mock::MockClient;
pub use noop::NoopClient;

#[async_trait]
pub trait GithubClient: Send + Sync {
    fn kind(&self) -> ClientKind;

    async fn authenticated_user(&self) -> Result<String, GithubError>;

    async fn get_pr(&self, owner: &str, repo: &str, number: u64)
        -> Result<PullRequest, GithubError>;

    /// Open pull request whose head is `branch`, if any.
    async fn find_pr_by_branch(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<Option<PullRequest>, GithubError>;

    async fn list_open_prs(&self, owner: &str, repo: &str)
        -> Result<Vec<PullRequest>, GithubError>;

    /// Issue search restricted to pull requests. Results carry no branch details.
    async fn search_prs(&self, query: &str) -> Result<Vec<PullRequest>, GithubError>;

    async fn list_reviews(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<Vec<Review>, GithubError>;

    async fn list_review_comments(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Comment>, GithubError>;

    async fn list_issue_comments(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Comment>, GithubError>;

    async fn list_check_runs(
        &self,
        owner: &str,
        repo: &str,
        git_ref: &str,
    ) -> Result<Vec<CheckRun>, GithubError>;

    /// Legacy commit status contexts, expressed as check runs.
    async fn list_status_contexts(
        &self,
        owner: &str,
        repo: &str,
        git_ref: &str,
    ) -> Result<Vec<CheckRun>, GithubError>;

    async fn submit_review(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        event: ReviewEvent,
        body: &str,
    ) -> Result<(), GithubError>;
}
