use crate::error::GithubError;
use crate::github::GithubClient;
use crate::types::{CheckRun, ClientKind, Comment, PullRequest, Review, ReviewEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Stand-in used when no credentials could be found. Every call reports
/// [`GithubError::NotAvailable`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopClient;

#[async_trait]
impl GithubClient for NoopClient {
    fn kind(&self) -> ClientKind {
        ClientKind::Noop
    }

    async fn authenticated_user(&self) -> Result<String, GithubError> {
        Err(GithubError::NotAvailable)
    }

    async fn get_pr(&self, _: &str, _: &str, _: u64) -> Result<PullRequest, GithubError> {
        Err(GithubError::NotAvailable)
    }

    async fn find_pr_by_branch(
        &self,
        _: &str,
        _: &str,
        _: &str,
    ) -> Result<Option<PullRequest>, GithubError> {
        Err(GithubError::NotAvailable)
    }

    async fn list_open_prs(&self, _: &str, _: &str) -> Result<Vec<PullRequest>, GithubError> {
        Err(GithubError::NotAvailable)
    }

    async fn search_prs(&self, _: &str) -> Result<Vec<PullRequest>, GithubError> {
        Err(GithubError::NotAvailable)
    }

    async fn list_reviews(&self, _: &str, _: &str, _: u64) -> Result<Vec<Review>, GithubError> {
        Err(GithubError::NotAvailable)
    }

    async fn list_review_comments(
        &self,
        _: &str,
        _: &str,
        _: u64,
        _: Option<DateTime<Utc>>,
    ) -> Result<Vec<Comment>, GithubError> {
        Err(GithubError::NotAvailable)
    }

    async fn list_issue_comments(
        &self,
        _: &str,
        _: &str,
        _: u64,
        _: Option<DateTime<Utc>>,
    ) -> Result<Vec<Comment>, GithubError> {
        Err(GithubError::NotAvailable)
    }

    async fn list_check_runs(
        &self,
        _: &str,
        _: &str,
        _: &str,
    ) -> Result<Vec<CheckRun>, GithubError> {
        Err(GithubError::NotAvailable)
    }

    async fn list_status_contexts(
        &self,
        _: &str,
        _: &str,
        _: &str,
    ) -> Result<Vec<CheckRun>, GithubError> {
        Err(GithubError::NotAvailable)
    }

    async fn submit_review(
        &self,
        _: &str,
        _: &str,
        _: u64,
        _: ReviewEvent,
        _: &str,
    ) -> Result<(), GithubError> {
        Err(GithubError::NotAvailable)
    }
}
