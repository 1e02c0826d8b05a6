//! REST payload shapes shared by the `gh` and token clients, plus the
//! endpoint table both of them speak.

use chrono::{DateTime, Utc};
use os_core::error::GithubError;
use os_core::github::convert;
use os_core::types::{CheckRun, CheckSource, Comment, CommentKind, PullRequest, Review, ReviewEvent};
use serde::{Deserialize, Serialize};

/// A GET (or POST) against the REST API: a path relative to the API root
/// and its query parameters, unencoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub path: String,
    pub query: Vec<(&'static str, String)>,
}

impl Endpoint {
    fn new(path: String) -> Self {
        Self {
            path,
            query: Vec::new(),
        }
    }

    fn with(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.query.push((key, value.into()));
        self
    }

    fn page(self) -> Self {
        self.with("per_page", "100")
    }

    fn since(self, since: Option<DateTime<Utc>>) -> Self {
        match since {
            Some(since) => self.with("since", since.to_rfc3339()),
            None => self,
        }
    }
}

pub mod endpoints {
    use super::Endpoint;
    use chrono::{DateTime, Utc};

    pub fn user() -> Endpoint {
        Endpoint::new("user".to_string())
    }

    pub fn pull(owner: &str, repo: &str, number: u64) -> Endpoint {
        Endpoint::new(format!("repos/{owner}/{repo}/pulls/{number}"))
    }

    pub fn open_pulls(owner: &str, repo: &str) -> Endpoint {
        Endpoint::new(format!("repos/{owner}/{repo}/pulls"))
            .with("state", "open")
            .page()
    }

    pub fn open_pulls_for_branch(owner: &str, repo: &str, branch: &str) -> Endpoint {
        Endpoint::new(format!("repos/{owner}/{repo}/pulls"))
            .with("state", "open")
            .with("head", format!("{owner}:{branch}"))
            .with("per_page", "1")
    }

    pub fn search_issues(query: &str) -> Endpoint {
        Endpoint::new("search/issues".to_string())
            .with("q", query)
            .page()
    }

    pub fn reviews(owner: &str, repo: &str, number: u64) -> Endpoint {
        Endpoint::new(format!("repos/{owner}/{repo}/pulls/{number}/reviews")).page()
    }

    pub fn review_comments(
        owner: &str,
        repo: &str,
        number: u64,
        since: Option<DateTime<Utc>>,
    ) -> Endpoint {
        Endpoint::new(format!("repos/{owner}/{repo}/pulls/{number}/comments"))
            .page()
            .since(since)
    }

    pub fn issue_comments(
        owner: &str,
        repo: &str,
        number: u64,
        since: Option<DateTime<Utc>>,
    ) -> Endpoint {
        Endpoint::new(format!("repos/{owner}/{repo}/issues/{number}/comments"))
            .page()
            .since(since)
    }

    pub fn check_runs(owner: &str, repo: &str, git_ref: &str) -> Endpoint {
        Endpoint::new(format!("repos/{owner}/{repo}/commits/{git_ref}/check-runs")).page()
    }

    pub fn combined_status(owner: &str, repo: &str, git_ref: &str) -> Endpoint {
        Endpoint::new(format!("repos/{owner}/{repo}/commits/{git_ref}/status"))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireUser {
    pub login: String,
}

fn login(user: Option<WireUser>) -> String {
    user.map(|user| user.login).unwrap_or_default()
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireRef {
    #[serde(rename = "ref", default)]
    pub name: String,
    #[serde(default)]
    pub sha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WirePullRequest {
    pub number: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub state: String,
    pub user: Option<WireUser>,
    pub head: WireRef,
    pub base: WireRef,
    #[serde(default)]
    pub draft: bool,
    pub mergeable: Option<bool>,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub requested_reviewers: Vec<WireUser>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub merged_at: Option<String>,
    pub closed_at: Option<String>,
}

impl WirePullRequest {
    pub fn into_domain(self, owner: &str, repo: &str) -> PullRequest {
        let merged_at = convert::parse_timestamp(self.merged_at.as_deref());
        PullRequest {
            owner: owner.to_string(),
            repo: repo.to_string(),
            number: self.number,
            title: self.title,
            url: self.html_url,
            state: convert::pr_state(&self.state, merged_at.as_ref()),
            author: login(self.user),
            head_branch: self.head.name,
            head_sha: self.head.sha,
            base_branch: self.base.name,
            draft: self.draft,
            mergeable: self.mergeable,
            additions: self.additions,
            deletions: self.deletions,
            requested_reviewers: self
                .requested_reviewers
                .into_iter()
                .map(|user| user.login)
                .collect(),
            created_at: convert::parse_timestamp(self.created_at.as_deref()),
            updated_at: convert::parse_timestamp(self.updated_at.as_deref()),
            merged_at,
            closed_at: convert::parse_timestamp(self.closed_at.as_deref()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireReview {
    pub id: u64,
    pub user: Option<WireUser>,
    #[serde(default)]
    pub state: String,
    pub body: Option<String>,
    pub submitted_at: Option<String>,
}

impl From<WireReview> for Review {
    fn from(wire: WireReview) -> Self {
        Review {
            id: wire.id,
            author: login(wire.user),
            state: convert::review_state(&wire.state),
            body: wire.body.unwrap_or_default(),
            submitted_at: convert::parse_timestamp(wire.submitted_at.as_deref()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireComment {
    pub id: u64,
    pub user: Option<WireUser>,
    pub body: Option<String>,
    pub path: Option<String>,
    pub line: Option<u32>,
    pub created_at: String,
}

impl WireComment {
    pub fn into_domain(self, kind: CommentKind) -> Result<Comment, GithubError> {
        let created_at = convert::parse_timestamp(Some(&self.created_at)).ok_or_else(|| {
            GithubError::Decode {
                message: format!("comment {} has invalid created_at", self.id),
            }
        })?;
        Ok(Comment {
            id: self.id,
            kind,
            author: login(self.user),
            body: self.body.unwrap_or_default(),
            path: self.path,
            line: self.line,
            created_at,
        })
    }
}

pub fn comments(wire: Vec<WireComment>, kind: CommentKind) -> Result<Vec<Comment>, GithubError> {
    wire.into_iter()
        .map(|comment| comment.into_domain(kind))
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireCheckRun {
    pub name: String,
    #[serde(default)]
    pub status: String,
    pub conclusion: Option<String>,
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireCheckRunsPage {
    #[serde(default)]
    pub check_runs: Vec<WireCheckRun>,
}

impl From<WireCheckRunsPage> for Vec<CheckRun> {
    fn from(page: WireCheckRunsPage) -> Self {
        page.check_runs
            .into_iter()
            .map(|run| CheckRun {
                name: run.name,
                status: convert::check_status(&run.status),
                conclusion: convert::check_conclusion(run.conclusion.as_deref()),
                url: run.html_url,
                source: CheckSource::CheckRun,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireStatus {
    pub context: String,
    #[serde(default)]
    pub state: String,
    pub target_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireCombinedStatus {
    #[serde(default)]
    pub statuses: Vec<WireStatus>,
}

impl From<WireCombinedStatus> for Vec<CheckRun> {
    fn from(combined: WireCombinedStatus) -> Self {
        combined
            .statuses
            .into_iter()
            .map(|status| {
                let (check_status, conclusion) = convert::status_context(&status.state);
                CheckRun {
                    name: status.context,
                    status: check_status,
                    conclusion,
                    url: status.target_url,
                    source: CheckSource::StatusContext,
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireSearchPrLink {
    pub merged_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireSearchItem {
    pub number: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub state: String,
    pub user: Option<WireUser>,
    pub repository_url: String,
    #[serde(default)]
    pub draft: bool,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub closed_at: Option<String>,
    pub pull_request: Option<WireSearchPrLink>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireSearchResult {
    #[serde(default)]
    pub items: Vec<WireSearchItem>,
}

/// Search hits carry no branch or diff details; items whose repository
/// cannot be determined are dropped.
impl From<WireSearchResult> for Vec<PullRequest> {
    fn from(result: WireSearchResult) -> Self {
        result
            .items
            .into_iter()
            .filter_map(|item| {
                let (owner, repo) = convert::repo_from_api_url(&item.repository_url)?;
                let merged_at = convert::parse_timestamp(
                    item.pull_request
                        .as_ref()
                        .and_then(|link| link.merged_at.as_deref()),
                );
                Some(PullRequest {
                    owner,
                    repo,
                    number: item.number,
                    title: item.title,
                    url: item.html_url,
                    state: convert::pr_state(&item.state, merged_at.as_ref()),
                    author: login(item.user),
                    head_branch: String::new(),
                    head_sha: String::new(),
                    base_branch: String::new(),
                    draft: item.draft,
                    mergeable: None,
                    additions: 0,
                    deletions: 0,
                    requested_reviewers: Vec::new(),
                    created_at: convert::parse_timestamp(item.created_at.as_deref()),
                    updated_at: convert::parse_timestamp(item.updated_at.as_deref()),
                    merged_at,
                    closed_at: convert::parse_timestamp(item.closed_at.as_deref()),
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WireReviewSubmission<'a> {
    pub event: ReviewEvent,
    pub body: &'a str,
}

pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, GithubError> {
    serde_json::from_slice(bytes).map_err(|err| GithubError::Decode {
        message: err.to_string(),
    })
}
