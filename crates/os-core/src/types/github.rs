use crate::types::enums::{
    CheckConclusion, CheckSource, CheckStatus, ChecksState, ClientKind, CommentKind, PrState,
    ReviewState, ReviewSummary,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub owner: String,
    pub repo: String,
    pub number: u64,
    pub title: String,
    pub url: String,
    pub state: PrState,
    pub author: String,
    pub head_branch: String,
    pub head_sha: String,
    pub base_branch: String,
    pub draft: bool,
    pub mergeable: Option<bool>,
    pub additions: u64,
    pub deletions: u64,
    pub requested_reviewers: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl PullRequest {
    /// Search results carry no branch details; those need a single-PR fetch.
    pub fn lacks_branches(&self) -> bool {
        self.head_branch.is_empty() || self.base_branch.is_empty()
    }

    pub fn key(&self) -> (String, String, u64) {
        (self.owner.clone(), self.repo.clone(), self.number)
    }

    /// Ref used to look up CI signals: the head commit when known, else the branch.
    pub fn checks_ref(&self) -> &str {
        if self.head_sha.is_empty() {
            &self.head_branch
        } else {
            &self.head_sha
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: u64,
    pub author: String,
    pub state: ReviewState,
    pub body: String,
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub kind: CommentKind,
    pub author: String,
    pub body: String,
    pub path: Option<String>,
    pub line: Option<u32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRun {
    pub name: String,
    pub status: CheckStatus,
    pub conclusion: Option<CheckConclusion>,
    pub url: Option<String>,
    pub source: CheckSource,
}

/// Everything known about one pull request after a poll, with derived summaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrFeedback {
    pub pr: PullRequest,
    pub reviews: Vec<Review>,
    pub comments: Vec<Comment>,
    pub checks: Vec<CheckRun>,
    pub review_state: ReviewSummary,
    pub checks_state: ChecksState,
    pub pending_review_count: u32,
    pub last_comment_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientStatus {
    pub kind: ClientKind,
    pub available: bool,
    pub user: Option<String>,
}
