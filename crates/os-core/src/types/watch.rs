use crate::types::enums::{ChecksState, PrState, ReviewScope, ReviewSummary, WatchPhase};
use crate::types::ids::{PrWatchId, ReviewPrTaskId, ReviewWatchId, TaskPrId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrWatch {
    pub id: PrWatchId,
    pub session_id: String,
    pub task_id: String,
    pub owner: String,
    pub repo: String,
    /// Zero until a pull request has been discovered for `branch`.
    pub pr_number: u64,
    pub branch: String,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub last_comment_at: Option<DateTime<Utc>>,
    pub last_check_status: ChecksState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PrWatch {
    pub fn phase(&self) -> WatchPhase {
        if self.pr_number == 0 {
            WatchPhase::Searching
        } else {
            WatchPhase::Tracking
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPr {
    pub id: TaskPrId,
    pub task_id: String,
    pub owner: String,
    pub repo: String,
    pub pr_number: u64,
    pub pr_url: String,
    pub title: String,
    pub head_branch: String,
    pub base_branch: String,
    pub author: String,
    pub state: PrState,
    pub review_state: ReviewSummary,
    pub checks_state: ChecksState,
    pub review_count: u32,
    pub pending_review_count: u32,
    pub comment_count: u32,
    pub additions: u64,
    pub deletions: u64,
    pub merged_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A repository or organisation a review watch is restricted to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoFilter {
    pub owner: String,
    /// Empty means every repository of `owner`.
    #[serde(default)]
    pub name: String,
}

impl RepoFilter {
    pub fn qualifier(&self) -> String {
        if self.name.is_empty() {
            format!("org:{}", self.owner)
        } else {
            format!("repo:{}/{}", self.owner, self.name)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewWatch {
    pub id: ReviewWatchId,
    pub workspace_id: String,
    pub workflow_id: String,
    pub workflow_step_id: String,
    pub repos: Vec<RepoFilter>,
    pub review_scope: ReviewScope,
    pub custom_query: String,
    pub agent_profile_id: Option<String>,
    pub executor_profile_id: Option<String>,
    pub prompt: Option<String>,
    pub enabled: bool,
    pub poll_interval_seconds: u32,
    pub last_polled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReviewWatch {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_polled_at {
            None => true,
            Some(last) => {
                last + chrono::Duration::seconds(i64::from(self.poll_interval_seconds)) <= now
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewPrTask {
    pub id: ReviewPrTaskId,
    pub review_watch_id: ReviewWatchId,
    pub owner: String,
    pub repo: String,
    pub pr_number: u64,
    pub pr_url: String,
    pub task_id: String,
    pub created_at: DateTime<Utc>,
}
