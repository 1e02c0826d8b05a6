use crate::types::enums::{ChecksState, PrState, ReviewScope, ReviewSummary};
use crate::types::ids::ReviewWatchId;
use crate::types::watch::RepoFilter;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePrWatchInput {
    pub session_id: String,
    pub task_id: String,
    pub owner: String,
    pub repo: String,
    /// Zero when the pull request is not known yet.
    #[serde(default)]
    pub pr_number: u64,
    pub branch: String,
}

/// Full denormalised row written on every task/PR sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertTaskPrInput {
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
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateReviewWatchInput {
    pub workspace_id: String,
    pub workflow_id: String,
    pub workflow_step_id: String,
    #[serde(default)]
    pub repos: Vec<RepoFilter>,
    #[serde(default)]
    pub review_scope: Option<ReviewScope>,
    #[serde(default)]
    pub custom_query: Option<String>,
    #[serde(default)]
    pub agent_profile_id: Option<String>,
    #[serde(default)]
    pub executor_profile_id: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub poll_interval_seconds: Option<u32>,
}

/// Partial patch; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateReviewWatchInput {
    pub workflow_id: Option<String>,
    pub workflow_step_id: Option<String>,
    pub repos: Option<Vec<RepoFilter>>,
    pub review_scope: Option<ReviewScope>,
    pub custom_query: Option<String>,
    pub agent_profile_id: Option<Option<String>>,
    pub executor_profile_id: Option<Option<String>>,
    pub prompt: Option<Option<String>>,
    pub enabled: Option<bool>,
    pub poll_interval_seconds: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordReviewPrTaskInput {
    pub review_watch_id: ReviewWatchId,
    pub owner: String,
    pub repo: String,
    pub pr_number: u64,
    pub pr_url: String,
    pub task_id: String,
}
