use crate::types::enums::{ChecksState, ReviewSummary};
use crate::types::github::PullRequest;
use crate::types::ids::{PrWatchId, ReviewWatchId};
use crate::types::watch::TaskPr;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum EventBody {
    PrFeedbackChanged {
        watch_id: PrWatchId,
        session_id: String,
        task_id: String,
        owner: String,
        repo: String,
        pr_number: u64,
        comment_count: u32,
        checks_state: ChecksState,
        review_state: ReviewSummary,
        pending_review_count: u32,
    },
    TaskPrUpdated {
        task_pr: TaskPr,
    },
    ReviewPrDiscovered {
        review_watch_id: ReviewWatchId,
        workspace_id: String,
        workflow_id: String,
        workflow_step_id: String,
        agent_profile_id: Option<String>,
        executor_profile_id: Option<String>,
        prompt: Option<String>,
        pr: PullRequest,
    },
}

impl EventBody {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PrFeedbackChanged { .. } => "PrFeedbackChanged",
            Self::TaskPrUpdated { .. } => "TaskPrUpdated",
            Self::ReviewPrDiscovered { .. } => "ReviewPrDiscovered",
        }
    }
}
