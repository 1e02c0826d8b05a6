use crate::error::WatchError;
use crate::types::{CreatePrWatchInput, CreateReviewWatchInput, RepoFilter, UpdateReviewWatchInput};

pub const DEFAULT_REVIEW_POLL_INTERVAL_SECS: u32 = 300;
pub const MIN_REVIEW_POLL_INTERVAL_SECS: u32 = 60;

/// Unset or zero means the default; anything below the floor is raised to it.
pub fn clamp_poll_interval(value: Option<u32>) -> u32 {
    match value {
        None | Some(0) => DEFAULT_REVIEW_POLL_INTERVAL_SECS,
        Some(secs) => secs.max(MIN_REVIEW_POLL_INTERVAL_SECS),
    }
}

fn require(value: &str, field: &str) -> Result<(), WatchError> {
    if value.trim().is_empty() {
        return Err(WatchError::InvalidInput {
            message: format!("{field} is required"),
        });
    }
    Ok(())
}

pub fn validate_pr_watch_input(input: &CreatePrWatchInput) -> Result<(), WatchError> {
    require(&input.session_id, "session_id")?;
    require(&input.task_id, "task_id")?;
    require(&input.owner, "owner")?;
    require(&input.repo, "repo")?;
    if input.pr_number == 0 {
        require(&input.branch, "branch")?;
    }
    Ok(())
}

fn validate_repo_filters(repos: &[RepoFilter]) -> Result<(), WatchError> {
    for filter in repos {
        if filter.owner.trim().is_empty() {
            return Err(WatchError::InvalidInput {
                message: "repo filter owner is required".to_string(),
            });
        }
        if filter.owner.contains(char::is_whitespace) || filter.name.contains(char::is_whitespace)
        {
            return Err(WatchError::InvalidInput {
                message: format!("invalid repo filter: {}", filter.qualifier()),
            });
        }
    }
    Ok(())
}

pub fn validate_review_watch_input(input: &CreateReviewWatchInput) -> Result<(), WatchError> {
    require(&input.workspace_id, "workspace_id")?;
    require(&input.workflow_id, "workflow_id")?;
    require(&input.workflow_step_id, "workflow_step_id")?;
    validate_repo_filters(&input.repos)
}

pub fn validate_review_watch_update(input: &UpdateReviewWatchInput) -> Result<(), WatchError> {
    if let Some(workflow_id) = &input.workflow_id {
        require(workflow_id, "workflow_id")?;
    }
    if let Some(step_id) = &input.workflow_step_id {
        require(step_id, "workflow_step_id")?;
    }
    if let Some(repos) = &input.repos {
        validate_repo_filters(repos)?;
    }
    Ok(())
}
