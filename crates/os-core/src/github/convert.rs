//! Wire-to-domain normalisation shared by every client implementation.

use crate::types::{CheckConclusion, CheckStatus, PrState, ReviewState};
use chrono::{DateTime, Utc};

/// A pull request is merged once a merge timestamp exists, whatever the raw state says.
pub fn pr_state(raw: &str, merged_at: Option<&DateTime<Utc>>) -> PrState {
    if merged_at.is_some() {
        return PrState::Merged;
    }
    match raw.to_ascii_lowercase().as_str() {
        "merged" => PrState::Merged,
        "closed" => PrState::Closed,
        _ => PrState::Open,
    }
}

/// Accepts both REST (`changes_requested`) and GraphQL (`CHANGES_REQUESTED`) spellings.
pub fn review_state(raw: &str) -> ReviewState {
    match raw.to_ascii_lowercase().as_str() {
        "approved" => ReviewState::Approved,
        "changes_requested" => ReviewState::ChangesRequested,
        "pending" => ReviewState::Pending,
        "dismissed" => ReviewState::Dismissed,
        _ => ReviewState::Commented,
    }
}

pub fn check_status(raw: &str) -> CheckStatus {
    match raw.to_ascii_lowercase().as_str() {
        "completed" => CheckStatus::Completed,
        "queued" | "requested" | "waiting" | "pending" => CheckStatus::Queued,
        _ => CheckStatus::InProgress,
    }
}

pub fn check_conclusion(raw: Option<&str>) -> Option<CheckConclusion> {
    let value = raw?.to_ascii_lowercase();
    let conclusion = match value.as_str() {
        "success" => CheckConclusion::Success,
        "failure" => CheckConclusion::Failure,
        "neutral" => CheckConclusion::Neutral,
        "cancelled" => CheckConclusion::Cancelled,
        "skipped" => CheckConclusion::Skipped,
        "timed_out" => CheckConclusion::TimedOut,
        "action_required" => CheckConclusion::ActionRequired,
        "startup_failure" => CheckConclusion::StartupFailure,
        "stale" => CheckConclusion::Stale,
        _ => return None,
    };
    Some(conclusion)
}

/// Maps a commit status `state` onto the check-run vocabulary.
pub fn status_context(raw: &str) -> (CheckStatus, Option<CheckConclusion>) {
    match raw.to_ascii_lowercase().as_str() {
        "success" => (CheckStatus::Completed, Some(CheckConclusion::Success)),
        "failure" | "error" => (CheckStatus::Completed, Some(CheckConclusion::Failure)),
        _ => (CheckStatus::InProgress, None),
    }
}

pub fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?;
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|value| value.with_timezone(&Utc))
}

/// Extracts `(owner, repo)` from an API repository url such as
/// `https://api.github.com/repos/acme/widgets`.
pub fn repo_from_api_url(url: &str) -> Option<(String, String)> {
    let (_, rest) = url.split_once("/repos/")?;
    let mut parts = rest.trim_end_matches('/').split('/');
    let owner = parts.next().filter(|value| !value.is_empty())?;
    let repo = parts.next().filter(|value| !value.is_empty())?;
    Some((owner.to_string(), repo.to_string()))
}
