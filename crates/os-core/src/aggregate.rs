//! Folding heterogeneous GitHub signals into summary states.

use crate::types::{
    CheckRun, CheckStatus, ChecksState, Comment, PrFeedback, PrWatch, PullRequest, Review,
    ReviewState, ReviewSummary,
};
use std::collections::HashSet;

/// `Failure` as soon as one completed check fails; otherwise `Pending` while
/// anything is still running; otherwise `Success`. Empty input has no state.
pub fn overall_check_status(checks: &[CheckRun]) -> ChecksState {
    if checks.is_empty() {
        return ChecksState::None;
    }
    let mut pending = false;
    for check in checks {
        if check.status == CheckStatus::Completed {
            if check.conclusion.is_some_and(|conclusion| conclusion.is_failing()) {
                return ChecksState::Failure;
            }
        } else {
            pending = true;
        }
    }
    if pending {
        ChecksState::Pending
    } else {
        ChecksState::Success
    }
}

/// One review per author, the chronologically last one. A later review only
/// replaces an earlier one when strictly newer, so ties keep insertion order.
/// Output is ordered by each author's first appearance.
pub fn latest_review_per_author(reviews: &[Review]) -> Vec<Review> {
    let mut latest: Vec<Review> = Vec::new();
    for review in reviews {
        match latest.iter_mut().find(|item| item.author == review.author) {
            Some(current) => {
                let newer = match (review.submitted_at, current.submitted_at) {
                    (Some(candidate), Some(existing)) => candidate > existing,
                    (Some(_), None) => true,
                    (None, _) => false,
                };
                if newer {
                    *current = review.clone();
                }
            }
            None => latest.push(review.clone()),
        }
    }
    latest
}

pub fn overall_review_state(reviews: &[Review]) -> ReviewSummary {
    let latest = latest_review_per_author(reviews);
    if latest.is_empty() {
        return ReviewSummary::None;
    }
    if latest
        .iter()
        .any(|review| review.state == ReviewState::ChangesRequested)
    {
        return ReviewSummary::ChangesRequested;
    }
    if latest
        .iter()
        .all(|review| review.state == ReviewState::Approved)
    {
        return ReviewSummary::Approved;
    }
    ReviewSummary::Pending
}

/// Outstanding review requests when GitHub reports any, else authors whose
/// latest review is still pending or only a comment.
pub fn pending_review_count(pr: &PullRequest, reviews: &[Review]) -> u32 {
    let requested = pr.requested_reviewers.len();
    if requested > 0 {
        return saturating_u32(requested);
    }
    let waiting = latest_review_per_author(reviews)
        .iter()
        .filter(|review| matches!(review.state, ReviewState::Pending | ReviewState::Commented))
        .count();
    saturating_u32(waiting)
}

/// Check runs take precedence over same-named legacy status contexts.
pub fn merge_check_sources(check_runs: Vec<CheckRun>, statuses: Vec<CheckRun>) -> Vec<CheckRun> {
    let mut seen = HashSet::new();
    let mut merged = Vec::with_capacity(check_runs.len() + statuses.len());
    for check in check_runs.into_iter().chain(statuses) {
        if seen.insert(check.name.clone()) {
            merged.push(check);
        }
    }
    merged
}

/// Review-line and issue comments in ascending creation order (stable).
pub fn merge_comments(review_comments: Vec<Comment>, issue_comments: Vec<Comment>) -> Vec<Comment> {
    let mut merged = review_comments;
    merged.extend(issue_comments);
    merged.sort_by_key(|comment| comment.created_at);
    merged
}

pub fn assemble_feedback(
    pr: PullRequest,
    reviews: Vec<Review>,
    comments: Vec<Comment>,
    checks: Vec<CheckRun>,
) -> PrFeedback {
    let review_state = overall_review_state(&reviews);
    let checks_state = overall_check_status(&checks);
    let pending_review_count = pending_review_count(&pr, &reviews);
    let last_comment_at = comments.iter().map(|comment| comment.created_at).max();
    PrFeedback {
        pr,
        reviews,
        comments,
        checks,
        review_state,
        checks_state,
        pending_review_count,
        last_comment_at,
    }
}

/// A newer comment than the watch has seen, or a different CI roll-up.
pub fn has_new_feedback(watch: &PrWatch, feedback: &PrFeedback) -> bool {
    let newer_comment = match (feedback.last_comment_at, watch.last_comment_at) {
        (Some(latest), Some(seen)) => latest > seen,
        (Some(_), None) => true,
        (None, _) => false,
    };
    newer_comment || feedback.checks_state != watch.last_check_status
}

pub(crate) fn saturating_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
