//! Search queries for a review watch.

use crate::types::{ReviewScope, ReviewWatch};

pub const USER_REVIEW_QUERY: &str = "type:pr state:open user-review-requested:@me";
pub const TEAM_REVIEW_QUERY: &str = "type:pr state:open review-requested:@me";

pub fn base_query(scope: ReviewScope) -> &'static str {
    match scope {
        ReviewScope::User => USER_REVIEW_QUERY,
        ReviewScope::UserAndTeams => TEAM_REVIEW_QUERY,
    }
}

/// One query per repo filter, or a single query when unfiltered. A custom
/// query replaces the scope-derived base.
pub fn build_review_queries(watch: &ReviewWatch) -> Vec<String> {
    let custom = watch.custom_query.trim();
    let base = if custom.is_empty() {
        base_query(watch.review_scope)
    } else {
        custom
    };
    if watch.repos.is_empty() {
        return vec![base.to_string()];
    }
    watch
        .repos
        .iter()
        .map(|filter| format!("{base} {}", filter.qualifier()))
        .collect()
}
