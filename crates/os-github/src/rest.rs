use crate::wire::{self, Endpoint, endpoints};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use os_core::error::GithubError;
use os_core::github::GithubClient;
use os_core::types::{
    CheckRun, ClientKind, Comment, CommentKind, PullRequest, Review, ReviewEvent,
};
use reqwest::{Client, RequestBuilder, StatusCode};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("overseer/", env!("CARGO_PKG_VERSION"));

/// REST client authenticated with a personal access token.
#[derive(Clone)]
pub struct TokenClient {
    http: Client,
    api_base: String,
    token: String,
}

impl std::fmt::Debug for TokenClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenClient")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl TokenClient {
    pub fn new(
        token: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Result<Self, GithubError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| GithubError::Transport {
                message: err.to_string(),
            })?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: Endpoint,
    ) -> Result<T, GithubError> {
        let request = self
            .authorize(self.http.get(self.url(&endpoint.path)))
            .query(&endpoint.query);
        let bytes = send(request, &endpoint.path).await?;
        wire::decode(&bytes)
    }
}

async fn send(request: RequestBuilder, what: &str) -> Result<Vec<u8>, GithubError> {
    let response = request.send().await.map_err(|err| GithubError::Transport {
        message: err.to_string(),
    })?;
    let status = response.status();
    let rate_exhausted = response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == "0");
    let body = response.bytes().await.map_err(|err| GithubError::Transport {
        message: err.to_string(),
    })?;
    if status.is_success() {
        return Ok(body.to_vec());
    }
    Err(classify_status(
        status,
        rate_exhausted,
        what,
        String::from_utf8_lossy(&body).trim(),
    ))
}

fn classify_status(
    status: StatusCode,
    rate_exhausted: bool,
    what: &str,
    body: &str,
) -> GithubError {
    match status {
        StatusCode::NOT_FOUND => GithubError::NotFound {
            what: what.to_string(),
        },
        StatusCode::TOO_MANY_REQUESTS => GithubError::RateLimited {
            message: body.to_string(),
        },
        StatusCode::FORBIDDEN if rate_exhausted => GithubError::RateLimited {
            message: body.to_string(),
        },
        _ => GithubError::Api {
            status: status.as_u16(),
            message: body.to_string(),
        },
    }
}

#[async_trait]
impl GithubClient for TokenClient {
    fn kind(&self) -> ClientKind {
        ClientKind::Token
    }

    async fn authenticated_user(&self) -> Result<String, GithubError> {
        let user: wire::WireUser = self.get(endpoints::user()).await?;
        Ok(user.login)
    }

    async fn get_pr(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<PullRequest, GithubError> {
        let pr: wire::WirePullRequest = self.get(endpoints::pull(owner, repo, number)).await?;
        Ok(pr.into_domain(owner, repo))
    }

    async fn find_pr_by_branch(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<Option<PullRequest>, GithubError> {
        let prs: Vec<wire::WirePullRequest> = self
            .get(endpoints::open_pulls_for_branch(owner, repo, branch))
            .await?;
        Ok(prs.into_iter().next().map(|pr| pr.into_domain(owner, repo)))
    }

    async fn list_open_prs(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<PullRequest>, GithubError> {
        let prs: Vec<wire::WirePullRequest> =
            self.get(endpoints::open_pulls(owner, repo)).await?;
        Ok(prs
            .into_iter()
            .map(|pr| pr.into_domain(owner, repo))
            .collect())
    }

    async fn search_prs(&self, query: &str) -> Result<Vec<PullRequest>, GithubError> {
        let result: wire::WireSearchResult = self.get(endpoints::search_issues(query)).await?;
        Ok(result.into())
    }

    async fn list_reviews(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<Vec<Review>, GithubError> {
        let reviews: Vec<wire::WireReview> =
            self.get(endpoints::reviews(owner, repo, number)).await?;
        Ok(reviews.into_iter().map(Review::from).collect())
    }

    async fn list_review_comments(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Comment>, GithubError> {
        let comments = self
            .get(endpoints::review_comments(owner, repo, number, since))
            .await?;
        wire::comments(comments, CommentKind::Review)
    }

    async fn list_issue_comments(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Comment>, GithubError> {
        let comments = self
            .get(endpoints::issue_comments(owner, repo, number, since))
            .await?;
        wire::comments(comments, CommentKind::Issue)
    }

    async fn list_check_runs(
        &self,
        owner: &str,
        repo: &str,
        git_ref: &str,
    ) -> Result<Vec<CheckRun>, GithubError> {
        let page: wire::WireCheckRunsPage =
            self.get(endpoints::check_runs(owner, repo, git_ref)).await?;
        Ok(page.into())
    }

    async fn list_status_contexts(
        &self,
        owner: &str,
        repo: &str,
        git_ref: &str,
    ) -> Result<Vec<CheckRun>, GithubError> {
        let combined: wire::WireCombinedStatus = self
            .get(endpoints::combined_status(owner, repo, git_ref))
            .await?;
        Ok(combined.into())
    }

    async fn submit_review(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        event: ReviewEvent,
        body: &str,
    ) -> Result<(), GithubError> {
        let path = format!("{}/reviews", endpoints::pull(owner, repo, number).path);
        let request = self
            .authorize(self.http.post(self.url(&path)))
            .json(&wire::WireReviewSubmission { event, body });
        send(request, &path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_error_kinds() {
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, false, "repos/a/b/pulls/1", ""),
            GithubError::NotFound { .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, true, "search/issues", "limit"),
            GithubError::RateLimited { .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, false, "search/issues", "nope"),
            GithubError::Api { status: 403, .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, false, "user", ""),
            GithubError::RateLimited { .. }
        ));
    }

    #[test]
    fn api_base_is_normalised() {
        let client = TokenClient::new("secret", "https://ghe.example.com/api/v3/").unwrap();
        assert_eq!(client.url("user"), "https://ghe.example.com/api/v3/user");
        assert!(!format!("{client:?}").contains("secret"));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        let client = TokenClient::new("token", "http://127.0.0.1:9").unwrap();
        let err = client.authenticated_user().await.unwrap_err();
        assert!(matches!(err, GithubError::Transport { .. }));
    }
}
