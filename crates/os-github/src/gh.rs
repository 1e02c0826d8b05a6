use crate::factory::GhEnv;
use crate::wire::{self, Endpoint, endpoints};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use os_core::error::GithubError;
use os_core::github::GithubClient;
use os_core::types::{
    CheckRun, ClientKind, Comment, CommentKind, PullRequest, Review, ReviewEvent,
};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const OUTPUT_LIMIT: usize = 64 * 1024;
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Talks to GitHub through the locally installed and authenticated `gh` tool.
#[derive(Debug, Clone)]
pub struct GhCliClient {
    program: PathBuf,
}

impl Default for GhCliClient {
    fn default() -> Self {
        Self::new("gh")
    }
}

impl GhCliClient {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: Endpoint,
    ) -> Result<T, GithubError> {
        let stdout = run(&self.program, &get_args(&endpoint), None, COMMAND_TIMEOUT).await?;
        wire::decode(&stdout)
    }
}

/// `gh api` arguments for a GET; query parameters go through `-f` so `gh`
/// does the encoding.
fn get_args(endpoint: &Endpoint) -> Vec<String> {
    let mut args = vec![
        "api".to_string(),
        "--method".to_string(),
        "GET".to_string(),
        endpoint.path.clone(),
    ];
    for (key, value) in &endpoint.query {
        args.push("-f".to_string());
        args.push(format!("{key}={value}"));
    }
    args
}

async fn run(
    program: &Path,
    args: &[String],
    stdin: Option<Vec<u8>>,
    timeout: Duration,
) -> Result<Vec<u8>, GithubError> {
    let mut command = Command::new(program);
    command
        .args(args)
        .env("GH_PROMPT_DISABLED", "1")
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(|err| GithubError::Command {
        message: format!("failed to spawn {}: {err}", program.display()),
    })?;
    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        pipe.write_all(&input)
            .await
            .map_err(|err| GithubError::Command {
                message: err.to_string(),
            })?;
    }

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| GithubError::Command {
            message: format!("gh timed out after {timeout:?}"),
        })?
        .map_err(|err| GithubError::Command {
            message: err.to_string(),
        })?;

    if output.status.success() {
        return Ok(output.stdout);
    }
    Err(classify_failure(&limit_output(output.stderr)))
}

fn classify_failure(stderr: &str) -> GithubError {
    let message = stderr.trim().to_string();
    let lower = message.to_ascii_lowercase();
    if lower.contains("http 404") || lower.contains("not found") {
        GithubError::NotFound { what: message }
    } else if lower.contains("rate limit") || lower.contains("http 429") {
        GithubError::RateLimited { message }
    } else {
        GithubError::Command { message }
    }
}

fn limit_output(data: Vec<u8>) -> String {
    let mut sliced = data;
    if sliced.len() > OUTPUT_LIMIT {
        sliced.truncate(OUTPUT_LIMIT);
    }
    String::from_utf8_lossy(&sliced).to_string()
}

#[async_trait]
impl GithubClient for GhCliClient {
    fn kind(&self) -> ClientKind {
        ClientKind::GhCli
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
        let submission = wire::WireReviewSubmission { event, body };
        let payload = serde_json::to_vec(&submission).map_err(|err| GithubError::Decode {
            message: err.to_string(),
        })?;
        let args = vec![
            "api".to_string(),
            "--method".to_string(),
            "POST".to_string(),
            format!("{}/reviews", endpoints::pull(owner, repo, number).path),
            "--input".to_string(),
            "-".to_string(),
        ];
        run(&self.program, &args, Some(payload), COMMAND_TIMEOUT).await?;
        Ok(())
    }
}

/// Inspects the real environment: `gh` on `PATH` and `gh auth status`.
#[derive(Debug, Clone, Default)]
pub struct SystemGhEnv;

impl SystemGhEnv {
    fn locate() -> Option<PathBuf> {
        let paths = std::env::var_os("PATH")?;
        std::env::split_paths(&paths)
            .map(|dir| dir.join(if cfg!(windows) { "gh.exe" } else { "gh" }))
            .find(|candidate| candidate.is_file())
    }
}

#[async_trait]
impl GhEnv for SystemGhEnv {
    fn on_path(&self) -> bool {
        Self::locate().is_some()
    }

    async fn authenticated(&self) -> bool {
        let Some(program) = Self::locate() else {
            return false;
        };
        let args = ["auth".to_string(), "status".to_string()];
        match run(&program, &args, None, COMMAND_TIMEOUT).await {
            Ok(_) => true,
            Err(err) => {
                tracing::debug!(error = %err, "gh is installed but not authenticated");
                false
            }
        }
    }
}
