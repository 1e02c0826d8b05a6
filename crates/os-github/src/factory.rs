//! Chooses which GitHub client backs the service.
//!
//! Resolution order, first match wins: mock override, authenticated `gh`
//! tool, a token from the secret store, and finally the no-op client that
//! reports the integration as unavailable.

use crate::gh::{GhCliClient, SystemGhEnv};
use crate::rest::{DEFAULT_API_BASE, TokenClient};
use async_trait::async_trait;
use os_core::github::{GithubClient, MockClient, NoopClient};
use os_core::secrets::SecretStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const TOKEN_SECRET_NAMES: [&str; 2] = ["GITHUB_TOKEN", "github_token"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub use_mock: bool,
    pub api_base: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            use_mock: false,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

impl ClientConfig {
    /// `OVERSEER_GITHUB_MOCK` (`1`/`true`) and `OVERSEER_GITHUB_API_URL`.
    pub fn from_env() -> Self {
        let use_mock = std::env::var("OVERSEER_GITHUB_MOCK")
            .map(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let api_base = std::env::var("OVERSEER_GITHUB_API_URL")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        Self { use_mock, api_base }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub enum ClientChoice {
    Mock,
    GhCli,
    Token(String),
    Noop,
}

impl std::fmt::Debug for ClientChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mock => f.write_str("Mock"),
            Self::GhCli => f.write_str("GhCli"),
            Self::Token(_) => f.write_str("Token(<redacted>)"),
            Self::Noop => f.write_str("Noop"),
        }
    }
}

/// Whether the `gh` tool can be used.
#[async_trait]
pub trait GhEnv: Send + Sync {
    fn on_path(&self) -> bool;
    async fn authenticated(&self) -> bool;
}

pub async fn resolve_choice(
    config: &ClientConfig,
    gh_env: &dyn GhEnv,
    secrets: Option<&dyn SecretStore>,
) -> ClientChoice {
    if config.use_mock {
        return ClientChoice::Mock;
    }
    if gh_env.on_path() && gh_env.authenticated().await {
        return ClientChoice::GhCli;
    }
    let Some(secrets) = secrets else {
        return ClientChoice::Noop;
    };
    match token_from_secrets(secrets).await {
        Some(token) => ClientChoice::Token(token),
        None => ClientChoice::Noop,
    }
}

async fn token_from_secrets(secrets: &dyn SecretStore) -> Option<String> {
    let listed = match secrets.list().await {
        Ok(listed) => listed,
        Err(err) => {
            debug!(error = %err, "secret store listing failed");
            return None;
        }
    };
    for name in TOKEN_SECRET_NAMES {
        let Some(info) = listed.iter().find(|info| info.name == name) else {
            continue;
        };
        match secrets.reveal(&info.id).await {
            Ok(value) if !value.trim().is_empty() => return Some(value.trim().to_string()),
            Ok(_) => debug!(secret = name, "token secret is empty"),
            Err(err) => debug!(secret = name, error = %err, "token secret could not be revealed"),
        }
    }
    None
}

pub fn build_client(choice: ClientChoice, config: &ClientConfig) -> Arc<dyn GithubClient> {
    match choice {
        ClientChoice::Mock => Arc::new(MockClient::new()),
        ClientChoice::GhCli => Arc::new(GhCliClient::default()),
        ClientChoice::Token(token) => match TokenClient::new(token, config.api_base.clone()) {
            Ok(client) => Arc::new(client),
            Err(err) => {
                warn!(error = %err, "token client could not be built; github integration disabled");
                Arc::new(NoopClient)
            }
        },
        ClientChoice::Noop => Arc::new(NoopClient),
    }
}

/// Resolves against the real environment and builds the client.
pub async fn client_from_env(
    config: &ClientConfig,
    secrets: Option<&dyn SecretStore>,
) -> Arc<dyn GithubClient> {
    let choice = resolve_choice(config, &SystemGhEnv, secrets).await;
    let client = build_client(choice, config);
    info!(kind = ?client.kind(), "github client selected");
    client
}
