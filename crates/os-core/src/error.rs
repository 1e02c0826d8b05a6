use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("watch not found")]
    NotFound,
    #[error("conflict: {message}")]
    Conflict { message: String },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("storage error: {reason}")]
    Backend { reason: String },
}

#[derive(Debug, Error)]
pub enum GithubError {
    #[error("github integration not available: no authenticated client configured")]
    NotAvailable,
    #[error("not found: {what}")]
    NotFound { what: String },
    #[error("rate limited: {message}")]
    RateLimited { message: String },
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("transport error: {message}")]
    Transport { message: String },
    #[error("decode error: {message}")]
    Decode { message: String },
    #[error("command failed: {message}")]
    Command { message: String },
}

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret not found: {id}")]
    NotFound { id: String },
    #[error("secret store unavailable: {message}")]
    Unavailable { message: String },
}

#[derive(Debug, Error)]
pub enum OverseerError {
    #[error(transparent)]
    Watch(#[from] WatchError),
    #[error(transparent)]
    Github(#[from] GithubError),
    #[error(transparent)]
    Secret(#[from] SecretError),
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl OverseerError {
    /// True when the failure means the integration is switched off rather than broken.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Github(GithubError::NotAvailable))
    }
}
