pub mod aggregate;
pub mod error;
pub mod github;
pub mod pr_watches;
pub mod query;
pub mod review_watches;
pub mod secrets;
pub mod service;
pub mod store;
pub mod task_prs;
pub mod trigger;
pub mod validation;

pub mod types;

pub use crate::error::OverseerError;
pub use crate::github::GithubClient;
pub use crate::secrets::{SecretInfo, SecretStore};
pub use crate::service::{GithubService, RequestContext};
pub use crate::store::Store;
pub use crate::trigger::{ReviewPollQueue, ReviewPollTrigger};
