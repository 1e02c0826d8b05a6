use crate::error::SecretError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretInfo {
    pub id: String,
    pub name: String,
}

/// Host-provided credential store. Only names are listed; values are
/// revealed one at a time.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn list(&self) -> Result<Vec<SecretInfo>, SecretError>;
    async fn reveal(&self, id: &str) -> Result<String, SecretError>;
}
