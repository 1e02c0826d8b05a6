use async_trait::async_trait;
use os_core::error::SecretError;
use os_core::secrets::{SecretInfo, SecretStore};

/// Secrets backed by the process environment. Ids and names are variable
/// names; only non-empty variables are listed.
#[derive(Debug, Clone, Default)]
pub struct EnvSecretStore {
    names: Option<Vec<String>>,
}

impl EnvSecretStore {
    /// Restricts listing and revealing to `names`.
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: Some(names.into_iter().map(Into::into).collect()),
        }
    }

    fn allows(&self, name: &str) -> bool {
        self.names
            .as_ref()
            .is_none_or(|names| names.iter().any(|allowed| allowed == name))
    }
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn list(&self) -> Result<Vec<SecretInfo>, SecretError> {
        Ok(std::env::vars_os()
            .filter(|(_, value)| !value.is_empty())
            .filter_map(|(name, _)| name.into_string().ok())
            .filter(|name| self.allows(name))
            .map(|name| SecretInfo {
                id: name.clone(),
                name,
            })
            .collect())
    }

    async fn reveal(&self, id: &str) -> Result<String, SecretError> {
        if !self.allows(id) {
            return Err(SecretError::NotFound { id: id.to_string() });
        }
        std::env::var(id).map_err(|_| SecretError::NotFound { id: id.to_string() })
    }
}
