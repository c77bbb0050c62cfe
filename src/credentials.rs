use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use crate::errors::{OpsError, OpsResult};

/// What kind of endpoint a credential belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    Device,
    Server,
}

/// A resolved username/password pair.
///
/// Fetched fresh per job, never cached by the core, and never forwarded to
/// the chat sink. The `Debug` impl redacts the password so an errant
/// `{:?}` in a log line cannot leak it.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Resolves device/server identifiers to usable secrets.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// `Ok(None)` means the store is healthy but has no entry for this
    /// identifier; errors mean the store itself is unavailable.
    async fn resolve(&self, kind: CredentialKind, identifier: &str)
        -> OpsResult<Option<Credential>>;
}

#[derive(Debug, Default, Deserialize)]
struct CredentialFile {
    #[serde(default)]
    devices: HashMap<String, Credential>,
    #[serde(default)]
    servers: HashMap<String, Credential>,
}

/// Credential store backed by a JSON file.
///
/// The file is re-read on every resolve so a rotation lands without a
/// restart, and nothing decrypted outlives the requesting job.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn resolve(
        &self,
        kind: CredentialKind,
        identifier: &str,
    ) -> OpsResult<Option<Credential>> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            OpsError::CredentialUnavailable(format!("{} ({})", self.path.display(), e))
        })?;
        let file: CredentialFile = serde_json::from_str(&content).map_err(|e| {
            OpsError::CredentialUnavailable(format!("{}: {}", self.path.display(), e))
        })?;
        let table = match kind {
            CredentialKind::Device => file.devices,
            CredentialKind::Server => file.servers,
        };
        Ok(table.get(identifier).cloned())
    }
}
