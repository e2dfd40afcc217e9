//! Credential persistence
//!
//! One opaque bearer token in one JSON file under the data directory.
//! Written on successful login, removed on logout or global auth failure,
//! read once at process start. Absence means anonymous at next startup.

use instikit_core::{InstikitError, InstikitResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const CREDENTIAL_FILE: &str = "credential.json";

#[derive(Debug, Serialize, Deserialize)]
struct PersistedCredential {
    token: String,
}

/// File-backed store for the single persisted credential
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Create a credential store under the given data directory.
    pub fn new<P: AsRef<Path>>(data_dir: P) -> InstikitResult<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir).map_err(|e| InstikitError::Storage {
            message: format!("failed to create data dir {}: {}", data_dir.display(), e),
            source: Some(Box::new(e)),
        })?;

        Ok(Self {
            path: data_dir.join(CREDENTIAL_FILE),
        })
    }

    /// Load the persisted token, if any. A corrupt file is discarded and
    /// treated as absent.
    pub fn load(&self) -> InstikitResult<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path).map_err(|e| InstikitError::Storage {
            message: format!("failed to read credential file: {}", e),
            source: Some(Box::new(e)),
        })?;

        match serde_json::from_str::<PersistedCredential>(&content) {
            Ok(credential) => Ok(Some(credential.token)),
            Err(e) => {
                warn!("discarding unreadable credential file: {}", e);
                let _ = std::fs::remove_file(&self.path);
                Ok(None)
            }
        }
    }

    /// Persist a token, replacing any previous one.
    pub fn store(&self, token: &str) -> InstikitResult<()> {
        let content = serde_json::to_string_pretty(&PersistedCredential {
            token: token.to_string(),
        })?;

        std::fs::write(&self.path, content).map_err(|e| InstikitError::Storage {
            message: format!("failed to write credential file: {}", e),
            source: Some(Box::new(e)),
        })?;

        debug!("credential persisted to {}", self.path.display());
        Ok(())
    }

    /// Remove the persisted token. Safe to call when none exists.
    pub fn clear(&self) -> InstikitResult<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).map_err(|e| InstikitError::Storage {
                message: format!("failed to remove credential file: {}", e),
                source: Some(Box::new(e)),
            })?;
            debug!("credential removed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_load_clear_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path()).unwrap();

        assert_eq!(store.load().unwrap(), None);

        store.store("tok-abc").unwrap();
        assert_eq!(store.load().unwrap(), Some("tok-abc".to_string()));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        // Clearing again is a no-op.
        store.clear().unwrap();
    }

    #[test]
    fn corrupt_file_is_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path()).unwrap();

        std::fs::write(dir.path().join("credential.json"), "not json").unwrap();
        assert_eq!(store.load().unwrap(), None);
        // And it was discarded on the way.
        assert!(!dir.path().join("credential.json").exists());
    }
}
