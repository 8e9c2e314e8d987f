//! API key storage keyed by provider name.

use crate::error::{GemImgError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// A secret store keyed by provider name.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Returns the secret for `provider`, or [`GemImgError::CredentialNotFound`].
    async fn get(&self, provider: &str) -> Result<String>;

    /// Stores or replaces the secret for `provider`.
    async fn set(&self, provider: &str, secret: &str) -> Result<()>;

    /// Removes the secret for `provider`. Removing a missing entry succeeds.
    async fn delete(&self, provider: &str) -> Result<()>;
}

/// In-process credential store, mostly useful for tests and for keys passed
/// on the command line.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    secrets: RwLock<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding a single secret.
    pub fn with_secret(provider: impl Into<String>, secret: impl Into<String>) -> Self {
        let store = Self::new();
        if let Ok(mut secrets) = store.secrets.write() {
            secrets.insert(provider.into(), secret.into());
        }
        store
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, provider: &str) -> Result<String> {
        let secrets = self
            .secrets
            .read()
            .map_err(|_| GemImgError::Credential("credential map poisoned".into()))?;
        secrets
            .get(provider)
            .cloned()
            .ok_or_else(|| GemImgError::CredentialNotFound {
                provider: provider.to_string(),
            })
    }

    async fn set(&self, provider: &str, secret: &str) -> Result<()> {
        let mut secrets = self
            .secrets
            .write()
            .map_err(|_| GemImgError::Credential("credential map poisoned".into()))?;
        secrets.insert(provider.to_string(), secret.to_string());
        Ok(())
    }

    async fn delete(&self, provider: &str) -> Result<()> {
        let mut secrets = self
            .secrets
            .write()
            .map_err(|_| GemImgError::Credential("credential map poisoned".into()))?;
        secrets.remove(provider);
        Ok(())
    }
}

#[cfg(feature = "keyring")]
pub use os::KeyringCredentialStore;

#[cfg(feature = "keyring")]
mod os {
    use super::CredentialStore;
    use crate::error::{GemImgError, Result};
    use async_trait::async_trait;
    use keyring::Entry;

    /// Keyring service name entries are stored under.
    const KEYRING_SERVICE: &str = "gemimg";

    /// Credential store backed by the OS keyring (macOS Keychain, Windows
    /// Credential Manager, Linux Secret Service).
    ///
    /// Each provider is a separate entry with the provider name as the user.
    #[derive(Debug, Clone)]
    pub struct KeyringCredentialStore {
        service: String,
    }

    impl Default for KeyringCredentialStore {
        fn default() -> Self {
            Self::new()
        }
    }

    impl KeyringCredentialStore {
        /// Creates a store using the default service name.
        pub fn new() -> Self {
            Self::with_service(KEYRING_SERVICE)
        }

        /// Creates a store under a custom service name.
        pub fn with_service(service: impl Into<String>) -> Self {
            Self {
                service: service.into(),
            }
        }

        fn entry(&self, provider: &str) -> Result<Entry> {
            Entry::new(&self.service, provider).map_err(|e| {
                GemImgError::Credential(format!("failed to open keyring entry: {e}"))
            })
        }
    }

    fn join_error(e: tokio::task::JoinError) -> GemImgError {
        GemImgError::Credential(format!("keyring task failed: {e}"))
    }

    #[async_trait]
    impl CredentialStore for KeyringCredentialStore {
        async fn get(&self, provider: &str) -> Result<String> {
            let entry = self.entry(provider)?;

            // keyring calls block
            let result = tokio::task::spawn_blocking(move || entry.get_password())
                .await
                .map_err(join_error)?;

            match result {
                Ok(secret) => Ok(secret),
                Err(keyring::Error::NoEntry) => Err(GemImgError::CredentialNotFound {
                    provider: provider.to_string(),
                }),
                Err(e) => Err(GemImgError::Credential(format!(
                    "failed to read key for '{provider}': {e}"
                ))),
            }
        }

        async fn set(&self, provider: &str, secret: &str) -> Result<()> {
            let entry = self.entry(provider)?;
            let secret = secret.to_string();
            let provider = provider.to_string();

            tokio::task::spawn_blocking(move || {
                entry.set_password(&secret).map_err(|e| {
                    GemImgError::Credential(format!("failed to store key for '{provider}': {e}"))
                })
            })
            .await
            .map_err(join_error)?
        }

        async fn delete(&self, provider: &str) -> Result<()> {
            let entry = self.entry(provider)?;
            let provider = provider.to_string();

            tokio::task::spawn_blocking(move || match entry.delete_password() {
                Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                Err(e) => Err(GemImgError::Credential(format!(
                    "failed to delete key for '{provider}': {e}"
                ))),
            })
            .await
            .map_err(join_error)?
        }
    }
}
