//! Per-provider configuration: compiled defaults merged with stored overrides.

use crate::error::{GemImgError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Name of the Gemini provider in credential and config stores.
pub const GEMINI_PROVIDER: &str = "gemini";

/// Runtime switches threaded into a provider at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeneratorOptions {
    /// Log request summaries at `info` instead of `debug`.
    pub verbose: bool,
    /// Keep routine progress out of `info` logs.
    pub quiet: bool,
}

/// Compiled-in settings for a known provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderDefaults {
    /// Provider name.
    pub name: &'static str,
    /// API root, without version.
    pub base_url: &'static str,
    /// API version path segment.
    pub api_version: &'static str,
    /// Model used when neither the caller nor the config names one.
    pub model: &'static str,
}

const PROVIDER_DEFAULTS: &[ProviderDefaults] = &[ProviderDefaults {
    name: GEMINI_PROVIDER,
    base_url: "https://generativelanguage.googleapis.com",
    api_version: "v1beta",
    model: "gemini-3-pro-image-preview",
}];

impl ProviderDefaults {
    /// Looks up the compiled defaults for `provider`.
    pub fn lookup(provider: &str) -> Option<&'static ProviderDefaults> {
        PROVIDER_DEFAULTS.iter().find(|d| d.name == provider)
    }
}

/// User overrides for one provider. Absent fields fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredProviderConfig {
    /// Override for the API root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Override for the default model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Fully resolved endpoint for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoint {
    /// API root, without trailing slash.
    pub base_url: String,
    /// API version path segment.
    pub api_version: String,
    /// Model id the request targets.
    pub model: String,
}

impl ProviderEndpoint {
    /// Merges stored overrides over compiled defaults, field by field.
    pub fn merge(defaults: &ProviderDefaults, stored: Option<&StoredProviderConfig>) -> Self {
        let stored = stored.cloned().unwrap_or_default();
        Self {
            base_url: stored
                .base_url
                .unwrap_or_else(|| defaults.base_url.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_version: defaults.api_version.to_string(),
            model: stored.model.unwrap_or_else(|| defaults.model.to_string()),
        }
    }

    /// Replaces the model when the caller named one explicitly.
    pub fn with_model_override(mut self, explicit: Option<&str>) -> Self {
        if let Some(model) = explicit {
            self.model = model.to_string();
        }
        self
    }

    /// `{base}/{version}/models/{model}`
    pub fn model_url(&self) -> String {
        format!("{}/{}/models/{}", self.base_url, self.api_version, self.model)
    }

    /// `{base}/{version}/models/{model}:generateContent`
    pub fn generate_url(&self) -> String {
        format!("{}:generateContent", self.model_url())
    }
}

/// A store of per-provider overrides.
pub trait ConfigStore: Send + Sync {
    /// Returns the stored overrides for `provider`, if any.
    fn load(&self, provider: &str) -> Result<Option<StoredProviderConfig>>;

    /// Replaces the stored overrides for `provider`.
    fn save(&self, provider: &str, config: &StoredProviderConfig) -> Result<()>;

    /// Resolves the endpoint for `provider` with defaults applied.
    fn resolve(&self, provider: &str) -> Result<ProviderEndpoint> {
        let defaults = ProviderDefaults::lookup(provider).ok_or_else(|| {
            GemImgError::InvalidRequest(format!("unknown provider '{provider}'"))
        })?;
        let stored = self.load(provider)?;
        Ok(ProviderEndpoint::merge(defaults, stored.as_ref()))
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    providers: HashMap<String, StoredProviderConfig>,
}

/// JSON file config store.
///
/// The file looks like `{"providers": {"gemini": {"model": "..."}}}`. A
/// missing file is an empty config.
#[derive(Debug, Clone)]
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    /// Creates a store at an explicit path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a store at `<config dir>/gemimg/config.json`.
    pub fn default_location() -> Result<Self> {
        let dir = dirs::config_dir().ok_or_else(|| {
            GemImgError::InvalidRequest("could not determine config directory".into())
        })?;
        Ok(Self::new(dir.join("gemimg").join("config.json")))
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<ConfigFile> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ConfigFile::default())
            }
            Err(e) => {
                return Err(GemImgError::FileRead {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        if text.trim().is_empty() {
            return Ok(ConfigFile::default());
        }

        serde_json::from_str(&text).map_err(|e| GemImgError::ConfigInvalid {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }
}

impl ConfigStore for JsonConfigStore {
    fn load(&self, provider: &str) -> Result<Option<StoredProviderConfig>> {
        Ok(self.read()?.providers.remove(provider))
    }

    fn save(&self, provider: &str, config: &StoredProviderConfig) -> Result<()> {
        let mut file = self.read()?;
        file.providers.insert(provider.to_string(), config.clone());

        let text = serde_json::to_string_pretty(&file)?;
        crate::files::write_bytes(&self.path, text.as_bytes())?;
        tracing::debug!(path = %self.path.display(), provider, "saved provider config");
        Ok(())
    }
}

/// In-memory config store.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    providers: RwLock<HashMap<String, StoredProviderConfig>>,
}

impl MemoryConfigStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding one provider entry.
    pub fn with_entry(provider: impl Into<String>, config: StoredProviderConfig) -> Self {
        let store = Self::new();
        if let Ok(mut providers) = store.providers.write() {
            providers.insert(provider.into(), config);
        }
        store
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self, provider: &str) -> Result<Option<StoredProviderConfig>> {
        let providers = self
            .providers
            .read()
            .map_err(|_| GemImgError::InvalidRequest("config map poisoned".into()))?;
        Ok(providers.get(provider).cloned())
    }

    fn save(&self, provider: &str, config: &StoredProviderConfig) -> Result<()> {
        let mut providers = self
            .providers
            .write()
            .map_err(|_| GemImgError::InvalidRequest("config map poisoned".into()))?;
        providers.insert(provider.to_string(), config.clone());
        Ok(())
    }
}
