//! Per-provider configuration and its JSON-backed store.
//!
//! The store is rooted at a caller-supplied directory (the host decides
//! where settings live); nothing in here touches host state.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{NanoRenderError, Result};
use crate::types::ProviderKind;

const PROVIDERS_FILE: &str = "providers.json";
const SETTINGS_FILE: &str = "settings.json";

/// Configuration for one backend provider.
///
/// Empty `base_url` or `model` mean "use the provider's hardcoded default".
/// Loaded at dispatch time and never mutated by the dispatch layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Which backend this config addresses.
    pub kind: ProviderKind,
    /// API key for the backend.
    pub api_key: String,
    /// Endpoint override; empty selects the default.
    pub base_url: String,
    /// Model id override; empty selects the default.
    pub model: String,
}

impl ProviderConfig {
    /// Creates a config with default endpoint and model.
    pub fn new(kind: ProviderKind, api_key: impl Into<String>) -> Self {
        Self {
            kind,
            api_key: api_key.into(),
            base_url: String::new(),
            model: String::new(),
        }
    }

    /// Sets an endpoint override.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets a model id override.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Endpoint to call: the override if set, else the provider default.
    pub fn resolved_base_url(&self) -> &str {
        if self.base_url.is_empty() {
            default_base_url(self.kind)
        } else {
            self.base_url.trim_end_matches('/')
        }
    }

    /// Model id to request: the override if set, else the provider default.
    pub fn resolved_model(&self) -> &str {
        if self.model.is_empty() {
            default_model(self.kind)
        } else {
            &self.model
        }
    }

    /// Fails if the API key is missing.
    pub fn require_api_key(&self) -> Result<&str> {
        let key = self.api_key.trim();
        if key.is_empty() {
            return Err(NanoRenderError::Config(format!(
                "no API key configured for provider '{}'",
                self.kind
            )));
        }
        Ok(key)
    }
}

/// Default endpoint per provider.
pub fn default_base_url(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::Google => "https://generativelanguage.googleapis.com/v1beta",
        ProviderKind::Yunwu => "https://yunwu.zeabur.app",
        ProviderKind::OpenRouter => "https://openrouter.ai/api/v1",
        ProviderKind::GptGod => "https://api.gptgod.online/v1",
    }
}

/// Default model id per provider.
pub fn default_model(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::Google => "gemini-2.5-flash-image-preview",
        ProviderKind::Yunwu => "gemini-3-pro-image-preview",
        ProviderKind::OpenRouter => "google/gemini-3-pro-image-preview",
        ProviderKind::GptGod => "gemini-3-pro-image-preview",
    }
}

/// On-disk entry in `providers.json`.
#[derive(Debug, Serialize, Deserialize)]
struct ProviderEntry {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "apiKey", default)]
    api_key: String,
    #[serde(rename = "baseUrl", default)]
    base_url: String,
    #[serde(default)]
    model: String,
}

/// On-disk shape of `settings.json`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Settings {
    #[serde(default)]
    selected_provider: String,
}

/// Durable key-value storage for provider configs and the selected provider.
///
/// Missing or unreadable files behave as "nothing stored": loads return
/// defaults and the next save recreates the file.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    root: PathBuf,
}

impl ConfigStore {
    /// Creates a store rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Loads the stored config for a provider, or a default-valued config
    /// (empty API key) if none is stored.
    pub fn load_provider(&self, kind: ProviderKind) -> ProviderConfig {
        self.read_entries()
            .into_iter()
            .find(|e| ProviderKind::from_str(&e.kind).ok() == Some(kind))
            .map(|e| ProviderConfig {
                kind,
                api_key: e.api_key,
                base_url: e.base_url,
                model: e.model,
            })
            .unwrap_or_else(|| ProviderConfig::new(kind, ""))
    }

    /// Persists a provider config, replacing any existing entry of the
    /// same kind.
    pub fn save_provider(&self, config: &ProviderConfig) -> Result<()> {
        let mut entries = self.read_entries();
        entries.retain(|e| ProviderKind::from_str(&e.kind).ok() != Some(config.kind));
        entries.push(ProviderEntry {
            name: config.kind.display_name().to_string(),
            kind: config.kind.as_str().to_string(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
        });
        self.write_json(PROVIDERS_FILE, &entries)
    }

    /// Last-selected provider, defaulting to google when nothing valid is
    /// stored.
    pub fn selected_provider(&self) -> ProviderKind {
        self.read_json::<Settings>(SETTINGS_FILE)
            .and_then(|s| ProviderKind::from_str(&s.selected_provider).ok())
            .unwrap_or(ProviderKind::Google)
    }

    /// Persists the selected provider.
    pub fn set_selected_provider(&self, kind: ProviderKind) -> Result<()> {
        self.write_json(
            SETTINGS_FILE,
            &Settings {
                selected_provider: kind.as_str().to_string(),
            },
        )
    }

    fn read_entries(&self) -> Vec<ProviderEntry> {
        self.read_json(PROVIDERS_FILE).unwrap_or_default()
    }

    fn read_json<T: serde::de::DeserializeOwned>(&self, file: &str) -> Option<T> {
        let path = self.root.join(file);
        let text = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("ignoring unreadable {}: {e}", path.display());
                None
            }
        }
    }

    fn write_json<T: Serialize>(&self, file: &str, value: &T) -> Result<()> {
        ensure_dir(&self.root)?;
        let text = serde_json::to_string_pretty(value)?;
        fs::write(self.root.join(file), text)?;
        Ok(())
    }
}

fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}
