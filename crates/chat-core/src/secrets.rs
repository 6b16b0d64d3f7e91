//! Credential lookup.
//!
//! Credentials come from a flat TOML file of `NAME = "value"` pairs and from
//! the process environment. The environment wins so a deployment can override
//! a checked-in file without editing it.

use crate::error::ChatError;
use std::collections::HashMap;
use std::path::Path;

/// Credential for the language-model provider.
pub const LLM_API_KEY: &str = "GROQ_API_KEY";
/// Credential for the search tool provider.
pub const SEARCH_API_KEY: &str = "TAVILY_API_KEY";

/// Every credential the application needs, in the order they are checked.
pub const REQUIRED_KEYS: [&str; 2] = [LLM_API_KEY, SEARCH_API_KEY];

#[derive(Debug, Clone, Default)]
pub struct SecretStore {
    values: HashMap<String, String>,
}

impl SecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the secrets file (a missing file is not an error) and overlay the
    /// required keys from the environment.
    pub fn load(path: &Path) -> Result<Self, ChatError> {
        let mut store = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Self::from_toml_str(&contents)?
        } else {
            tracing::debug!("No secrets file at {}", path.display());
            Self::new()
        };
        store.overlay(
            REQUIRED_KEYS
                .iter()
                .filter_map(|k| std::env::var(k).ok().map(|v| (k.to_string(), v))),
        );
        Ok(store)
    }

    /// Parse a secrets file. Only top-level string values are kept.
    pub fn from_toml_str(contents: &str) -> Result<Self, ChatError> {
        let table: toml::Table = toml::from_str(contents)
            .map_err(|e| ChatError::Config(format!("invalid secrets file: {}", e)))?;
        let values = table
            .into_iter()
            .filter_map(|(k, v)| match v {
                toml::Value::String(s) => Some((k, s)),
                _ => None,
            })
            .collect();
        Ok(Self { values })
    }

    /// Insert values, replacing existing ones with the same name.
    pub fn overlay<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in vars {
            self.values.insert(k.into(), v.into());
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .map(|s| s.as_str())
            .filter(|s| !s.trim().is_empty())
    }

    pub fn require(&self, name: &str) -> Result<&str, ChatError> {
        self.get(name).ok_or_else(|| ChatError::ConfigurationMissing {
            key: name.to_string(),
        })
    }
}

/// The two credentials the chat needs before it can accept input.
#[derive(Clone)]
pub struct Credentials {
    pub llm_api_key: String,
    pub search_api_key: String,
}

impl Credentials {
    /// Fails with the first missing key, language-model key first.
    pub fn resolve(store: &SecretStore) -> Result<Self, ChatError> {
        Ok(Self {
            llm_api_key: store.require(LLM_API_KEY)?.to_string(),
            search_api_key: store.require(SEARCH_API_KEY)?.to_string(),
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("llm_api_key", &"<redacted>")
            .field("search_api_key", &"<redacted>")
            .finish()
    }
}
