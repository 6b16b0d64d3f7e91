use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application configuration, loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub search: SearchConfig,
    pub agent: AgentConfig,
    pub server: ServerConfig,
    /// File holding the credentials. Defaults to `secrets.toml` next to the config file.
    pub secrets_file: Option<PathBuf>,
    pub system_prompt: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            search: SearchConfig::default(),
            agent: AgentConfig::default(),
            server: ServerConfig::default(),
            secrets_file: None,
            system_prompt: "You are a helpful and friendly assistant. \
                            You can use tools to look up current information if needed."
                .into(),
        }
    }
}

impl AppConfig {
    /// Load configuration from default path (~/.config/search-chat/config.toml),
    /// falling back to defaults if the file doesn't exist.
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Write current configuration to the given path.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("search-chat")
    }

    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Where credentials are read from when no `secrets_file` is configured.
    pub fn secrets_path(&self) -> PathBuf {
        self.secrets_file
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("secrets.toml"))
    }

    /// Data directory for REPL history.
    pub fn data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("search-chat")
    }
}

/// Language-model provider configuration (any OpenAI-compatible endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub api_base: String,
    pub model: String,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    pub temperature: f32,
    /// HTTP timeout for a single completion request.
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.groq.com/openai/v1".into(),
            model: "llama3-8b-8192".into(),
            max_tokens: 1024,
            temperature: 0.7,
            timeout_secs: 60,
        }
    }
}

/// Web search tool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub api_base: String,
    /// Number of results returned to the model per search.
    pub max_results: u32,
    /// "basic" or "advanced".
    pub search_depth: String,
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.tavily.com".into(),
            max_results: 2,
            search_depth: "advanced".into(),
            timeout_secs: 30,
        }
    }
}

/// Tool-calling agent behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Model round trips allowed per turn before giving up.
    pub max_iterations: usize,
    /// Log every tool call and observation at info level.
    pub verbose: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            verbose: true,
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Bearer token for authentication (None = no auth).
    pub auth_token: Option<String>,
    pub cors: bool,
    /// Sessions untouched for this long are discarded.
    pub session_idle_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8501,
            auth_token: None,
            cors: true,
            session_idle_secs: 3600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("llama3-8b-8192"));
        assert!(toml_str.contains("api.groq.com"));
        assert!(toml_str.contains("api.tavily.com"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [provider]
            model = "llama-3.1-8b-instant"

            [search]
            max_results = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.provider.model, "llama-3.1-8b-instant");
        assert_eq!(config.provider.api_base, "https://api.groq.com/openai/v1");
        assert_eq!(config.search.max_results, 5);
        assert_eq!(config.search.search_depth, "advanced");
        assert_eq!(config.agent.max_iterations, 15);
        assert_eq!(config.server.session_idle_secs, 3600);
    }

    #[test]
    fn test_save_and_load() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("config.toml");
        let mut config = AppConfig::default();
        config.server.port = 9000;
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.server.port, 9000);
        assert_eq!(loaded.provider.model, config.provider.model);
    }

    #[test]
    fn test_secrets_path_override() {
        let mut config = AppConfig::default();
        assert!(config.secrets_path().ends_with("secrets.toml"));
        config.secrets_file = Some(PathBuf::from("/etc/search-chat/keys.toml"));
        assert_eq!(config.secrets_path(), PathBuf::from("/etc/search-chat/keys.toml"));
    }
}
