use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("the secret key '{key}' was not found")]
    ConfigurationMissing { key: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Agent execution failed: {0}")]
    AgentExecution(String),

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Schema build error: {0}")]
    Schema(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl ChatError {
    /// Name of the missing credential, if this is a configuration-missing error.
    pub fn missing_key(&self) -> Option<&str> {
        match self {
            ChatError::ConfigurationMissing { key } => Some(key),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
