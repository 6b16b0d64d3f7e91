use serde::{Deserialize, Serialize};

/// Who spoke a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Human,
    Ai,
}

impl Role {
    /// Label used when rendering a turn.
    pub fn label(&self) -> &'static str {
        match self {
            Role::Human => "Human",
            Role::Ai => "AI",
        }
    }
}

/// One message in a conversation. Fields are private so a turn cannot be
/// edited once it has been appended to a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    role: Role,
    content: String,
}

impl Turn {
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self {
            role: Role::Ai,
            content: content.into(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// What the agent executor receives for one turn.
///
/// `input` is the message being answered; `chat_history` is everything said
/// before it. The input is never repeated inside the history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRequest {
    pub input: String,
    pub chat_history: Vec<Turn>,
}

/// What the agent executor returns for one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub output: String,
}

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// Schema definition for a tool's parameters, sent to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Output from a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub content: String,
    pub is_error: bool,
}
