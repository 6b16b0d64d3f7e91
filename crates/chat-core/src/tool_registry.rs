use crate::error::ChatError;
use crate::types::{ToolOutput, ToolSchema};
use async_openai::types::{ChatCompletionTool, ChatCompletionToolArgs, ChatCompletionToolType, FunctionObjectArgs};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A capability the agent may invoke on its own while answering a turn.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (used in function calling).
    fn name(&self) -> &str;

    /// Description shown to the model so it can decide when to call the tool.
    fn description(&self) -> &str;

    /// JSON Schema describing the tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: Value) -> Result<String, ChatError>;
}

/// The tools handed to the agent. Ordered by name so the schemas sent to the
/// model are stable between requests.
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. Overwrites any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        tracing::debug!("Registered tool: {}", name);
        self.tools.insert(name, tool);
    }

    pub fn list_names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools
            .values()
            .map(|t| ToolSchema {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect()
    }

    /// Tool definitions in the OpenAI function calling format.
    pub fn openai_tools(&self) -> Result<Vec<ChatCompletionTool>, ChatError> {
        self.schemas()
            .into_iter()
            .map(|s| {
                let func = FunctionObjectArgs::default()
                    .name(&s.name)
                    .description(&s.description)
                    .parameters(s.parameters)
                    .build()
                    .map_err(|e| ChatError::Schema(format!("function '{}': {}", s.name, e)))?;
                ChatCompletionToolArgs::default()
                    .r#type(ChatCompletionToolType::Function)
                    .function(func)
                    .build()
                    .map_err(|e| ChatError::Schema(format!("tool '{}': {}", s.name, e)))
            })
            .collect()
    }

    /// Execute a tool by name. Failures are folded into the output so they can
    /// be reported back to the model instead of aborting the turn.
    pub async fn execute(&self, tool_name: &str, tool_call_id: &str, args: Value) -> ToolOutput {
        match self.tools.get(tool_name) {
            Some(tool) => match tool.execute(args).await {
                Ok(content) => ToolOutput {
                    tool_call_id: tool_call_id.to_string(),
                    content,
                    is_error: false,
                },
                Err(e) => ToolOutput {
                    tool_call_id: tool_call_id.to_string(),
                    content: format!("Error: {}", e),
                    is_error: true,
                },
            },
            None => ToolOutput {
                tool_call_id: tool_call_id.to_string(),
                content: format!("Error: {}", ChatError::ToolNotFound(tool_name.to_string())),
                is_error: true,
            },
        }
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
