use crate::error::ChatError;
use crate::types::{AgentRequest, Role};
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
};

/// The agent prompt. Messages are laid out as:
///
/// 1. system instruction
/// 2. `chat_history`, oldest first
/// 3. the human `input`
/// 4. the agent scratchpad (tool calls and results made while answering)
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    system: String,
}

impl PromptTemplate {
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
        }
    }

    pub fn render(
        &self,
        request: &AgentRequest,
        scratchpad: &[ChatCompletionRequestMessage],
    ) -> Result<Vec<ChatCompletionRequestMessage>, ChatError> {
        let mut messages = Vec::with_capacity(request.chat_history.len() + scratchpad.len() + 2);

        if !self.system.is_empty() {
            let m = ChatCompletionRequestSystemMessageArgs::default()
                .content(self.system.as_str())
                .build()
                .map_err(|e| ChatError::Provider(e.to_string()))?;
            messages.push(ChatCompletionRequestMessage::System(m));
        }

        for turn in &request.chat_history {
            messages.push(match turn.role() {
                Role::Human => user_message(turn.content())?,
                Role::Ai => {
                    let m = ChatCompletionRequestAssistantMessageArgs::default()
                        .content(turn.content())
                        .build()
                        .map_err(|e| ChatError::Provider(e.to_string()))?;
                    ChatCompletionRequestMessage::Assistant(m)
                }
            });
        }

        messages.push(user_message(&request.input)?);
        messages.extend_from_slice(scratchpad);
        Ok(messages)
    }
}

fn user_message(content: &str) -> Result<ChatCompletionRequestMessage, ChatError> {
    let m = ChatCompletionRequestUserMessageArgs::default()
        .content(content)
        .build()
        .map_err(|e| ChatError::Provider(e.to_string()))?;
    Ok(ChatCompletionRequestMessage::User(m))
}
