use crate::config::AppConfig;
use crate::error::ChatError;
use crate::llm::ChatModel;
use crate::prompt::PromptTemplate;
use crate::tool_registry::ToolRegistry;
use crate::types::{AgentRequest, AgentResponse, ToolCall, ToolOutput};

use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestToolMessageArgs,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Output returned when the model keeps calling tools past the iteration cap.
pub const ITERATION_LIMIT_OUTPUT: &str = "Agent stopped due to iteration limit or time limit.";

/// Maps a query plus prior history to a reply, possibly calling tools on the way.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    async fn invoke(&self, request: AgentRequest) -> Result<AgentResponse, ChatError>;
}

/// Agent that lets the model pick tools through native function calling.
pub struct ToolCallingAgent {
    model: ChatModel,
    tools: Arc<ToolRegistry>,
    prompt: PromptTemplate,
    max_iterations: usize,
    verbose: bool,
}

impl ToolCallingAgent {
    pub fn new(model: ChatModel, tools: Arc<ToolRegistry>, prompt: PromptTemplate) -> Self {
        Self {
            model,
            tools,
            prompt,
            max_iterations: 15,
            verbose: true,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Build the agent described by the configuration.
    pub fn from_config(
        config: &AppConfig,
        llm_api_key: &str,
        tools: Arc<ToolRegistry>,
    ) -> Result<Self, ChatError> {
        let model = ChatModel::new(&config.provider, llm_api_key)?;
        Ok(Self::new(model, tools, PromptTemplate::new(config.system_prompt.clone()))
            .with_max_iterations(config.agent.max_iterations)
            .with_verbose(config.agent.verbose))
    }

    pub fn model_name(&self) -> &str {
        self.model.model()
    }

    fn trace(&self, message: std::fmt::Arguments<'_>) {
        if self.verbose {
            info!("{}", message);
        } else {
            debug!("{}", message);
        }
    }

    async fn run_tool(&self, call: &ToolCall) -> ToolOutput {
        let args: serde_json::Value = match serde_json::from_str(&call.arguments) {
            Ok(v) => v,
            Err(e) => {
                return ToolOutput {
                    tool_call_id: call.id.clone(),
                    content: format!("Invalid JSON arguments: {}", e),
                    is_error: true,
                };
            }
        };
        self.trace(format_args!("Invoking `{}` with `{}`", call.name, args));
        self.tools.execute(&call.name, &call.id, args).await
    }
}

#[async_trait]
impl AgentExecutor for ToolCallingAgent {
    async fn invoke(&self, request: AgentRequest) -> Result<AgentResponse, ChatError> {
        let openai_tools = self.tools.openai_tools()?;
        let mut scratchpad: Vec<ChatCompletionRequestMessage> = Vec::new();

        for iteration in 1..=self.max_iterations {
            debug!("Agent iteration {}", iteration);

            let messages = self.prompt.render(&request, &scratchpad)?;
            let reply = self.model.complete(messages, &openai_tools).await?;
            let content = reply.content.unwrap_or_default();
            let tool_calls: Vec<ChatCompletionMessageToolCall> =
                reply.tool_calls.unwrap_or_default();

            if tool_calls.is_empty() {
                self.trace(format_args!("Finished chain"));
                return Ok(AgentResponse { output: content });
            }

            let mut assistant = ChatCompletionRequestAssistantMessageArgs::default();
            if !content.is_empty() {
                assistant.content(content.as_str());
            }
            let assistant = assistant
                .tool_calls(tool_calls.clone())
                .build()
                .map_err(|e| ChatError::Provider(e.to_string()))?;
            scratchpad.push(ChatCompletionRequestMessage::Assistant(assistant));

            for tc in &tool_calls {
                let call = ToolCall {
                    id: tc.id.clone(),
                    name: tc.function.name.clone(),
                    arguments: tc.function.arguments.clone(),
                };
                let output = self.run_tool(&call).await;
                if output.is_error {
                    warn!("Tool `{}` failed: {}", call.name, output.content);
                } else {
                    self.trace(format_args!("Observation from `{}`: {}", call.name, output.content));
                }

                let tool_msg = ChatCompletionRequestToolMessageArgs::default()
                    .tool_call_id(&output.tool_call_id)
                    .content(output.content.as_str())
                    .build()
                    .map_err(|e| ChatError::Provider(e.to_string()))?;
                scratchpad.push(ChatCompletionRequestMessage::Tool(tool_msg));
            }
        }

        warn!(
            "Hit max iterations ({}), returning early",
            self.max_iterations
        );
        Ok(AgentResponse {
            output: ITERATION_LIMIT_OUTPUT.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use crate::tool_registry::Tool;
    use crate::types::Turn;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Canned replies from a fake completion endpoint, plus every body it received.
    #[derive(Clone, Default)]
    struct Stub {
        replies: Arc<Mutex<VecDeque<(StatusCode, Value)>>>,
        requests: Arc<Mutex<Vec<Value>>>,
    }

    async fn completions(State(stub): State<Stub>, Json(body): Json<Value>) -> impl IntoResponse {
        stub.requests.lock().unwrap().push(body);
        let (status, reply) = stub
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| (StatusCode::OK, tool_call_reply("call_x", "echo", "loop")));
        (status, Json(reply))
    }

    async fn spawn_stub(replies: Vec<(StatusCode, Value)>) -> (String, Stub) {
        let stub = Stub::default();
        stub.replies.lock().unwrap().extend(replies);
        let app = Router::new()
            .route("/chat/completions", post(completions))
            .with_state(stub.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), stub)
    }

    fn completion(message: Value, finish_reason: &str) -> Value {
        json!({
            "id": "chatcmpl-test",
            "object": "chat.completion",
            "created": 1_700_000_000u32,
            "model": "llama3-8b-8192",
            "choices": [{
                "index": 0,
                "message": message,
                "finish_reason": finish_reason,
                "logprobs": null
            }]
        })
    }

    fn text_reply(text: &str) -> Value {
        completion(json!({"role": "assistant", "content": text}), "stop")
    }

    fn tool_call_reply(id: &str, name: &str, query: &str) -> Value {
        completion(
            json!({
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": id,
                    "type": "function",
                    "function": {
                        "name": name,
                        "arguments": json!({"query": query}).to_string()
                    }
                }]
            }),
            "tool_calls",
        )
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the query back"
        }

        fn parameters_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": { "query": { "type": "string" } },
                "required": ["query"]
            })
        }

        async fn execute(&self, args: Value) -> Result<String, ChatError> {
            Ok(format!("results for {}", args["query"].as_str().unwrap_or("")))
        }
    }

    fn agent(api_base: &str, max_iterations: usize) -> ToolCallingAgent {
        let config = ProviderConfig {
            api_base: api_base.to_string(),
            timeout_secs: 5,
            ..ProviderConfig::default()
        };
        let model = ChatModel::new(&config, "test-key").unwrap();
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        ToolCallingAgent::new(model, Arc::new(registry), PromptTemplate::new("Be helpful."))
            .with_max_iterations(max_iterations)
            .with_verbose(false)
    }

    fn request(input: &str, chat_history: Vec<Turn>) -> AgentRequest {
        AgentRequest {
            input: input.to_string(),
            chat_history,
        }
    }

    #[tokio::test]
    async fn test_plain_answer_without_tools() {
        let (base, stub) = spawn_stub(vec![(StatusCode::OK, text_reply("Hello!"))]).await;

        let response = agent(&base, 15)
            .invoke(request("Hi", vec![Turn::human("earlier"), Turn::ai("reply")]))
            .await
            .unwrap();

        assert_eq!(response.output, "Hello!");
        let requests = stub.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let messages = requests[0]["messages"].as_array().unwrap();
        let roles: Vec<&str> = messages.iter().map(|m| m["role"].as_str().unwrap()).collect();
        assert_eq!(roles, ["system", "user", "assistant", "user"]);
        assert_eq!(messages[3]["content"], "Hi");
        assert_eq!(requests[0]["model"], "llama3-8b-8192");
        assert_eq!(requests[0]["tools"][0]["function"]["name"], "echo");
    }

    #[tokio::test]
    async fn test_tool_result_fed_back_to_model() {
        let (base, stub) = spawn_stub(vec![
            (StatusCode::OK, tool_call_reply("call_1", "echo", "rust news")),
            (StatusCode::OK, text_reply("Rust 2.0 is not out yet.")),
        ])
        .await;

        let response = agent(&base, 15).invoke(request("News?", vec![])).await.unwrap();

        assert_eq!(response.output, "Rust 2.0 is not out yet.");
        let requests = stub.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        let messages = requests[1]["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[2]["role"], "assistant");
        assert_eq!(messages[2]["tool_calls"][0]["id"], "call_1");
        assert_eq!(messages[3]["role"], "tool");
        assert_eq!(messages[3]["tool_call_id"], "call_1");
        assert_eq!(messages[3]["content"], "results for rust news");
    }

    #[tokio::test]
    async fn test_unknown_tool_reported_to_model() {
        let (base, stub) = spawn_stub(vec![
            (StatusCode::OK, tool_call_reply("call_1", "missing_tool", "x")),
            (StatusCode::OK, text_reply("I could not search.")),
        ])
        .await;

        let response = agent(&base, 15).invoke(request("Search", vec![])).await.unwrap();

        assert_eq!(response.output, "I could not search.");
        let requests = stub.requests.lock().unwrap();
        let tool_content = requests[1]["messages"][3]["content"].as_str().unwrap();
        assert!(tool_content.contains("Tool not found"), "got: {tool_content}");
    }

    #[tokio::test]
    async fn test_iteration_cap() {
        // The stub answers with a tool call forever once its script is empty.
        let (base, stub) = spawn_stub(vec![]).await;

        let response = agent(&base, 2).invoke(request("Loop", vec![])).await.unwrap();

        assert_eq!(response.output, ITERATION_LIMIT_OUTPUT);
        assert_eq!(stub.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_provider_error_fails_without_retry() {
        let error = json!({
            "error": {
                "message": "Rate limit reached",
                "type": "tokens",
                "param": null,
                "code": "rate_limit_exceeded"
            }
        });
        let (base, stub) = spawn_stub(vec![(StatusCode::TOO_MANY_REQUESTS, error)]).await;

        let result = tokio::time::timeout(
            Duration::from_secs(10),
            agent(&base, 15).invoke(request("Hi", vec![])),
        )
        .await
        .expect("request should not be retried");

        let err = result.unwrap_err();
        assert!(err.to_string().contains("Rate limit reached"), "got: {err}");
        assert_eq!(stub.requests.lock().unwrap().len(), 1);
    }
}
