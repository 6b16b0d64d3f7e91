use chat_core::config::SearchConfig;
use chat_core::error::ChatError;
use chat_core::tool_registry::Tool;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

const TOOL_NAME: &str = "tavily_search_results_json";

/// Web search backed by the Tavily search API.
pub struct TavilySearchTool {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    max_results: u32,
    search_depth: String,
}

impl TavilySearchTool {
    pub fn new(config: &SearchConfig, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("search-chat/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key: api_key.into(),
            endpoint: format!("{}/search", config.api_base.trim_end_matches('/')),
            max_results: config.max_results,
            search_depth: config.search_depth.clone(),
        }
    }

    async fn search(&self, query: &str) -> Result<SearchResponse, ChatError> {
        let body = SearchRequest {
            query,
            max_results: self.max_results,
            search_depth: &self.search_depth,
            include_answer: false,
            include_raw_content: false,
            include_images: false,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| tool_error(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(200).collect();
            return Err(tool_error(format!("HTTP {}: {}", status.as_u16(), snippet)));
        }

        response
            .json::<SearchResponse>()
            .await
            .map_err(|e| tool_error(format!("Invalid search response: {}", e)))
    }
}

fn tool_error(message: String) -> ChatError {
    ChatError::ToolExecution {
        tool_name: TOOL_NAME.into(),
        message,
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    max_results: u32,
    search_depth: &'a str,
    include_answer: bool,
    include_raw_content: bool,
    include_images: bool,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    url: String,
    #[serde(default)]
    content: String,
}

/// What the model sees: a JSON array of `{url, content}` objects.
fn format_results(response: &SearchResponse) -> String {
    let hits: Vec<Value> = response
        .results
        .iter()
        .map(|hit| json!({ "url": hit.url, "content": hit.content }))
        .collect();
    Value::Array(hits).to_string()
}

#[async_trait]
impl Tool for TavilySearchTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "A search engine optimized for comprehensive, accurate, and trusted results. \
         Useful for when you need to answer questions about current events. \
         Input should be a search query."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "search query to look up"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ChatError> {
        #[derive(Deserialize)]
        struct Args {
            query: String,
        }

        let args: Args = serde_json::from_value(args)
            .map_err(|e| tool_error(format!("Invalid arguments: {}", e)))?;
        if args.query.trim().is_empty() {
            return Err(tool_error("Query must not be empty".into()));
        }

        tracing::debug!("Searching for {:?}", args.query);
        let response = self.search(&args.query).await?;
        Ok(format_results(&response))
    }
}
