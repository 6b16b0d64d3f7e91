pub mod tavily_search;

use chat_core::config::AppConfig;
use chat_core::secrets::Credentials;
use chat_core::tool_registry::ToolRegistry;
use std::sync::Arc;

/// Register all built-in tools into the registry.
pub fn register_all(registry: &mut ToolRegistry, config: &AppConfig, credentials: &Credentials) {
    registry.register(Arc::new(tavily_search::TavilySearchTool::new(
        &config.search,
        credentials.search_api_key.clone(),
    )));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_all_adds_search() {
        let credentials = Credentials {
            llm_api_key: "gsk".into(),
            search_api_key: "tvly".into(),
        };
        let mut registry = ToolRegistry::new();
        register_all(&mut registry, &AppConfig::default(), &credentials);
        assert_eq!(registry.list_names(), vec!["tavily_search_results_json"]);
    }
}
