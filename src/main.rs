mod repl;

use chat_core::agent::ToolCallingAgent;
use chat_core::config::AppConfig;
use chat_core::conversation::ConversationLoop;
use chat_core::secrets::{Credentials, SecretStore};
use chat_core::tool_registry::ToolRegistry;
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "search-chat",
    about = "Chat with an LLM agent that can search the web",
    version,
    author
)]
struct Cli {
    /// Path to config file (default: ~/.config/search-chat/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the model name
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Override the API base URL
    #[arg(long, global = true)]
    api_base: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start interactive chat (default)
    Chat,

    /// Serve the chat page over HTTP
    Serve {
        /// Bind host
        #[arg(long)]
        host: Option<String>,
        /// Bind port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Show or manage configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Initialize default configuration file
    Init,
    /// Print config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Credentials may live in a .env file in the working directory.
    dotenvy::dotenv().ok();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "search_chat=info,chat_core=info,chat_server=info,warn".into()),
        )
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(AppConfig::default_path);
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };

    if let Some(model) = &cli.model {
        config.provider.model = model.clone();
    }
    if let Some(api_base) = &cli.api_base {
        config.provider.api_base = api_base.clone();
    }

    match cli.command {
        Some(Commands::Config { action }) => handle_config_command(action, &config, &config_path),
        Some(Commands::Serve { host, port }) => {
            if let Some(h) = host {
                config.server.host = h;
            }
            if let Some(p) = port {
                config.server.port = p;
            }
            let store = SecretStore::load(&config.secrets_path())?;
            let conversation = build_conversation(&config, &store)?;
            chat_server::serve(config, conversation).await
        }
        Some(Commands::Chat) | None => {
            let store = SecretStore::load(&config.secrets_path())?;
            let conversation = build_conversation(&config, &store)?;
            repl::run(&config, conversation).await
        }
    }
}

/// Resolve credentials and assemble model, tools and agent. Nothing accepts
/// input until this succeeds.
fn build_conversation(config: &AppConfig, store: &SecretStore) -> Result<Arc<ConversationLoop>> {
    let credentials = Credentials::resolve(store).map_err(|e| match e.missing_key() {
        Some(key) => {
            tracing::debug!(
                "Looked for {} in {} and the environment",
                key,
                config.secrets_path().display()
            );
            anyhow!(
                "the secret key '{}' was not found. Please configure it in your secrets.",
                key
            )
        }
        None => anyhow!(e),
    })?;

    let mut registry = ToolRegistry::new();
    chat_tools::register_all(&mut registry, config, &credentials);
    let registry = Arc::new(registry);

    let agent = ToolCallingAgent::from_config(config, &credentials.llm_api_key, registry.clone())?;

    tracing::info!(
        "Loaded {} tools, model: {}, endpoint: {}",
        registry.len(),
        agent.model_name(),
        config.provider.api_base,
    );

    Ok(Arc::new(ConversationLoop::new(Arc::new(agent))))
}

fn handle_config_command(
    action: Option<ConfigAction>,
    config: &AppConfig,
    path: &Path,
) -> Result<()> {
    match action {
        Some(ConfigAction::Show) | None => {
            let toml_str = toml::to_string_pretty(config)?;
            println!("{}", toml_str);
        }
        Some(ConfigAction::Init) => {
            if path.exists() {
                println!("Config already exists at: {}", path.display());
            } else {
                config.save_to(path)?;
                println!("Created default config at: {}", path.display());
            }
        }
        Some(ConfigAction::Path) => {
            println!("{}", path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_core::secrets::{LLM_API_KEY, SEARCH_API_KEY};

    #[test]
    fn test_missing_search_key_stops_startup() {
        let mut store = SecretStore::new();
        store.overlay([(LLM_API_KEY, "gsk_test")]);

        let err = build_conversation(&AppConfig::default(), &store).err().unwrap();

        let msg = err.to_string();
        assert_eq!(
            msg,
            "the secret key 'TAVILY_API_KEY' was not found. Please configure it in your secrets."
        );
    }

    #[test]
    fn test_builds_with_both_keys() {
        let mut store = SecretStore::new();
        store.overlay([(LLM_API_KEY, "gsk_test"), (SEARCH_API_KEY, "tvly_test")]);

        assert!(build_conversation(&AppConfig::default(), &store).is_ok());
    }
}
