pub mod agent;
pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod prompt;
pub mod secrets;
pub mod session;
pub mod tool_registry;
pub mod types;

pub use agent::{AgentExecutor, ToolCallingAgent};
pub use config::AppConfig;
pub use conversation::{ConversationLoop, DisplaySink, NullDisplay, SubmitOutcome};
pub use error::ChatError;
pub use secrets::{Credentials, SecretStore};
pub use session::{Frame, LoopState, Session, Transcript};
pub use tool_registry::{Tool, ToolRegistry};
pub use types::{AgentRequest, AgentResponse, Role, Turn};
