pub mod anthropic;
pub mod model;
pub mod orchestrator;
pub mod process;
pub mod session;

pub use anthropic::AnthropicClient;
pub use model::{ChatMessage, ContentBlock, LanguageModel, ModelReply, Role};
pub use orchestrator::Orchestrator;
pub use process::ServerProcess;
pub use session::McpClientSession;
