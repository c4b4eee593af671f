pub mod audit;
pub mod config;
pub mod constants;
pub mod context;
pub mod conversation;
pub mod error;
pub mod history;
pub mod llm;
pub mod text;

// Re-export key types
pub use audit::{AuditEvent, AuditLog};
pub use config::{Secrets, Settings};
pub use context::ContextBuilder;
pub use conversation::{Command, Orchestrator, Rejection, Reply, ReplyFormat, ReplyKind};
pub use error::TilbotError;
pub use history::{Exchange, FlushPolicy, HistoryStore, SnapshotFile};
pub use llm::{CompletionClient, LlmClient, LlmResponse, Message, ModelRoster, OpenAIClient, Role};
