//! Per-message routing: validation, commands, and the question path.

pub mod commands;
mod orchestrator;
pub mod render;

pub use commands::{parse_command, Command, CommandResult};
pub use orchestrator::{Inbound, Orchestrator, Rejection, Reply, ReplyFormat, ReplyKind};
