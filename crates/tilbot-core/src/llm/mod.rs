mod traits;
mod openai;
pub mod roster;
pub mod script;
pub mod completion;

pub use traits::*;
pub use openai::OpenAIClient;
pub use roster::ModelRoster;
pub use script::ScriptHint;
pub use completion::{
    AttemptFailure, AttemptState, Completion, CompletionClient, FailureKind, RetryPolicy,
};
