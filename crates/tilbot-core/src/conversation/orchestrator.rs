use std::sync::Arc;

use crate::audit::{AuditEvent, AuditLog};
use crate::config::{ConversationSettings, HistorySettings};
use crate::constants::{conversation::WELCOME_EXCHANGES, replies};
use crate::context::ContextBuilder;
use crate::conversation::commands::{parse_command, Command, CommandResult};
use crate::conversation::render;
use crate::history::{Exchange, ExchangeCaps, HistoryStats, HistoryStore};
use crate::llm::CompletionClient;
use crate::text::{char_len, chunk_text};

/// Why an inbound text was turned away before reaching the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    UnknownCommand(String),
    TooShort,
    TooLong { max: usize },
}

impl Rejection {
    pub fn message(&self) -> String {
        match self {
            Rejection::UnknownCommand(_) => replies::UNKNOWN_COMMAND.to_string(),
            Rejection::TooShort => replies::TOO_SHORT.to_string(),
            Rejection::TooLong { max } => render::too_long(*max),
        }
    }
}

/// Where an inbound text is routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound<'t> {
    /// Trimmed question text for the completion path.
    Question(&'t str),
    Command(Command),
    Rejected(Rejection),
}

/// How the transport should mark up the reply text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyFormat {
    Plain,
    Markdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyKind {
    /// A completion; `model` is `"fallback"` for a canned apology.
    Answer { model: String },
    Command(Command),
    Rejected(Rejection),
}

/// What to send back for one inbound message, already split into
/// deliverable chunks in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub chunks: Vec<String>,
    pub format: ReplyFormat,
    pub kind: ReplyKind,
}

impl Reply {
    fn plain(text: String, kind: ReplyKind, chunk_chars: usize) -> Self {
        Self {
            chunks: chunk_text(&text, chunk_chars),
            format: ReplyFormat::Plain,
            kind,
        }
    }

    fn markdown(text: String, command: Command, chunk_chars: usize) -> Self {
        Self {
            chunks: chunk_text(&text, chunk_chars),
            format: ReplyFormat::Markdown,
            kind: ReplyKind::Command(command),
        }
    }

    /// The full reply text, chunks rejoined.
    pub fn text(&self) -> String {
        self.chunks.concat()
    }

    pub fn is_answer(&self) -> bool {
        matches!(self.kind, ReplyKind::Answer { .. })
    }
}

/// Handles one inbound message at a time per call; calls for different users
/// run concurrently and share only the history store and completion client.
pub struct Orchestrator {
    store: Arc<HistoryStore>,
    completion: Arc<CompletionClient>,
    audit: Option<Arc<AuditLog>>,
    settings: ConversationSettings,
    caps: ExchangeCaps,
}

impl Orchestrator {
    pub fn new(store: Arc<HistoryStore>, completion: Arc<CompletionClient>) -> Self {
        Self {
            store,
            completion,
            audit: None,
            settings: ConversationSettings::default(),
            caps: ExchangeCaps::default(),
        }
    }

    pub fn with_audit_log(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_settings(mut self, settings: ConversationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_caps(mut self, caps: ExchangeCaps) -> Self {
        self.caps = caps;
        self
    }

    pub fn with_history_settings(self, history: &HistorySettings) -> Self {
        self.with_caps(ExchangeCaps {
            question: history.question_cap,
            answer: history.answer_cap,
        })
    }

    pub fn store(&self) -> &Arc<HistoryStore> {
        &self.store
    }

    pub fn settings(&self) -> &ConversationSettings {
        &self.settings
    }

    /// Route `text` to a command, a rejection, or the completion path.
    /// Length bounds apply to the trimmed text and only to questions.
    pub fn validate<'t>(&self, text: &'t str) -> Inbound<'t> {
        let text = text.trim();
        match parse_command(text) {
            CommandResult::Command(command) => return Inbound::Command(command),
            CommandResult::Unknown(token) => {
                return Inbound::Rejected(Rejection::UnknownCommand(token))
            }
            CommandResult::NotACommand => {}
        }

        let len = char_len(text);
        if len < self.settings.min_chars {
            Inbound::Rejected(Rejection::TooShort)
        } else if len > self.settings.max_chars {
            Inbound::Rejected(Rejection::TooLong {
                max: self.settings.max_chars,
            })
        } else {
            Inbound::Question(text)
        }
    }

    /// One pass over an inbound message. Never fails: every outcome is a
    /// reply for the user.
    pub async fn handle(&self, user_key: &str, raw_text: &str) -> Reply {
        match self.validate(raw_text) {
            Inbound::Question(question) => self.ask(user_key, question).await,
            Inbound::Command(command) => self.run_command(user_key, command).await,
            Inbound::Rejected(rejection) => {
                tracing::debug!("Rejected message from {}: {:?}", user_key, rejection);
                Reply::plain(
                    rejection.message(),
                    ReplyKind::Rejected(rejection),
                    self.settings.chunk_chars,
                )
            }
        }
    }

    /// Complete `question` with the user's recent context, record the
    /// exchange and return the chunked answer.
    pub async fn ask(&self, user_key: &str, question: &str) -> Reply {
        let prompt = ContextBuilder::new(&self.store)
            .with_exchanges(self.settings.context_exchanges)
            .with_preview_chars(self.settings.context_preview_chars)
            .prompt(user_key, question);

        let completion = self.completion.complete(&prompt).await;

        if let Some(usage) = &completion.usage {
            self.audit(
                user_key,
                AuditEvent::ApiSuccess,
                &format!("model:{} tokens:{}", completion.model, usage.total_tokens),
            )
            .await;
        }

        let outcome = self.store.append(
            user_key,
            Exchange::with_caps(question, &completion.answer, &completion.model, self.caps),
        );
        if outcome.flush_due {
            self.flush_for(user_key).await;
        }

        self.audit(
            user_key,
            AuditEvent::Chat,
            &format!(
                "model:{} q:{} a:{}",
                completion.model,
                char_len(question),
                char_len(&completion.answer)
            ),
        )
        .await;

        Reply::plain(
            completion.answer,
            ReplyKind::Answer {
                model: completion.model,
            },
            self.settings.chunk_chars,
        )
    }

    pub async fn run_command(&self, user_key: &str, command: Command) -> Reply {
        let chunk_chars = self.settings.chunk_chars;
        match command {
            Command::Start | Command::Help => {
                self.audit(user_key, AuditEvent::Start, command.name()).await;
                let retained = self.store.len_for(user_key).min(WELCOME_EXCHANGES);
                let text = render::welcome(retained);
                Reply::markdown(text, command, chunk_chars)
            }
            Command::History => {
                self.audit(user_key, AuditEvent::ViewHistory, "").await;
                let recent = self.recent_history(user_key);
                let text = if recent.is_empty() {
                    replies::HISTORY_EMPTY.to_string()
                } else {
                    render::history_listing(&recent)
                };
                Reply::plain(text, ReplyKind::Command(command), chunk_chars)
            }
            Command::Clear => {
                let removed = self.clear_history(user_key).await;
                let details = format!("removed:{removed}");
                self.audit(user_key, AuditEvent::ClearHistory, &details).await;
                let text = if removed == 0 {
                    replies::CLEAR_EMPTY.to_string()
                } else {
                    render::cleared(removed)
                };
                Reply::plain(text, ReplyKind::Command(command), chunk_chars)
            }
            Command::Stats => {
                self.audit(user_key, AuditEvent::ViewStats, "").await;
                let text = render::stats(&self.stats(user_key), &self.current_model());
                Reply::markdown(text, command, chunk_chars)
            }
            Command::Model => {
                let text = render::model_info(&self.models(), &self.current_model());
                Reply::markdown(text, command, chunk_chars)
            }
            Command::Lang => {
                let text = render::language_settings(&self.current_model());
                Reply::markdown(text, command, chunk_chars)
            }
        }
    }

    /// Up to the listing limit of exchanges, most recent first.
    pub fn recent_history(&self, user_key: &str) -> Vec<Exchange> {
        let mut recent = self.store.history(user_key, self.settings.listing_exchanges);
        recent.reverse();
        recent
    }

    pub fn stats(&self, user_key: &str) -> HistoryStats {
        self.store.stats(user_key)
    }

    pub fn current_model(&self) -> String {
        self.completion.current_model()
    }

    pub fn models(&self) -> Vec<String> {
        self.completion.models()
    }

    /// Drop the user's history; the store flushes on the blocking pool.
    pub async fn clear_history(&self, user_key: &str) -> usize {
        let store = Arc::clone(&self.store);
        let key = user_key.to_string();
        match tokio::task::spawn_blocking(move || store.clear(&key)).await {
            Ok(removed) => removed,
            Err(e) => {
                tracing::error!("Clear task for {} failed: {}", user_key, e);
                0
            }
        }
    }

    async fn flush_for(&self, user_key: &str) {
        let store = Arc::clone(&self.store);
        let key = user_key.to_string();
        match tokio::task::spawn_blocking(move || store.maybe_flush(&key)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::error!("Batch flush for {} failed: {}", user_key, e),
            Err(e) => tracing::error!("Batch flush task for {} failed: {}", user_key, e),
        }
    }

    async fn audit(&self, user_key: &str, event: AuditEvent, details: &str) {
        if let Some(audit) = &self.audit {
            audit.record(user_key, event, details).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TilbotError;
    use crate::llm::{ChatRequest, LlmClient, LlmResponse, ModelRoster};

    struct Unreachable;

    #[async_trait::async_trait]
    impl LlmClient for Unreachable {
        async fn chat(&self, _request: &ChatRequest) -> Result<LlmResponse, TilbotError> {
            panic!("validation must not reach the model");
        }
    }

    fn orchestrator() -> Orchestrator {
        let roster = ModelRoster::new(["m1"]).unwrap();
        let completion = CompletionClient::new(Box::new(Unreachable), roster);
        Orchestrator::new(Arc::new(HistoryStore::default()), Arc::new(completion))
    }

    #[test]
    fn test_validate_bounds() {
        let orch = orchestrator();
        assert_eq!(orch.validate("a"), Inbound::Rejected(Rejection::TooShort));
        assert_eq!(orch.validate("  a  "), Inbound::Rejected(Rejection::TooShort));
        assert_eq!(orch.validate(" ab "), Inbound::Question("ab"));

        let max = "ы".repeat(2000);
        assert_eq!(orch.validate(&max), Inbound::Question(max.as_str()));
        let over = "ы".repeat(2001);
        assert_eq!(
            orch.validate(&over),
            Inbound::Rejected(Rejection::TooLong { max: 2000 })
        );
    }

    #[test]
    fn test_validate_commands() {
        let orch = orchestrator();
        assert_eq!(orch.validate("/stats"), Inbound::Command(Command::Stats));
        assert_eq!(
            orch.validate("/nope"),
            Inbound::Rejected(Rejection::UnknownCommand("/nope".into()))
        );
    }

    #[tokio::test]
    async fn test_rejection_leaves_history_untouched() {
        let orch = orchestrator();
        let reply = orch.handle("u1", "x").await;
        assert_eq!(reply.kind, ReplyKind::Rejected(Rejection::TooShort));
        assert_eq!(reply.text(), replies::TOO_SHORT);
        assert_eq!(orch.store().len_for("u1"), 0);
    }

    #[tokio::test]
    async fn test_empty_history_and_clear_texts() {
        let orch = orchestrator();
        assert_eq!(orch.handle("u1", "/history").await.text(), replies::HISTORY_EMPTY);
        assert_eq!(orch.handle("u1", "/clear").await.text(), replies::CLEAR_EMPTY);
    }

    #[tokio::test]
    async fn test_static_commands_use_markdown() {
        let orch = orchestrator();
        for text in ["/start", "/help", "/stats", "/model", "/lang"] {
            assert_eq!(orch.handle("u1", text).await.format, ReplyFormat::Markdown, "{text}");
        }
        assert_eq!(orch.handle("u1", "/history").await.format, ReplyFormat::Plain);
    }
}
