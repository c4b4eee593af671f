//! Long-poll loop tying Telegram updates to the orchestrator.

use std::sync::Arc;
use std::time::Duration;

use tilbot_core::constants::{replies, transport};
use tilbot_core::conversation::Inbound;
use tilbot_core::{
    AuditEvent, AuditLog, Orchestrator, Reply, ReplyFormat, ReplyKind, TilbotError,
};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::telegram::{IncomingMessage, ParseMode, TelegramClient, Update};

/// How long shutdown waits for in-flight updates before the final flush.
const DRAIN_SECS: u64 = 10;

#[derive(Clone)]
pub struct Bot {
    telegram: Arc<TelegramClient>,
    orchestrator: Arc<Orchestrator>,
    audit: Option<Arc<AuditLog>>,
    poll_timeout_secs: u64,
}

impl Bot {
    pub fn new(telegram: Arc<TelegramClient>, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            telegram,
            orchestrator,
            audit: None,
            poll_timeout_secs: transport::POLL_TIMEOUT_SECS,
        }
    }

    pub fn with_audit_log(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_poll_timeout(mut self, secs: u64) -> Self {
        self.poll_timeout_secs = secs;
        self
    }

    /// Poll until `shutdown` flips to true. Each update is handled in its own
    /// task; on shutdown, in-flight tasks get a short grace period.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut offset: Option<i64> = None;
        let mut tasks = JoinSet::new();
        info!("Polling for updates");

        loop {
            let stopping = *shutdown.borrow();
            if stopping {
                break;
            }

            let result = tokio::select! {
                _ = shutdown.changed() => break,
                result = self.telegram.get_updates(offset, self.poll_timeout_secs) => result,
            };

            match result {
                Ok(updates) => {
                    for update in updates {
                        offset = Some(update.update_id + 1);
                        let bot = self.clone();
                        tasks.spawn(async move { bot.handle_update(update).await });
                    }
                }
                Err(e) => {
                    warn!("Polling failed: {}", e);
                    let backoff = Duration::from_secs(transport::POLL_ERROR_BACKOFF_SECS);
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }

            while let Some(joined) = tasks.try_join_next() {
                if let Err(e) = joined {
                    error!("Update task failed: {}", e);
                }
            }
        }

        info!("Polling stopped; waiting for {} in-flight updates", tasks.len());
        let drained = tokio::time::timeout(Duration::from_secs(DRAIN_SECS), async {
            while tasks.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!("Abandoning {} unfinished updates", tasks.len());
            tasks.abort_all();
        }
    }

    /// Answer one update. Non-text updates are ignored.
    pub async fn handle_update(&self, update: Update) {
        let Some(message) = update.message else {
            return;
        };
        let Some(text) = message.text.as_deref() else {
            return;
        };
        let user_key = message.user_key();
        debug!("Message from {} in chat {}", message.sender(), message.chat.id);

        let reply = match self.orchestrator.validate(text) {
            Inbound::Question(question) => {
                if let Err(e) = self.telegram.send_typing(message.chat.id).await {
                    debug!("Typing indicator failed: {}", e);
                }
                self.orchestrator.ask(&user_key, question).await
            }
            _ => self.orchestrator.handle(&user_key, text).await,
        };

        self.deliver(&message, &user_key, &reply).await;
    }

    /// Send the reply chunks in order: the first as a reply to the user's
    /// message, the rest as plain messages. A failed delivery is replaced
    /// with a generic apology.
    async fn deliver(&self, message: &IncomingMessage, user_key: &str, reply: &Reply) {
        match self.send_chunks(message, reply).await {
            Ok(()) => {
                if let ReplyKind::Answer { model } = &reply.kind {
                    self.audit(
                        user_key,
                        AuditEvent::ReplySent,
                        &format!(
                            "a_len:{} chunks:{} model:{}",
                            reply.text().chars().count(),
                            reply.chunks.len(),
                            model
                        ),
                    )
                    .await;
                }
            }
            Err(e) => {
                error!("Failed to deliver reply to {}: {}", user_key, e);
                let details: String = e.to_string().chars().take(100).collect();
                self.audit(user_key, AuditEvent::ReplyError, &details).await;
                if let Err(e) = self
                    .telegram
                    .send_message(
                        message.chat.id,
                        replies::DELIVERY_ERROR,
                        Some(message.message_id),
                        None,
                    )
                    .await
                {
                    error!("Failed to send apology to {}: {}", user_key, e);
                }
            }
        }
    }

    async fn send_chunks(
        &self,
        message: &IncomingMessage,
        reply: &Reply,
    ) -> Result<(), TilbotError> {
        let parse_mode = match reply.format {
            ReplyFormat::Markdown => Some(ParseMode::Markdown),
            ReplyFormat::Plain => None,
        };

        for (i, chunk) in reply.chunks.iter().enumerate() {
            let reply_to = (i == 0).then_some(message.message_id);
            let sent = self
                .telegram
                .send_message(message.chat.id, chunk, reply_to, parse_mode)
                .await;

            match sent {
                Ok(_) => {}
                // Markdown with stray entities is refused; the text still reads fine plain.
                Err(e) if parse_mode.is_some() => {
                    warn!("Markdown reply refused ({}); resending as plain text", e);
                    self.telegram
                        .send_message(message.chat.id, chunk, reply_to, None)
                        .await?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    async fn audit(&self, user_key: &str, event: AuditEvent, details: &str) {
        if let Some(audit) = &self.audit {
            audit.record(user_key, event, details).await;
        }
    }
}
