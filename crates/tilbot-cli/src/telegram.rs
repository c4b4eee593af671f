//! Minimal Telegram Bot API client: long-poll for updates, send text, send
//! chat actions. Only the fields the bot reads are modelled.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tilbot_core::constants::endpoints;
use tilbot_core::TilbotError;

/// Extra time allowed on top of the long-poll timeout before the HTTP request
/// itself gives up.
const POLL_GRACE_SECS: u64 = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

impl IncomingMessage {
    /// History key for the sender; falls back to the chat id for channel posts.
    pub fn user_key(&self) -> String {
        match &self.from {
            Some(user) => user.id.to_string(),
            None => self.chat.id.to_string(),
        }
    }

    /// Sender name for log lines: `@username` when set, else the history key.
    pub fn sender(&self) -> String {
        match self.from.as_ref().and_then(|u| u.username.as_deref()) {
            Some(username) => format!("@{username}"),
            None => self.user_key(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParseMode {
    Markdown,
}

/// Envelope every Bot API method returns.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct GetUpdates<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to_message_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<ParseMode>,
}

#[derive(Debug, Serialize)]
struct SendChatAction<'a> {
    chat_id: i64,
    action: &'a str,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

pub struct TelegramClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl TelegramClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: token.into(),
            base_url: endpoints::TELEGRAM_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    /// Long-poll for message updates after `offset`.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TilbotError> {
        let body = GetUpdates {
            offset,
            timeout: timeout_secs,
            allowed_updates: &["message"],
        };
        self.call(
            "getUpdates",
            &body,
            Some(Duration::from_secs(timeout_secs + POLL_GRACE_SECS)),
        )
        .await
    }

    /// Send `text` to `chat_id`, optionally as a reply. Returns the new
    /// message id.
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
        parse_mode: Option<ParseMode>,
    ) -> Result<i64, TilbotError> {
        let body = SendMessage {
            chat_id,
            text,
            reply_to_message_id: reply_to,
            parse_mode,
        };
        let sent: SentMessage = self.call("sendMessage", &body, None).await?;
        Ok(sent.message_id)
    }

    pub async fn send_typing(&self, chat_id: i64) -> Result<(), TilbotError> {
        let body = SendChatAction {
            chat_id,
            action: "typing",
        };
        let _: bool = self.call("sendChatAction", &body, None).await?;
        Ok(())
    }

    async fn call<B, T>(
        &self,
        method: &str,
        body: &B,
        timeout: Option<Duration>,
    ) -> Result<T, TilbotError>
    where
        B: Serialize + ?Sized,
        T: for<'de> Deserialize<'de>,
    {
        let mut request = self.client.post(self.url(method)).json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        // The URL carries the bot token; keep it out of error messages.
        let response = request.send().await.map_err(|e| TilbotError::Http(e.without_url()))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| TilbotError::Http(e.without_url()))?;

        let envelope: ApiResponse<T> = serde_json::from_str(&text).map_err(|e| {
            TilbotError::Telegram(format!("{method}: unexpected response ({status}): {e}"))
        })?;

        if !envelope.ok {
            return Err(TilbotError::Telegram(format!(
                "{method}: {}",
                envelope.description.unwrap_or_else(|| status.to_string())
            )));
        }
        envelope
            .result
            .ok_or_else(|| TilbotError::Telegram(format!("{method}: missing result")))
    }
}
