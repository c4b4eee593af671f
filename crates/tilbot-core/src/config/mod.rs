mod secrets;

pub use secrets::Secrets;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{self, paths};
use crate::error::TilbotError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub llm: LlmSettings,
    pub history: HistorySettings,
    pub conversation: ConversationSettings,
    pub telegram: TelegramSettings,
    pub health: HealthSettings,
    pub audit: AuditSettings,
    pub secrets_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub models: Vec<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub timeout_secs: u64,
    pub attempts: u32,
    pub rate_limit_backoff_ms: u64,
    pub failure_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    pub path: PathBuf,
    pub max_exchanges: usize,
    pub flush_every: u64,
    pub flush_interval_secs: u64,
    pub question_cap: usize,
    pub answer_cap: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationSettings {
    pub min_chars: usize,
    pub max_chars: usize,
    pub chunk_chars: usize,
    pub context_exchanges: usize,
    pub context_preview_chars: usize,
    pub listing_exchanges: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramSettings {
    pub base_url: String,
    pub poll_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthSettings {
    pub enabled: bool,
    pub bind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditSettings {
    pub path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            llm: LlmSettings::default(),
            history: HistorySettings::default(),
            conversation: ConversationSettings::default(),
            telegram: TelegramSettings::default(),
            health: HealthSettings::default(),
            audit: AuditSettings::default(),
            secrets_path: PathBuf::from(paths::SECRETS_FILE),
        }
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: constants::endpoints::GROQ_BASE_URL.to_string(),
            models: constants::models::DEFAULT_ROSTER
                .iter()
                .map(|m| m.to_string())
                .collect(),
            max_tokens: constants::sampling::MAX_TOKENS,
            temperature: constants::sampling::TEMPERATURE,
            top_p: constants::sampling::TOP_P,
            timeout_secs: constants::retry::REQUEST_TIMEOUT_SECS,
            attempts: constants::retry::ATTEMPTS,
            rate_limit_backoff_ms: constants::retry::RATE_LIMIT_BACKOFF_MS,
            failure_backoff_ms: constants::retry::FAILURE_BACKOFF_MS,
        }
    }
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from(paths::MEMORY_FILE),
            max_exchanges: constants::history::MAX_EXCHANGES,
            flush_every: constants::history::FLUSH_EVERY,
            flush_interval_secs: constants::history::FLUSH_INTERVAL_SECS,
            question_cap: constants::history::QUESTION_CAP,
            answer_cap: constants::history::ANSWER_CAP,
        }
    }
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            min_chars: constants::conversation::MIN_CHARS,
            max_chars: constants::conversation::MAX_CHARS,
            chunk_chars: constants::conversation::CHUNK_CHARS,
            context_exchanges: constants::conversation::CONTEXT_EXCHANGES,
            context_preview_chars: constants::conversation::CONTEXT_PREVIEW_CHARS,
            listing_exchanges: constants::conversation::LISTING_EXCHANGES,
        }
    }
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            base_url: constants::endpoints::TELEGRAM_BASE_URL.to_string(),
            poll_timeout_secs: constants::transport::POLL_TIMEOUT_SECS,
        }
    }
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: constants::transport::HEALTH_BIND.to_string(),
        }
    }
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from(paths::AUDIT_LOG_FILE),
        }
    }
}

impl LlmSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl HistorySettings {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }
}

impl Settings {
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(paths::CONFIG_DIR)
            .join(paths::CONFIG_FILE)
    }

    /// Load from the default config location, falling back to defaults when
    /// the file is missing or unreadable.
    pub fn load() -> Self {
        let config_path = Self::config_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(settings) => return settings,
                Err(e) => {
                    tracing::warn!("Ignoring {}: {}", config_path.display(), e);
                }
            }
        }
        Self::default()
    }

    /// Load from an explicit path. Unlike [`Settings::load`], a bad file is an error.
    pub fn load_from(path: &Path) -> Result<Self, TilbotError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TilbotError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let settings: Settings = toml::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), TilbotError> {
        if self.llm.models.is_empty() {
            return Err(TilbotError::config("llm.models must list at least one model"));
        }
        if self.llm.attempts == 0 {
            return Err(TilbotError::config("llm.attempts must be at least 1"));
        }
        if self.history.max_exchanges == 0 {
            return Err(TilbotError::config("history.max_exchanges must be at least 1"));
        }
        if self.history.flush_every == 0 {
            return Err(TilbotError::config("history.flush_every must be at least 1"));
        }
        if self.history.flush_interval_secs == 0 {
            return Err(TilbotError::config("history.flush_interval_secs must be at least 1"));
        }
        if self.conversation.chunk_chars == 0 {
            return Err(TilbotError::config("conversation.chunk_chars must be at least 1"));
        }
        if self.conversation.min_chars > self.conversation.max_chars {
            return Err(TilbotError::config(format!(
                "conversation.min_chars ({}) exceeds max_chars ({})",
                self.conversation.min_chars, self.conversation.max_chars
            )));
        }
        Ok(())
    }

    pub fn backup_path(&self) -> PathBuf {
        crate::history::backup_path_for(&self.history.path)
    }
}
