use std::path::Path;

use crate::constants::secrets::{GROQ_API_KEY, TELEGRAM_TOKEN};
use crate::error::TilbotError;

/// Credentials for the chat transport and the completion API.
///
/// Values come from a `key=value` secrets file first; anything missing or
/// empty there is taken from the environment.
#[derive(Clone, Default)]
pub struct Secrets {
    pub telegram_token: Option<String>,
    pub groq_api_key: Option<String>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("telegram_token", &self.telegram_token.as_ref().map(|_| "<redacted>"))
            .field("groq_api_key", &self.groq_api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Secrets {
    pub fn load(path: &Path) -> Self {
        let mut secrets = Self::from_file(path);
        secrets.fill_from_env();
        secrets
    }

    /// Read only the secrets file. Unknown keys are ignored; a missing or
    /// malformed file yields whatever was parsed before the problem.
    pub fn from_file(path: &Path) -> Self {
        let mut secrets = Self::default();
        if !path.exists() {
            return secrets;
        }

        let entries = match dotenvy::from_path_iter(path) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Failed to read secrets file {}: {}", path.display(), e);
                return secrets;
            }
        };

        for entry in entries {
            match entry {
                Ok((key, value)) => secrets.set(key.trim(), value.trim()),
                Err(e) => {
                    tracing::warn!("Stopped parsing {} at bad line: {}", path.display(), e);
                    break;
                }
            }
        }
        secrets
    }

    fn set(&mut self, key: &str, value: &str) {
        if value.is_empty() {
            return;
        }
        match key {
            TELEGRAM_TOKEN => self.telegram_token = Some(value.to_string()),
            GROQ_API_KEY => self.groq_api_key = Some(value.to_string()),
            _ => {}
        }
    }

    fn fill_from_env(&mut self) {
        if self.telegram_token.is_none() {
            self.telegram_token = non_empty_env(TELEGRAM_TOKEN);
        }
        if self.groq_api_key.is_none() {
            self.groq_api_key = non_empty_env(GROQ_API_KEY);
        }
    }

    /// The transport credential is the one secret the process cannot start without.
    pub fn require_telegram_token(&self) -> Result<&str, TilbotError> {
        self.telegram_token.as_deref().ok_or_else(|| {
            TilbotError::config(format!(
                "{TELEGRAM_TOKEN} is missing: add `{TELEGRAM_TOKEN}=<token>` to the secrets file or set it in the environment"
            ))
        })
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
