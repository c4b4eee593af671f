use thiserror::Error;

#[derive(Error, Debug)]
pub enum TilbotError {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Rate limited on model {model}")]
    RateLimited { model: String },

    #[error("Model unavailable: {model}")]
    ModelUnavailable { model: String },

    #[error("Completion API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Request to model {model} timed out")]
    Timeout { model: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Telegram error: {0}")]
    Telegram(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl TilbotError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

pub type Result<T> = std::result::Result<T, TilbotError>;
