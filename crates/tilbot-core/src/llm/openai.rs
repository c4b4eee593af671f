use crate::constants::endpoints;
use crate::error::TilbotError;
use crate::llm::traits::*;
use serde::{Deserialize, Serialize};

/// Client for OpenAI-compatible `/v1/chat/completions` endpoints (Groq by default).
pub struct OpenAIClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAIClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: endpoints::GROQ_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn url(&self) -> String {
        format!("{}{}", self.base_url, endpoints::CHAT_COMPLETIONS_PATH)
    }
}

#[derive(Debug, Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
}

#[async_trait::async_trait]
impl LlmClient for OpenAIClient {
    async fn chat(&self, request: &ChatRequest) -> Result<LlmResponse, TilbotError> {
        let request_body = OpenAIRequest {
            model: &request.model,
            messages: &request.messages,
            max_tokens: request.params.max_tokens,
            temperature: request.params.temperature,
            top_p: request.params.top_p,
        };

        let response = self
            .client
            .post(self.url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TilbotError::Timeout {
                        model: request.model.clone(),
                    }
                } else {
                    TilbotError::Http(e)
                }
            })?;

        let status = response.status();
        let response_text = response.text().await?;

        match status.as_u16() {
            429 => {
                return Err(TilbotError::RateLimited {
                    model: request.model.clone(),
                })
            }
            404 => {
                return Err(TilbotError::ModelUnavailable {
                    model: request.model.clone(),
                })
            }
            _ if !status.is_success() => {
                return Err(TilbotError::Status {
                    status: status.as_u16(),
                    body: response_text.chars().take(200).collect(),
                })
            }
            _ => {}
        }

        let api_response: OpenAIResponse = serde_json::from_str(&response_text)
            .map_err(|e| TilbotError::Llm(format!("Failed to parse response: {e}")))?;

        let content = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| TilbotError::Llm("No response from API".into()))?;

        Ok(LlmResponse {
            content,
            usage: api_response.usage,
        })
    }
}
