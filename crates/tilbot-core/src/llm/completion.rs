use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::config::LlmSettings;
use crate::constants::{self, models::FALLBACK_SENTINEL, prompts, replies};
use crate::error::TilbotError;
use crate::llm::roster::ModelRoster;
use crate::llm::script::{is_kazakh_letter, ScriptHint};
use crate::llm::traits::*;
use crate::text::char_len;

/// Attempt budget, per-attempt timeout and backoffs for [`CompletionClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub timeout: Duration,
    pub rate_limit_backoff: Duration,
    pub failure_backoff: Duration,
}

impl RetryPolicy {
    /// Wait before the next attempt after a failure of this kind.
    pub fn backoff_for(&self, kind: FailureKind) -> Duration {
        match kind {
            FailureKind::RateLimited => self.rate_limit_backoff,
            FailureKind::ModelUnavailable | FailureKind::LowQuality => Duration::ZERO,
            FailureKind::Timeout | FailureKind::BadStatus | FailureKind::Transport => {
                self.failure_backoff
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        use constants::retry;
        Self {
            attempts: retry::ATTEMPTS,
            timeout: Duration::from_secs(retry::REQUEST_TIMEOUT_SECS),
            rate_limit_backoff: Duration::from_millis(retry::RATE_LIMIT_BACKOFF_MS),
            failure_backoff: Duration::from_millis(retry::FAILURE_BACKOFF_MS),
        }
    }
}

/// Why a single attempt did not produce an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    RateLimited,
    ModelUnavailable,
    BadStatus,
    Transport,
    /// The call succeeded but the answer failed the quality check.
    LowQuality,
}

impl FailureKind {
    fn from_error(error: &TilbotError) -> Self {
        match error {
            TilbotError::Timeout { .. } => FailureKind::Timeout,
            TilbotError::RateLimited { .. } => FailureKind::RateLimited,
            TilbotError::ModelUnavailable { .. } => FailureKind::ModelUnavailable,
            TilbotError::Status { .. } => FailureKind::BadStatus,
            _ => FailureKind::Transport,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    pub model: String,
    pub kind: FailureKind,
}

/// Where the retry loop stands. Every attempt, successful or not, spends
/// one unit of the shared budget.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptState {
    Attempting { model_index: usize, attempt: u32 },
    Succeeded { answer: String, model: String, usage: Option<Usage> },
    ExhaustedFallback,
}

/// The answer handed back to the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub answer: String,
    /// Model that produced the answer, or `"fallback"` for a canned reply.
    pub model: String,
    pub usage: Option<Usage>,
    pub attempts: u32,
    pub failures: Vec<AttemptFailure>,
}

impl Completion {
    pub fn is_fallback(&self) -> bool {
        self.model == FALLBACK_SENTINEL
    }
}

/// Wraps an [`LlmClient`] with the model roster, quality check and canned
/// fallback. `complete` never returns an error.
pub struct CompletionClient {
    client: Box<dyn LlmClient>,
    roster: Mutex<ModelRoster>,
    policy: RetryPolicy,
    params: SamplingParams,
    system_prompt: String,
    fallback_count: AtomicU64,
}

impl CompletionClient {
    pub fn new(client: Box<dyn LlmClient>, roster: ModelRoster) -> Self {
        Self {
            client,
            roster: Mutex::new(roster),
            policy: RetryPolicy::default(),
            params: SamplingParams::default(),
            system_prompt: prompts::SYSTEM.to_string(),
            fallback_count: AtomicU64::new(0),
        }
    }

    pub fn from_settings(
        client: Box<dyn LlmClient>,
        settings: &LlmSettings,
    ) -> Result<Self, TilbotError> {
        let roster = ModelRoster::new(settings.models.iter().cloned())?;
        Ok(Self::new(client, roster)
            .with_policy(RetryPolicy {
                attempts: settings.attempts,
                timeout: settings.request_timeout(),
                rate_limit_backoff: Duration::from_millis(settings.rate_limit_backoff_ms),
                failure_backoff: Duration::from_millis(settings.failure_backoff_ms),
            })
            .with_params(SamplingParams {
                max_tokens: settings.max_tokens,
                temperature: settings.temperature,
                top_p: settings.top_p,
            }))
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_params(mut self, params: SamplingParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn current_model(&self) -> String {
        self.roster().current().to_string()
    }

    pub fn models(&self) -> Vec<String> {
        self.roster().models().to_vec()
    }

    /// How many requests have ended in a canned reply.
    pub fn fallback_count(&self) -> u64 {
        self.fallback_count.load(Ordering::Relaxed)
    }

    /// Complete `prompt`, classifying the script of the question it carries
    /// to pick a preamble and decide whether the quality check applies.
    pub async fn complete(&self, prompt: &str) -> Completion {
        self.complete_with_hint(prompt, ScriptHint::classify(question_of(prompt)))
            .await
    }

    /// Complete `prompt` with an explicit script hint.
    pub async fn complete_with_hint(&self, prompt: &str, hint: ScriptHint) -> Completion {
        let messages = vec![
            Message::system(self.system_prompt.clone()),
            Message::user(format!("{}{}", hint.preamble(), prompt)),
        ];

        let mut failures = Vec::new();
        let mut state = AttemptState::Attempting {
            model_index: self.roster().cursor(),
            attempt: 1,
        };

        loop {
            state = match state {
                AttemptState::Attempting {
                    model_index,
                    attempt,
                } => {
                    let model = self.model_at(model_index);
                    match self.attempt(&model, &messages, hint).await {
                        Ok(response) => AttemptState::Succeeded {
                            answer: response.content,
                            model,
                            usage: response.usage,
                        },
                        Err(kind) => {
                            tracing::warn!(
                                "Attempt {}/{} on {} failed: {:?}",
                                attempt,
                                self.policy.attempts,
                                model,
                                kind
                            );
                            failures.push(AttemptFailure { model, kind });
                            let next_index = self.advance_roster();

                            if attempt >= self.policy.attempts {
                                AttemptState::ExhaustedFallback
                            } else {
                                let backoff = self.policy.backoff_for(kind);
                                if !backoff.is_zero() {
                                    tokio::time::sleep(backoff).await;
                                }
                                AttemptState::Attempting {
                                    model_index: next_index,
                                    attempt: attempt + 1,
                                }
                            }
                        }
                    }
                }
                AttemptState::Succeeded {
                    answer,
                    model,
                    usage,
                } => {
                    let attempts = failures.len() as u32 + 1;
                    return Completion {
                        answer,
                        model,
                        usage,
                        attempts,
                        failures,
                    };
                }
                AttemptState::ExhaustedFallback => return self.fallback(failures),
            };
        }
    }

    async fn attempt(
        &self,
        model: &str,
        messages: &[Message],
        hint: ScriptHint,
    ) -> Result<LlmResponse, FailureKind> {
        let request = ChatRequest {
            model: model.to_string(),
            messages: messages.to_vec(),
            params: self.params,
        };

        let response = match tokio::time::timeout(self.policy.timeout, self.client.chat(&request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::debug!("Completion error from {}: {}", model, e);
                return Err(FailureKind::from_error(&e));
            }
            Err(_) => return Err(FailureKind::Timeout),
        };

        if !passes_quality_check(&response.content, hint) {
            return Err(FailureKind::LowQuality);
        }

        let tokens = response.usage.as_ref().map(|u| u.total_tokens).unwrap_or(0);
        tracing::info!(model = %model, tokens, "Completion succeeded");
        Ok(response)
    }

    fn fallback(&self, failures: Vec<AttemptFailure>) -> Completion {
        let n = self.fallback_count.fetch_add(1, Ordering::Relaxed);
        let answer = replies::FALLBACKS[(n % replies::FALLBACKS.len() as u64) as usize];
        tracing::warn!("All {} attempts failed; sending canned reply #{}", failures.len(), n + 1);

        Completion {
            answer: answer.to_string(),
            model: FALLBACK_SENTINEL.to_string(),
            usage: None,
            attempts: failures.len() as u32,
            failures,
        }
    }

    fn roster(&self) -> std::sync::MutexGuard<'_, ModelRoster> {
        self.roster.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn model_at(&self, index: usize) -> String {
        let roster = self.roster();
        roster.models()[index % roster.len()].clone()
    }

    fn advance_roster(&self) -> usize {
        let mut roster = self.roster();
        roster.advance();
        roster.cursor()
    }
}

/// The new question inside a composed prompt. The context block and the
/// label itself are bilingual, so only the text after the label says which
/// script the user wrote in.
pub fn question_of(prompt: &str) -> &str {
    prompt
        .rsplit_once(prompts::NEW_QUESTION_LABEL)
        .map_or(prompt, |(_, question)| question)
}

/// Blank answers never pass. For Kazakh input the answer must also be at
/// least a few characters long and contain Kazakh-specific letters.
pub fn passes_quality_check(answer: &str, hint: ScriptHint) -> bool {
    let answer = answer.trim();
    if answer.is_empty() {
        return false;
    }
    if hint.is_target() {
        return char_len(answer) >= constants::retry::MIN_TARGET_ANSWER_CHARS
            && answer.chars().any(is_kazakh_letter);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_check_for_kazakh() {
        assert!(passes_quality_check("Сәлеметсіз бе! Жақсы.", ScriptHint::Kazakh));
        assert!(!passes_quality_check("Ок", ScriptHint::Kazakh));
        assert!(!passes_quality_check("Здравствуйте, всё хорошо", ScriptHint::Kazakh));
    }

    #[test]
    fn test_quality_check_other_scripts_only_reject_blank() {
        assert!(passes_quality_check("Ок", ScriptHint::Russian));
        assert!(passes_quality_check("ok", ScriptHint::None));
        assert!(!passes_quality_check("   ", ScriptHint::None));
    }

    #[test]
    fn test_question_of_skips_context_and_label() {
        let prompt = crate::context::compose_prompt("Алдыңғы: Сәлем", "Привет");
        assert_eq!(question_of(&prompt), "Привет");
        assert_eq!(ScriptHint::classify(question_of(&prompt)), ScriptHint::Russian);
        assert_eq!(question_of("hello"), "hello");
    }

    #[test]
    fn test_backoff_per_failure_kind() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_for(FailureKind::RateLimited), Duration::from_millis(500));
        assert_eq!(policy.backoff_for(FailureKind::Timeout), Duration::from_millis(300));
        assert_eq!(policy.backoff_for(FailureKind::ModelUnavailable), Duration::ZERO);
        assert_eq!(policy.backoff_for(FailureKind::LowQuality), Duration::ZERO);
    }

    #[test]
    fn test_failure_kind_from_error() {
        let kind = FailureKind::from_error(&TilbotError::RateLimited { model: "m".into() });
        assert_eq!(kind, FailureKind::RateLimited);
        let kind = FailureKind::from_error(&TilbotError::Status {
            status: 500,
            body: String::new(),
        });
        assert_eq!(kind, FailureKind::BadStatus);
        let kind = FailureKind::from_error(&TilbotError::Llm("bad json".into()));
        assert_eq!(kind, FailureKind::Transport);
    }
}
