use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::constants;
use crate::text::truncate_chars;

/// One question/answer pair with the model that produced the answer.
///
/// Field aliases accept snapshot files written by the earlier bot, which used
/// single-letter Cyrillic keys and a float epoch timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    #[serde(alias = "в")]
    question: String,
    #[serde(alias = "о")]
    answer: String,
    #[serde(alias = "т", deserialize_with = "deserialize_timestamp")]
    timestamp: DateTime<Utc>,
    #[serde(alias = "д", default)]
    date: String,
    #[serde(alias = "м", default = "unknown_model")]
    model: String,
}

/// Length caps applied when an exchange is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeCaps {
    pub question: usize,
    pub answer: usize,
}

impl Default for ExchangeCaps {
    fn default() -> Self {
        Self {
            question: constants::history::QUESTION_CAP,
            answer: constants::history::ANSWER_CAP,
        }
    }
}

impl Exchange {
    pub fn new(
        question: impl AsRef<str>,
        answer: impl AsRef<str>,
        model: impl Into<String>,
    ) -> Self {
        Self::with_caps(question, answer, model, ExchangeCaps::default())
    }

    pub fn with_caps(
        question: impl AsRef<str>,
        answer: impl AsRef<str>,
        model: impl Into<String>,
        caps: ExchangeCaps,
    ) -> Self {
        Self::recorded_at(question, answer, model, caps, Utc::now())
    }

    pub fn recorded_at(
        question: impl AsRef<str>,
        answer: impl AsRef<str>,
        model: impl Into<String>,
        caps: ExchangeCaps,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            question: truncate_chars(question.as_ref(), caps.question).to_string(),
            answer: truncate_chars(answer.as_ref(), caps.answer).to_string(),
            date: timestamp
                .with_timezone(&Local)
                .format(constants::history::DATE_FORMAT)
                .to_string(),
            timestamp,
            model: model.into(),
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Human-readable local rendering of [`Exchange::timestamp`].
    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn is_fallback(&self) -> bool {
        self.model == constants::models::FALLBACK_SENTINEL
    }
}

fn unknown_model() -> String {
    "unknown".to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    EpochSeconds(f64),
    Rfc3339(DateTime<Utc>),
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    match RawTimestamp::deserialize(deserializer)? {
        RawTimestamp::Rfc3339(ts) => Ok(ts),
        RawTimestamp::EpochSeconds(secs) => {
            let whole = secs.trunc() as i64;
            let nanos = (secs.fract() * 1e9) as u32;
            DateTime::<Utc>::from_timestamp(whole, nanos)
                .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {secs}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caps_truncate_by_characters() {
        let caps = ExchangeCaps {
            question: 4,
            answer: 3,
        };
        let exchange = Exchange::with_caps("сұрақ", "жауап", "m1", caps);
        assert_eq!(exchange.question(), "сұра");
        assert_eq!(exchange.answer(), "жау");
        assert_eq!(exchange.model(), "m1");
    }

    #[test]
    fn test_date_is_rendered_from_timestamp() {
        let ts = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        let exchange = Exchange::recorded_at("q", "a", "m", ExchangeCaps::default(), ts);
        let expected = ts
            .with_timezone(&Local)
            .format(constants::history::DATE_FORMAT)
            .to_string();
        assert_eq!(exchange.date(), expected);
        assert_eq!(exchange.timestamp(), ts);
    }

    #[test]
    fn test_reads_legacy_record() {
        let raw = r#"{"в": "Сәлем", "о": "Сәлеметсіз бе!", "т": 1700000000.5, "д": "2023-11-14 22:13", "м": "llama-3.1-8b-instant"}"#;
        let exchange: Exchange = serde_json::from_str(raw).unwrap();
        assert_eq!(exchange.question(), "Сәлем");
        assert_eq!(exchange.answer(), "Сәлеметсіз бе!");
        assert_eq!(exchange.timestamp().timestamp(), 1_700_000_000);
        assert_eq!(exchange.model(), "llama-3.1-8b-instant");
    }

    #[test]
    fn test_missing_model_reads_as_unknown() {
        let raw = r#"{"question": "q", "answer": "a", "timestamp": "2024-01-01T00:00:00Z"}"#;
        let exchange: Exchange = serde_json::from_str(raw).unwrap();
        assert_eq!(exchange.model(), "unknown");
        assert_eq!(exchange.date(), "");
    }

    #[test]
    fn test_fallback_flag() {
        assert!(Exchange::new("q", "a", constants::models::FALLBACK_SENTINEL).is_fallback());
        assert!(!Exchange::new("q", "a", "llama").is_fallback());
    }
}
