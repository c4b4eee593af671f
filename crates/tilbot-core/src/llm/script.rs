use crate::constants::{prompts, scripts};

/// Best-effort guess at the writing system of a piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptHint {
    /// Contains Kazakh-specific letters. Answers get a quality check.
    Kazakh,
    /// Cyrillic without Kazakh-specific letters.
    Russian,
    None,
}

impl ScriptHint {
    pub fn classify(text: &str) -> Self {
        if text.chars().any(is_kazakh_letter) {
            ScriptHint::Kazakh
        } else if text.chars().any(|c| scripts::RUSSIAN_LETTERS.contains(c)) {
            ScriptHint::Russian
        } else {
            ScriptHint::None
        }
    }

    /// Language-steering text prepended to the prompt.
    pub fn preamble(&self) -> &'static str {
        match self {
            ScriptHint::Kazakh => prompts::KAZAKH_PREAMBLE,
            ScriptHint::Russian => prompts::RUSSIAN_PREAMBLE,
            ScriptHint::None => "",
        }
    }

    pub fn is_target(&self) -> bool {
        matches!(self, ScriptHint::Kazakh)
    }
}

pub fn is_kazakh_letter(c: char) -> bool {
    scripts::KAZAKH_LETTERS.contains(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_kazakh() {
        assert_eq!(ScriptHint::classify("Қалың қалай?"), ScriptHint::Kazakh);
        assert_eq!(ScriptHint::classify("сәлем"), ScriptHint::Kazakh);
    }

    #[test]
    fn test_classify_russian() {
        assert_eq!(ScriptHint::classify("Привет"), ScriptHint::Russian);
        assert_eq!(ScriptHint::classify("Как дела?"), ScriptHint::Russian);
    }

    #[test]
    fn test_classify_none() {
        assert_eq!(ScriptHint::classify("hello there"), ScriptHint::None);
        assert_eq!(ScriptHint::classify(""), ScriptHint::None);
    }

    #[test]
    fn test_preamble_per_hint() {
        assert!(ScriptHint::Kazakh.preamble().contains("қазақ"));
        assert!(ScriptHint::Russian.preamble().contains("русском"));
        assert!(ScriptHint::None.preamble().is_empty());
        assert!(ScriptHint::Kazakh.is_target());
        assert!(!ScriptHint::Russian.is_target());
    }
}
