use std::fmt::Write;

use crate::constants::{conversation, prompts};
use crate::history::HistoryStore;
use crate::text::{char_len, truncate_chars};

/// Renders a user's recent exchanges into a context block for the next prompt.
///
/// Read-only over the store, so builders for different users can run
/// concurrently.
pub struct ContextBuilder<'a> {
    store: &'a HistoryStore,
    exchanges: usize,
    preview_chars: usize,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(store: &'a HistoryStore) -> Self {
        Self {
            store,
            exchanges: conversation::CONTEXT_EXCHANGES,
            preview_chars: conversation::CONTEXT_PREVIEW_CHARS,
        }
    }

    pub fn with_exchanges(mut self, exchanges: usize) -> Self {
        self.exchanges = exchanges;
        self
    }

    pub fn with_preview_chars(mut self, preview_chars: usize) -> Self {
        self.preview_chars = preview_chars;
        self
    }

    /// Numbered previous question/answer pairs, oldest first. Answers are
    /// cut to the preview length; the stored answer is untouched. Empty when
    /// the user has no history.
    pub fn build(&self, user_key: &str) -> String {
        let history = self.store.history(user_key, self.exchanges);
        if history.is_empty() {
            return String::new();
        }

        let mut context = String::from(prompts::CONTEXT_HEADER);
        for (i, exchange) in history.iter().enumerate() {
            let answer = exchange.answer();
            let preview = truncate_chars(answer, self.preview_chars);
            let ellipsis = if char_len(answer) > self.preview_chars { "..." } else { "" };
            let _ = writeln!(
                context,
                "{}. {}: {}",
                i + 1,
                prompts::CONTEXT_QUESTION_LABEL,
                exchange.question()
            );
            let _ = writeln!(
                context,
                "   {}: {}{}",
                prompts::CONTEXT_ANSWER_LABEL,
                preview,
                ellipsis
            );
        }
        context
    }

    /// Context block followed by the new question under the fixed label.
    pub fn prompt(&self, user_key: &str, question: &str) -> String {
        compose_prompt(&self.build(user_key), question)
    }
}

pub fn compose_prompt(context: &str, question: &str) -> String {
    if context.is_empty() {
        format!("{}{}", prompts::NEW_QUESTION_LABEL, question)
    } else {
        format!("{}\n\n{}{}", context, prompts::NEW_QUESTION_LABEL, question)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::Exchange;

    #[test]
    fn test_empty_history_gives_empty_context() {
        let store = HistoryStore::default();
        assert_eq!(ContextBuilder::new(&store).build("nobody"), "");
    }

    #[test]
    fn test_only_last_three_are_rendered_in_order() {
        let store = HistoryStore::default();
        for n in 1..=5 {
            store.append("u", Exchange::new(format!("q{n}"), format!("a{n}"), "m"));
        }

        let context = ContextBuilder::new(&store).build("u");
        assert!(context.starts_with(prompts::CONTEXT_HEADER));
        assert!(!context.contains("q2"));
        let q3 = context.find("1. Мен: q3").unwrap();
        let q4 = context.find("2. Мен: q4").unwrap();
        let q5 = context.find("3. Мен: q5").unwrap();
        assert!(q3 < q4 && q4 < q5);
    }

    #[test]
    fn test_answer_preview_is_truncated_but_store_is_not() {
        let store = HistoryStore::default();
        let long_answer = "ж".repeat(250);
        store.append("u", Exchange::new("сұрақ", &long_answer, "m"));

        let context = ContextBuilder::new(&store).build("u");
        let expected = format!("   Сіз: {}...\n", "ж".repeat(100));
        assert!(context.contains(&expected));
        assert_eq!(store.history("u", 1)[0].answer(), long_answer);
    }

    #[test]
    fn test_prompt_appends_new_question() {
        let store = HistoryStore::default();
        let builder = ContextBuilder::new(&store);
        assert_eq!(builder.prompt("u", "Привет"), "Жаңа сұрақ / Новый вопрос: Привет");

        store.append("u", Exchange::new("Привет", "Здравствуйте", "m"));
        let prompt = builder.prompt("u", "Как дела?");
        assert!(prompt.starts_with(prompts::CONTEXT_HEADER));
        assert!(prompt.ends_with("\n\nЖаңа сұрақ / Новый вопрос: Как дела?"));
    }
}
