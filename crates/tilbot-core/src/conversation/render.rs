//! User-facing texts for command replies. Bilingual Kazakh / Russian, as the
//! bot answers in either language.

use std::fmt::Write;

use chrono::Local;

use crate::constants::conversation::{LISTING_MODEL_CHARS, LISTING_PREVIEW_CHARS};
use crate::history::{Exchange, HistoryStats};
use crate::text::truncate_chars;

pub fn welcome(retained: usize) -> String {
    format!(
        "🤖 *Сәлем! / Hello!*\n\n\
         Мен қазақ және орыс тілдерінде сөйлейтін көмекшімін.\n\
         Просто напишите вопрос на русском или казахском!\n\n\
         📊 Мен сіздің соңғы {retained} сұрағыңызды есімде сақтаймын\n\n\
         *Командалар / Команды:*\n\
         /history - Соңғы сұрақтар\n\
         /clear - Тарихыңызды тазарту\n\
         /stats - Статистика\n\
         /model - Ағымдағы модель\n\
         /lang - Тіл параметрлері\n\
         /help - Көмек\n\n\
         Жазған тіліңізге қарай жауап беремін! ✨"
    )
}

/// Numbered listing of `recent`, which is already most-recent-first.
/// Plain text: user content must not be parsed as markup.
pub fn history_listing(recent: &[Exchange]) -> String {
    let mut text = String::from("📜 Соңғы сұрақтарыңыз / Последние вопросы:\n\n");
    for (i, exchange) in recent.iter().enumerate() {
        let date = exchange
            .timestamp()
            .with_timezone(&Local)
            .format("%d.%m %H:%M");
        let _ = writeln!(
            text,
            "{}. [{}] {}...",
            i + 1,
            date,
            truncate_chars(exchange.model(), LISTING_MODEL_CHARS)
        );
        let _ = writeln!(
            text,
            "   👤: {}...",
            truncate_chars(exchange.question(), LISTING_PREVIEW_CHARS)
        );
        let _ = writeln!(
            text,
            "   🤖: {}...\n",
            truncate_chars(exchange.answer(), LISTING_PREVIEW_CHARS)
        );
    }
    text
}

pub fn cleared(count: usize) -> String {
    format!(
        "✅ Тарих тазартылды! {count} хабарлама жойылды.\n\
         ✅ История очищена! Удалено {count} сообщений."
    )
}

pub fn stats(stats: &HistoryStats, current_model: &str) -> String {
    let mut text = format!(
        "📊 *Статистика / Statistics:*\n\n\
         👥 Пайдаланушылар / Пользователи: *{}*\n\
         💬 Барлық хабарламалар / Все сообщения: *{}*\n\
         📨 Сіздің хабарламаларыңыз / Ваши сообщения: *{}*\n\n\
         🤖 *Модельдер бойынша / По моделям:*\n",
        stats.total_users, stats.total_exchanges, stats.user_exchanges
    );
    for (model, count) in &stats.by_model {
        let _ = writeln!(text, "  • {model}: {count}");
    }
    let _ = write!(
        text,
        "\n⚙️ *Ағымдағы модель / Текущая модель:* {current_model}"
    );
    text
}

pub fn model_info(models: &[String], current: &str) -> String {
    let listing = models
        .iter()
        .map(|m| {
            if m == current {
                format!("  • {m} ✅")
            } else {
                format!("  • {m}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "🤖 *Модель ақпараты / Model info:*\n\n\
         Ағымдағы / Текущая: *{current}*\n\n\
         Барлық қолжетімді модельдер / Все доступные модели:\n\
         {listing}\n\n\
         Автоматты түрде ең жақсы жұмыс істейтін модель таңдалады.\n"
    )
}

pub fn language_settings(current: &str) -> String {
    format!(
        "🌍 *Тіл параметрлері / Language settings:*\n\n\
         Бот сіздің сұрағыңыздың тіліне қарай автоматты түрде жауап береді.\n\n\
         Егер сұрақ қазақ тілінде болса:\n  → Жауап қазақ тілінде болады\n\n\
         Егер сұрақ орыс тілінде болса:\n  → Жауап орыс тілінде болады\n\n\
         Егер аралас сұрақ болса:\n  → Негізгі тілде жауап, қажет болса аударма қосады\n\n\
         Қазіргі уақытта қолданыстағы модель: *{current}*\n\n\
         Сұрақ қойып көріңіз! 😊\n"
    )
}

pub fn too_long(max_chars: usize) -> String {
    format!(
        "Өте ұзын ({max_chars} таңбадан аспауы керек) / Слишком длинно (макс {max_chars} символов)"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welcome_mentions_count_and_commands() {
        let text = welcome(7);
        assert!(text.contains("соңғы 7 сұрағыңызды"));
        for cmd in ["/history", "/clear", "/stats", "/model", "/lang", "/help"] {
            assert!(text.contains(cmd), "missing {cmd}");
        }
    }

    #[test]
    fn test_model_info_marks_current() {
        let models = vec!["a".to_string(), "b".to_string()];
        let text = model_info(&models, "b");
        assert!(text.contains("  • a\n"));
        assert!(text.contains("  • b ✅"));
        assert!(text.contains("*b*"));
    }

    #[test]
    fn test_stats_lists_models_in_order() {
        let summary = HistoryStats {
            user_exchanges: 1,
            total_exchanges: 3,
            total_users: 2,
            by_model: vec![("m1".into(), 2), ("fallback".into(), 1)],
        };
        let text = stats(&summary, "m1");
        let m1 = text.find("• m1: 2").unwrap();
        let fb = text.find("• fallback: 1").unwrap();
        assert!(m1 < fb);
        assert!(text.contains("*2*"));
        assert!(text.ends_with("m1"));
    }

    #[test]
    fn test_history_listing_previews() {
        let long = "с".repeat(80);
        let recent = vec![Exchange::new(&long, "жауап", "llama-3.3-70b-versatile")];
        let text = history_listing(&recent);
        assert!(text.contains("1. ["));
        assert!(text.contains("] llama-3.3-..."));
        assert!(text.contains(&format!("👤: {}...", "с".repeat(50))));
        assert!(text.contains("🤖: жауап..."));
    }

    #[test]
    fn test_too_long_uses_limit() {
        assert!(too_long(2000).contains("2000"));
    }
}
