/// Tilbot: centralized constants.
/// All limits, default models, file names and canned texts live here.
/// Settings defaults are built from these values.

// ─── Models ───────────────────────────────────────────────────────────────────

pub mod models {
    pub const LLAMA_33_70B: &str = "llama-3.3-70b-versatile";
    pub const LLAMA_31_8B: &str = "llama-3.1-8b-instant";
    pub const MIXTRAL_8X7B: &str = "mixtral-8x7b-32768";
    pub const LLAMA_32_3B: &str = "llama-3.2-3b-preview";

    /// Default roster, tried in this order.
    pub const DEFAULT_ROSTER: &[&str] = &[LLAMA_33_70B, LLAMA_31_8B, MIXTRAL_8X7B, LLAMA_32_3B];

    /// Model id recorded for canned replies when every attempt failed.
    pub const FALLBACK_SENTINEL: &str = "fallback";
}

// ─── API Endpoints ────────────────────────────────────────────────────────────

pub mod endpoints {
    pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai";
    pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";
    pub const TELEGRAM_BASE_URL: &str = "https://api.telegram.org";
}

// ─── Completion Parameters ────────────────────────────────────────────────────

pub mod sampling {
    pub const MAX_TOKENS: u32 = 2048;
    pub const TEMPERATURE: f32 = 0.7;
    pub const TOP_P: f32 = 0.9;
}

// ─── Retry Policy ─────────────────────────────────────────────────────────────

pub mod retry {
    pub const ATTEMPTS: u32 = 2;
    pub const REQUEST_TIMEOUT_SECS: u64 = 15;
    pub const RATE_LIMIT_BACKOFF_MS: u64 = 500;
    pub const FAILURE_BACKOFF_MS: u64 = 300;
    /// Answers to Kazakh questions shorter than this are treated as low quality.
    pub const MIN_TARGET_ANSWER_CHARS: usize = 10;
}

// ─── History Limits ───────────────────────────────────────────────────────────

pub mod history {
    pub const MAX_EXCHANGES: usize = 30;
    pub const FLUSH_EVERY: u64 = 5;
    pub const FLUSH_INTERVAL_SECS: u64 = 300;
    pub const QUESTION_CAP: usize = 2048;
    pub const ANSWER_CAP: usize = 2048;
    pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";
}

// ─── Conversation Limits ──────────────────────────────────────────────────────

pub mod conversation {
    pub const MIN_CHARS: usize = 2;
    pub const MAX_CHARS: usize = 2000;
    pub const CHUNK_CHARS: usize = 3000;
    pub const CONTEXT_EXCHANGES: usize = 3;
    pub const CONTEXT_PREVIEW_CHARS: usize = 100;
    pub const LISTING_EXCHANGES: usize = 10;
    pub const LISTING_PREVIEW_CHARS: usize = 50;
    pub const LISTING_MODEL_CHARS: usize = 10;
    /// `/start` counts at most this many recent questions.
    pub const WELCOME_EXCHANGES: usize = 5;
}

// ─── Transport ────────────────────────────────────────────────────────────────

pub mod transport {
    pub const POLL_TIMEOUT_SECS: u64 = 20;
    pub const POLL_ERROR_BACKOFF_SECS: u64 = 3;
    pub const HEALTH_BIND: &str = "0.0.0.0:8080";
    pub const HEALTH_BODY: &str = "alive";
}

// ─── Paths ────────────────────────────────────────────────────────────────────

pub mod paths {
    pub const CONFIG_DIR: &str = "tilbot";
    pub const CONFIG_FILE: &str = "config.toml";
    pub const MEMORY_FILE: &str = "bot_memory.json";
    pub const BACKUP_SUFFIX: &str = "backup";
    pub const AUDIT_LOG_FILE: &str = "bot_log.txt";
    pub const SECRETS_FILE: &str = "secret.txt";
}

// ─── Credentials ──────────────────────────────────────────────────────────────

pub mod secrets {
    pub const TELEGRAM_TOKEN: &str = "TELEGRAM_TOKEN";
    pub const GROQ_API_KEY: &str = "GROQ_API_KEY";
}

// ─── Scripts ──────────────────────────────────────────────────────────────────

pub mod scripts {
    /// Letters that appear in Kazakh but not in Russian.
    pub const KAZAKH_LETTERS: &str = "әғқңөұүіӘҒҚҢӨҰҮІ";
    pub const RUSSIAN_LETTERS: &str =
        "абвгдеёжзийклмнопрстуфхцчшщъыьэюяАБВГДЕЁЖЗИЙКЛМНОПРСТУФХЦЧШЩЪЫЬЭЮЯ";
}

// ─── Prompts ──────────────────────────────────────────────────────────────────

pub mod prompts {
    pub const SYSTEM: &str = "Сіз қазақ және орыс тілдерінде сөйлейтін көмекшісіз. \
        Егер сұрақ қазақ тілінде болса, қазақ тілінде жауап беріңіз. \
        Егер орыс тілінде болса, орыс тілінде жауап беріңіз. \
        Жауаптарыңыз пайдалы және мейірімді болсын.";

    pub const KAZAKH_PREAMBLE: &str = "Сәлеметсіз бе! Сіз қазақ тілінде сұрақ қойдыңыз. \
        Жауабыңызды қазақ тілінде беріңіз, егер сұрақ орыс тілінде болса, онда орыс тілінде жауап беріңіз.\n\n";

    pub const RUSSIAN_PREAMBLE: &str =
        "Здравствуйте! Ваш вопрос на русском. Отвечу на русском языке.\n\n";

    pub const CONTEXT_HEADER: &str = "Өткен сөйлесулеріміз (предыдущие разговоры):\n";

    pub const CONTEXT_QUESTION_LABEL: &str = "Мен";
    pub const CONTEXT_ANSWER_LABEL: &str = "Сіз";

    pub const NEW_QUESTION_LABEL: &str = "Жаңа сұрақ / Новый вопрос: ";
}

// ─── Canned Replies ───────────────────────────────────────────────────────────

pub mod replies {
    pub const FALLBACKS: &[&str] = &[
        "Кешіріңіз, қазір жауап бере алмаймын. Біраздан соң қайталап көріңіз. 😊",
        "Извините, сейчас не могу ответить. Попробуйте через некоторое время. 😊",
        "Қазір серверде қиындық бар. Біраздан кейін сұраңыз. 🙏",
    ];

    pub const UNKNOWN_COMMAND: &str = "Белгісіз команда / Неизвестная команда";
    pub const TOO_SHORT: &str = "Өте қысқа / Слишком коротко";
    pub const HISTORY_EMPTY: &str = "Әлі тарихыңыз жоқ / История пока пуста";
    pub const CLEAR_EMPTY: &str = "Тарихыңыз бос / История уже пуста";
    pub const DELIVERY_ERROR: &str =
        "Кешіріңіз, жауап жіберуде қате пайда болды / Извините, ошибка при отправке ответа";
}
