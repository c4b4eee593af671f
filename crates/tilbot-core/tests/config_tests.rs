use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;
use tilbot_core::config::Settings;
use tilbot_core::history::HistoryStore;
use tilbot_core::llm::{CompletionClient, OpenAIClient};
use tilbot_core::TilbotError;

#[test]
fn test_defaults_match_bot_constants() {
    let settings = Settings::default();
    assert_eq!(settings.llm.models[0], "llama-3.3-70b-versatile");
    assert_eq!(settings.llm.models.len(), 4);
    assert_eq!(settings.llm.request_timeout(), Duration::from_secs(15));
    assert_eq!(settings.llm.attempts, 2);
    assert_eq!(settings.history.max_exchanges, 30);
    assert_eq!(settings.history.flush_every, 5);
    assert_eq!(settings.history.flush_interval(), Duration::from_secs(300));
    assert_eq!(settings.conversation.min_chars, 2);
    assert_eq!(settings.conversation.max_chars, 2000);
    assert_eq!(settings.conversation.chunk_chars, 3000);
    assert_eq!(settings.backup_path(), PathBuf::from("bot_memory.json.backup"));
    assert!(settings.validate().is_ok());
}

#[test]
fn test_partial_file_keeps_other_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[llm]
models = ["llama-3.1-8b-instant"]
attempts = 3

[history]
path = "/var/lib/tilbot/memory.json"
max_exchanges = 10
"#,
    )
    .unwrap();

    let settings = Settings::load_from(&path).unwrap();
    assert_eq!(settings.llm.models, vec!["llama-3.1-8b-instant"]);
    assert_eq!(settings.llm.attempts, 3);
    assert_eq!(settings.llm.max_tokens, 2048);
    assert_eq!(settings.history.max_exchanges, 10);
    assert_eq!(settings.history.flush_every, 5);
    assert_eq!(
        settings.backup_path(),
        PathBuf::from("/var/lib/tilbot/memory.json.backup")
    );
    assert!(settings.health.enabled);
}

#[test]
fn test_invalid_values_are_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    std::fs::write(&path, "[llm]\nmodels = []\n").unwrap();
    assert!(matches!(Settings::load_from(&path), Err(TilbotError::Config(_))));

    std::fs::write(&path, "[conversation]\nmin_chars = 10\nmax_chars = 5\n").unwrap();
    assert!(matches!(Settings::load_from(&path), Err(TilbotError::Config(_))));

    std::fs::write(&path, "[history]\nflush_every = 0\n").unwrap();
    assert!(matches!(Settings::load_from(&path), Err(TilbotError::Config(_))));
}

#[test]
fn test_malformed_toml_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[llm\nmodels = ").unwrap();
    assert!(matches!(Settings::load_from(&path), Err(TilbotError::Toml(_))));
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let result = Settings::load_from(&dir.path().join("nope.toml"));
    assert!(matches!(result, Err(TilbotError::Config(_))));
}

#[test]
fn test_components_build_from_settings() {
    let dir = TempDir::new().unwrap();
    let mut settings = Settings::default();
    settings.history.path = dir.path().join("memory.json");
    settings.llm.models = vec!["a".into(), "b".into()];

    let store = HistoryStore::from_settings(&settings.history);
    assert_eq!(store.max_exchanges(), 30);
    assert_eq!(store.flush_policy().every, 5);

    let client = OpenAIClient::new("key").with_base_url(settings.llm.base_url.clone());
    let completion = CompletionClient::from_settings(Box::new(client), &settings.llm).unwrap();
    assert_eq!(completion.current_model(), "a");
    assert_eq!(completion.models(), vec!["a", "b"]);
}
