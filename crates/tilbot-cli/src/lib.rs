pub mod bot;
pub mod health;
pub mod telegram;

pub use bot::Bot;
pub use telegram::TelegramClient;
