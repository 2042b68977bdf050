pub(crate) mod formatting;
pub mod retry;
mod telegram;

pub use telegram::{spawn_telegram_channel, TelegramChannel};
