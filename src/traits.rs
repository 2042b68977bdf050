use chrono::{DateTime, Utc};

mod board;
mod chat;
mod store;

pub use board::BoardClient;
pub use chat::ChatDelivery;
pub use store::{PinStore, ProgressStore};

/// When a card was first seen in an in-progress list.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEntry {
    pub board_id: String,
    pub card_id: String,
    pub card_name: String,
    pub started_at: DateTime<Utc>,
}

/// The pinned report message for a chat.
#[derive(Debug, Clone, PartialEq)]
pub struct PinRecord {
    pub chat_id: String,
    pub message_id: i32,
    pub message_url: String,
    pub pinned_at: DateTime<Utc>,
}
