use std::collections::HashMap;

use async_trait::async_trait;

use super::{PinRecord, ProgressEntry};

/// Per-card "entered in-progress" timestamps.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// All entries for a board, keyed by card id.
    async fn progress_for_board(
        &self,
        board_id: &str,
    ) -> anyhow::Result<HashMap<String, ProgressEntry>>;

    /// Insert new entries and delete removed card ids for one board in a
    /// single transaction.
    async fn apply_progress(
        &self,
        board_id: &str,
        inserts: &[ProgressEntry],
        removals: &[String],
    ) -> anyhow::Result<()>;
}

/// Pinned report records, keyed by chat.
#[async_trait]
pub trait PinStore: Send + Sync {
    /// Records for a chat, oldest first.
    async fn pins_for_chat(&self, chat_id: &str) -> anyhow::Result<Vec<PinRecord>>;

    async fn remove_pin(&self, chat_id: &str, message_id: i32) -> anyhow::Result<()>;

    /// Atomically replace every record for the chat with `record`.
    async fn replace_pins(&self, chat_id: &str, record: &PinRecord) -> anyhow::Result<()>;

    /// Delete every record for the chat, returning how many were removed.
    async fn clear_pins(&self, chat_id: &str) -> anyhow::Result<u64>;
}
