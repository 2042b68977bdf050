//! Single pinned report per chat.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::channels::formatting::html_link;
use crate::traits::{ChatDelivery, PinRecord, PinStore};

pub struct PinRotationManager {
    chat: Arc<dyn ChatDelivery>,
    store: Arc<dyn PinStore>,
}

impl PinRotationManager {
    pub fn new(chat: Arc<dyn ChatDelivery>, store: Arc<dyn PinStore>) -> Self {
        Self { chat, store }
    }

    /// Send `body` to `chat_id` as the chat's new pinned report.
    ///
    /// Every stored record is unpinned and forgotten first. A failed send is
    /// the only error; a failed pin or record write leaves the message
    /// delivered but unrecorded.
    pub async fn publish(&self, chat_id: &str, body: &str) -> anyhow::Result<i32> {
        let stored = self.store.pins_for_chat(chat_id).await?;

        let mut text = body.to_string();
        if let Some(previous) = stored.last() {
            text.push_str(&format!(
                "\n\n📎 {}",
                html_link(&previous.message_url, "Previous report")
            ));
        }

        info!(chat_id, count = stored.len(), "Rotating pinned reports");
        for record in &stored {
            if let Err(e) = self.chat.unpin(chat_id, record.message_id).await {
                warn!(chat_id, message_id = record.message_id, "Failed to unpin message: {}", e);
            }
            if let Err(e) = self.store.remove_pin(chat_id, record.message_id).await {
                warn!(chat_id, message_id = record.message_id, "Failed to remove pin record: {}", e);
            }
        }

        let message_id = self.chat.send(chat_id, &text).await?;

        match self.chat.pin(chat_id, message_id).await {
            Ok(()) => {
                let record = PinRecord {
                    chat_id: chat_id.to_string(),
                    message_id,
                    message_url: self.chat.message_url(chat_id, message_id),
                    pinned_at: Utc::now(),
                };
                match self.store.replace_pins(chat_id, &record).await {
                    Ok(()) => info!(chat_id, message_id, "Pinned new report"),
                    Err(e) => warn!(chat_id, message_id, "Report pinned but not recorded: {}", e),
                }
            }
            Err(e) => {
                warn!(chat_id, message_id, "Report sent but could not be pinned: {}", e);
            }
        }
        Ok(message_id)
    }

    /// Stored records for `/stored`.
    pub async fn stored(&self, chat_id: &str) -> anyhow::Result<Vec<PinRecord>> {
        self.store.pins_for_chat(chat_id).await
    }

    /// Manual unpin for `/unpin`. The record, if any, goes too.
    pub async fn unpin(&self, chat_id: &str, message_id: i32) -> anyhow::Result<()> {
        self.chat.unpin(chat_id, message_id).await?;
        self.store.remove_pin(chat_id, message_id).await?;
        Ok(())
    }

    /// Forget every record for the chat without touching Telegram.
    pub async fn clear(&self, chat_id: &str) -> anyhow::Result<u64> {
        self.store.clear_pins(chat_id).await
    }
}
