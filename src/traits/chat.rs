use async_trait::async_trait;

/// A chat destination that can send, pin and unpin messages.
///
/// `send` applies the channel's retry policy; an `Err` means every attempt
/// failed. Pin and unpin are single attempts.
#[async_trait]
pub trait ChatDelivery: Send + Sync {
    /// Send an HTML message, returning the new message id.
    async fn send(&self, chat_id: &str, text: &str) -> anyhow::Result<i32>;

    /// Pin a message silently.
    async fn pin(&self, chat_id: &str, message_id: i32) -> anyhow::Result<()>;

    async fn unpin(&self, chat_id: &str, message_id: i32) -> anyhow::Result<()>;

    /// Remove the bot's registered command menu.
    async fn clear_commands(&self) -> anyhow::Result<()>;

    /// Public link to a message, used for the "previous report" chain.
    fn message_url(&self, chat_id: &str, message_id: i32) -> String;
}
