use std::sync::{Arc, RwLock as StdRwLock};
use std::time::Duration;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{BotCommand as MenuCommand, LinkPreviewOptions, MessageId, ParseMode, Recipient};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::formatting::{message_link, split_message};
use super::retry::RetryPolicy;
use crate::commands::{BotCommand, MENU};
use crate::config::AppConfig;
use crate::monitor::{CommandRequest, MonitorHandle};
use crate::traits::ChatDelivery;

/// Telegram's hard limit for one message.
const MAX_MESSAGE_LEN: usize = 4096;

pub struct TelegramChannel {
    bot: Bot,
    /// Fetched via getMe on start; "telegram" until then.
    bot_username: StdRwLock<String>,
    /// The only chat whose commands are served.
    peer_chat_id: String,
    retry: RetryPolicy,
    request_timeout: Duration,
}

impl TelegramChannel {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            bot: Bot::new(&config.telegram.bot_token),
            bot_username: StdRwLock::new("telegram".to_string()),
            peer_chat_id: config.telegram.peer_id.clone(),
            retry: config.delivery.retry_policy(),
            request_timeout: Duration::from_secs(config.delivery.request_timeout_secs.max(1)),
        }
    }

    /// Get the bot's username, fetching from Telegram API if not cached.
    async fn get_bot_username(&self) -> String {
        {
            let guard = self
                .bot_username
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if *guard != "telegram" {
                return guard.clone();
            }
        }

        match self.bot.get_me().await {
            Ok(me) => {
                let username = me
                    .username
                    .clone()
                    .unwrap_or_else(|| "telegram".to_string());
                if let Ok(mut guard) = self.bot_username.write() {
                    *guard = username.clone();
                }
                info!(username = %username, "Fetched bot username from Telegram");
                username
            }
            Err(e) => {
                warn!("Failed to fetch bot username: {}, using 'telegram'", e);
                "telegram".to_string()
            }
        }
    }

    /// Publish the command menu. Failure only costs the menu.
    async fn register_commands(&self) {
        let commands: Vec<MenuCommand> = MENU
            .iter()
            .map(|(name, description)| MenuCommand::new(*name, *description))
            .collect();
        match self.bot.set_my_commands(commands).await {
            Ok(_) => info!(count = MENU.len(), "Registered bot command menu"),
            Err(e) => warn!("Failed to register bot commands: {}", e),
        }
    }

    /// Run the dispatcher until shutdown, restarting it after crashes.
    /// Uses exponential backoff: 5s, 10s, 20s, 40s, then 60s cap.
    /// Resets backoff to initial after a stable run (60s+).
    pub async fn start_with_retry(self: Arc<Self>, monitor: MonitorHandle, shutdown: CancellationToken) {
        let bot_username = self.get_bot_username().await;
        self.register_commands().await;

        let initial_backoff = Duration::from_secs(5);
        let max_backoff = Duration::from_secs(60);
        let stable_threshold = Duration::from_secs(60);
        let mut backoff = initial_backoff;

        loop {
            info!(name = %bot_username, "Starting Telegram dispatcher");
            let started = tokio::time::Instant::now();
            self.clone().start(monitor.clone(), shutdown.clone()).await;
            if shutdown.is_cancelled() {
                break;
            }
            let ran_for = started.elapsed();

            if ran_for >= stable_threshold {
                backoff = initial_backoff;
            }

            warn!(
                name = %bot_username,
                backoff_secs = backoff.as_secs(),
                ran_for_secs = ran_for.as_secs(),
                "Telegram dispatcher stopped, restarting"
            );
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(backoff) => {}
            }
            backoff = std::cmp::min(backoff * 2, max_backoff);
        }
        info!("Telegram dispatcher stopped");
    }

    async fn start(self: Arc<Self>, monitor: MonitorHandle, shutdown: CancellationToken) {
        let handler = dptree::entry().branch(Update::filter_message().endpoint({
            let channel = Arc::clone(&self);
            move |msg: teloxide::types::Message| {
                let channel = Arc::clone(&channel);
                let monitor = monitor.clone();
                async move {
                    channel.handle_message(msg, &monitor).await;
                    respond(())
                }
            }
        }));

        let mut dispatcher = Dispatcher::builder(self.bot.clone(), handler).build();
        tokio::select! {
            _ = dispatcher.dispatch() => {}
            _ = shutdown.cancelled() => {}
        }
    }

    async fn handle_message(&self, msg: teloxide::types::Message, monitor: &MonitorHandle) {
        let Some(text) = msg.text() else {
            return;
        };
        let Some(command) = BotCommand::parse(text) else {
            return;
        };
        let chat_id = msg.chat.id.0.to_string();
        if !is_peer(&self.peer_chat_id, &chat_id) {
            debug!(chat_id = %chat_id, command = command.name(), "Ignoring command from foreign chat");
            return;
        }

        let request = CommandRequest {
            chat_id,
            from_username: msg.from.as_ref().and_then(|u| u.username.clone()),
            command,
        };
        if let Err(e) = monitor.command(request).await {
            warn!("Command not handled: {}", e);
        }
    }

    async fn send_once(&self, recipient: Recipient, text: &str) -> anyhow::Result<i32> {
        let request = self
            .bot
            .send_message(recipient, text)
            .parse_mode(ParseMode::Html)
            .link_preview_options(LinkPreviewOptions {
                is_disabled: true,
                url: None,
                prefer_small_media: false,
                prefer_large_media: false,
                show_above_text: false,
            });
        let message = tokio::time::timeout(self.request_timeout, request.send())
            .await
            .map_err(|_| anyhow::anyhow!("sendMessage timed out after {}s", self.request_timeout.as_secs()))??;
        Ok(message.id.0)
    }
}

/// Numeric ids go through as chat ids; anything else is taken as `@channel`.
fn recipient(chat_id: &str) -> Recipient {
    match chat_id.trim().parse::<i64>() {
        Ok(id) => Recipient::Id(ChatId(id)),
        Err(_) => Recipient::ChannelUsername(chat_id.trim().to_string()),
    }
}

fn is_peer(peer_chat_id: &str, chat_id: &str) -> bool {
    peer_chat_id.trim() == chat_id
}

#[async_trait]
impl ChatDelivery for TelegramChannel {
    /// Long texts go out in chunks; the first chunk's id stands for the
    /// message. Later chunks that fail are logged, not returned.
    async fn send(&self, chat_id: &str, text: &str) -> anyhow::Result<i32> {
        let mut first_id = None;
        for chunk in split_message(text, MAX_MESSAGE_LEN) {
            let result = self
                .retry
                .run("telegram send", || self.send_once(recipient(chat_id), &chunk))
                .await;
            match (result, first_id) {
                (Ok(id), None) => first_id = Some(id),
                (Ok(_), Some(_)) => {}
                (Err(e), None) => return Err(e),
                (Err(e), Some(id)) => {
                    warn!(chat_id, message_id = id, "Message continuation not delivered: {}", e);
                }
            }
        }
        first_id.ok_or_else(|| anyhow::anyhow!("refusing to send an empty message"))
    }

    async fn pin(&self, chat_id: &str, message_id: i32) -> anyhow::Result<()> {
        let request = self
            .bot
            .pin_chat_message(recipient(chat_id), MessageId(message_id))
            .disable_notification(true);
        tokio::time::timeout(self.request_timeout, request.send())
            .await
            .map_err(|_| anyhow::anyhow!("pinChatMessage timed out"))??;
        Ok(())
    }

    async fn unpin(&self, chat_id: &str, message_id: i32) -> anyhow::Result<()> {
        let request = self
            .bot
            .unpin_chat_message(recipient(chat_id))
            .message_id(MessageId(message_id));
        tokio::time::timeout(self.request_timeout, request.send())
            .await
            .map_err(|_| anyhow::anyhow!("unpinChatMessage timed out"))??;
        Ok(())
    }

    async fn clear_commands(&self) -> anyhow::Result<()> {
        tokio::time::timeout(self.request_timeout, self.bot.delete_my_commands().send())
            .await
            .map_err(|_| anyhow::anyhow!("deleteMyCommands timed out"))??;
        info!("Bot command menu cleared");
        Ok(())
    }

    fn message_url(&self, chat_id: &str, message_id: i32) -> String {
        message_link(chat_id, message_id)
    }
}

/// Spawn the dispatcher in a background task.
/// This is a separate function to avoid async type inference cycles.
pub fn spawn_telegram_channel(
    channel: Arc<TelegramChannel>,
    monitor: MonitorHandle,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        channel.start_with_retry(monitor, shutdown).await;
    })
}
