use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::channels::retry::{Backoff, RetryPolicy};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub telegram: TelegramConfig,
    pub trello: TrelloConfig,
    #[serde(default)]
    pub lists: ListsConfig,
    #[serde(default)]
    pub users: UsersConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub state: StateConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    /// The only chat allowed to issue commands.
    #[serde(default)]
    pub peer_id: String,
    /// Where notifications and scheduled digests go. Defaults to `peer_id`.
    #[serde(default)]
    pub report_chat_id: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrelloConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub board_ids: Vec<String>,
    #[serde(default = "default_trello_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_trello_base_url() -> String {
    "https://api.trello.com/1".to_string()
}
fn default_request_timeout_secs() -> u64 {
    30
}

/// List-name markers. Matching is case-insensitive substring.
#[derive(Debug, Deserialize, Clone)]
pub struct ListsConfig {
    #[serde(default = "default_done_lists")]
    pub done: Vec<String>,
    #[serde(default = "default_in_progress_lists")]
    pub in_progress: Vec<String>,
}

impl Default for ListsConfig {
    fn default() -> Self {
        Self {
            done: default_done_lists(),
            in_progress: default_in_progress_lists(),
        }
    }
}

fn default_done_lists() -> Vec<String> {
    vec!["done".into(), "completed".into()]
}
fn default_in_progress_lists() -> Vec<String> {
    vec!["in progress".into(), "doing".into()]
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct UsersConfig {
    /// Trello username -> Telegram tag (e.g. "@alice").
    #[serde(default)]
    pub trello_to_telegram: HashMap<String, String>,
}

impl UsersConfig {
    /// Telegram tag for a Trello user, falling back to `@username`.
    pub fn telegram_tag(&self, trello_username: &str) -> String {
        self.trello_to_telegram
            .get(trello_username)
            .cloned()
            .unwrap_or_else(|| format!("@{}", trello_username))
    }

    /// Reverse lookup used by `/mt`. Ignores a leading `@` and case.
    pub fn trello_username_for(&self, telegram_username: &str) -> Option<String> {
        let wanted = telegram_username.trim_start_matches('@').to_lowercase();
        self.trello_to_telegram
            .iter()
            .find(|(_, tg)| tg.trim_start_matches('@').to_lowercase() == wanted)
            .map(|(trello, _)| trello.clone())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: u64,
    /// Drop card state not refreshed for this many cycles of its board (0 = never).
    #[serde(default)]
    pub evict_after_cycles: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval_secs(),
            evict_after_cycles: 0,
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleConfig {
    #[serde(default = "default_schedule_enabled")]
    pub enabled: bool,
    /// Daily digest schedule (natural shortcut or 5-field cron, UTC).
    #[serde(default = "default_daily_schedule")]
    pub daily: String,
    #[serde(default = "default_weekly_schedule")]
    pub weekly: String,
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: default_schedule_enabled(),
            daily: default_daily_schedule(),
            weekly: default_weekly_schedule(),
            tick_interval_secs: default_tick_interval_secs(),
        }
    }
}

fn default_schedule_enabled() -> bool {
    true
}
fn default_daily_schedule() -> String {
    "0 8 * * 1-6".to_string()
}
fn default_weekly_schedule() -> String {
    "0 0 * * 1".to_string()
}
fn default_tick_interval_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    #[default]
    Fixed,
    Exponential,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DeliveryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub backoff: BackoffKind,
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
    /// Upper bound for a single Telegram API call.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff: BackoffKind::default(),
            backoff_secs: default_backoff_secs(),
            max_backoff_secs: default_max_backoff_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl DeliveryConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        let initial = Duration::from_secs(self.backoff_secs);
        let backoff = match self.backoff {
            BackoffKind::Fixed => Backoff::Fixed(initial),
            BackoffKind::Exponential => Backoff::Exponential {
                initial,
                max: Duration::from_secs(self.max_backoff_secs.max(self.backoff_secs)),
            },
        };
        RetryPolicy::new(self.max_attempts, backoff)
    }
}

fn default_max_attempts() -> u32 {
    10
}
fn default_backoff_secs() -> u64 {
    5
}
fn default_max_backoff_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct StateConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "boardpulse.db".to_string()
}

impl AppConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        let mut config = Self::parse(&content)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Environment values win over the file, matching how the bot was
    /// deployed with secrets kept out of config.toml.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("TELEGRAM_API_TOKEN") {
            self.telegram.bot_token = v;
        }
        if let Some(v) = get("PEER_ID") {
            self.telegram.peer_id = v;
        }
        if let Some(v) = get("REPORT_CHAT_ID") {
            self.telegram.report_chat_id = Some(v);
        }
        if let Some(v) = get("TRELLO_API_KEY") {
            self.trello.api_key = v;
        }
        if let Some(v) = get("TRELLO_TOKEN") {
            self.trello.token = v;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let required = [
            ("TELEGRAM_API_TOKEN", &self.telegram.bot_token),
            ("PEER_ID", &self.telegram.peer_id),
            ("TRELLO_API_KEY", &self.trello.api_key),
            ("TRELLO_TOKEN", &self.trello.token),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| is_placeholder(value))
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            anyhow::bail!(
                "Missing or invalid configuration values: {}. Check config.toml or the environment.",
                missing.join(", ")
            );
        }
        if self.trello.board_ids.is_empty() {
            anyhow::bail!("No board IDs configured. Add at least one entry to trello.board_ids.");
        }
        if self.lists.done.iter().all(|m| m.trim().is_empty()) {
            anyhow::bail!("lists.done must contain at least one marker");
        }
        if self.poll.interval_secs == 0 {
            anyhow::bail!("poll.interval_secs must be greater than zero");
        }
        Ok(())
    }

    /// Destination for notifications and scheduled digests.
    pub fn report_chat_id(&self) -> &str {
        self.telegram
            .report_chat_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or(&self.telegram.peer_id)
    }
}

fn is_placeholder(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value.starts_with("YOUR_")
}
