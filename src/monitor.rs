//! The board monitor: the single owner of card state.
//!
//! Every poll tick, scheduled digest and chat command is handled by one
//! task, one message at a time, so card and pin state have a single writer.
//! Shutdown is only checked between messages.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::board::BoardApiError;
use crate::channels::formatting::{build_help_text, html_escape};
use crate::classify::Classifier;
use crate::commands::BotCommand;
use crate::config::{AppConfig, UsersConfig};
use crate::detector::{CardStateMap, ChangeDetector};
use crate::notifications::render_event;
use crate::pins::PinRotationManager;
use crate::reports::{
    render_daily, render_user_tasks, render_weekly, BoardSection, DailyDigest, ReportComposer,
    WeeklyDigest,
};
use crate::tracker::LongRunningTracker;
use crate::traits::{BoardClient, ChatDelivery, PinStore, ProgressStore};
use crate::types::{BoardSnapshot, CardObservation, ReportKind};

const INBOX_CAPACITY: usize = 32;

/// Everything the monitor needs from configuration.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub board_ids: Vec<String>,
    /// Notifications and scheduled digests go here.
    pub report_chat_id: String,
    /// Operator chat; receives the credentials alert.
    pub peer_chat_id: String,
    pub users: UsersConfig,
    pub poll_interval: Duration,
    pub evict_after_cycles: u64,
    /// Upper bound for any single board API call.
    pub board_timeout: Duration,
    pub help_text: String,
}

impl MonitorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            board_ids: config.trello.board_ids.clone(),
            report_chat_id: config.report_chat_id().to_string(),
            peer_chat_id: config.telegram.peer_id.clone(),
            users: config.users.clone(),
            poll_interval: Duration::from_secs(config.poll.interval_secs),
            evict_after_cycles: config.poll.evict_after_cycles,
            board_timeout: Duration::from_secs(config.trello.request_timeout_secs),
            help_text: build_help_text(&config.schedule.daily, &config.schedule.weekly),
        }
    }
}

/// A command from the peer chat.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub chat_id: String,
    /// Telegram username of the sender, without `@`.
    pub from_username: Option<String>,
    pub command: BotCommand,
}

enum MonitorMessage {
    Report(ReportKind),
    Command {
        request: CommandRequest,
        done: oneshot::Sender<()>,
    },
}

/// Cheap, cloneable way to reach the monitor task.
#[derive(Clone)]
pub struct MonitorHandle {
    tx: mpsc::Sender<MonitorMessage>,
}

impl MonitorHandle {
    /// Queue a scheduled digest. Errors only when the monitor has stopped.
    pub async fn request_report(&self, kind: ReportKind) -> anyhow::Result<()> {
        self.tx
            .send(MonitorMessage::Report(kind))
            .await
            .map_err(|_| anyhow::anyhow!("monitor stopped"))
    }

    /// Run a command and wait until its reply has been sent.
    pub async fn command(&self, request: CommandRequest) -> anyhow::Result<()> {
        let (done, wait) = oneshot::channel();
        self.tx
            .send(MonitorMessage::Command { request, done })
            .await
            .map_err(|_| anyhow::anyhow!("monitor stopped"))?;
        wait.await.map_err(|_| anyhow::anyhow!("monitor stopped"))
    }
}

/// Board snapshot plus, for weekly digests, the archive-inclusive card list.
struct Fetched {
    snapshot: BoardSnapshot,
    all_cards: Option<Vec<CardObservation>>,
}

pub struct BoardMonitor {
    board: Arc<dyn BoardClient>,
    chat: Arc<dyn ChatDelivery>,
    classifier: Classifier,
    detector: ChangeDetector,
    tracker: LongRunningTracker,
    composer: ReportComposer,
    pins: PinRotationManager,
    states: CardStateMap,
    settings: MonitorSettings,
    /// Set when the board API rejected our credentials.
    halted: Option<String>,
}

impl BoardMonitor {
    pub fn new(
        board: Arc<dyn BoardClient>,
        chat: Arc<dyn ChatDelivery>,
        progress: Arc<dyn ProgressStore>,
        pin_store: Arc<dyn PinStore>,
        classifier: Classifier,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            board,
            pins: PinRotationManager::new(chat.clone(), pin_store),
            chat,
            detector: ChangeDetector::new(classifier.clone()),
            tracker: LongRunningTracker::new(progress),
            composer: ReportComposer::new(classifier.clone()),
            classifier,
            states: CardStateMap::new(),
            settings,
            halted: None,
        }
    }

    /// Start the monitor task. It stops when `shutdown` fires, after the
    /// message in hand is fully handled.
    pub fn spawn(self, shutdown: CancellationToken) -> (MonitorHandle, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        let task = tokio::spawn(self.run(rx, shutdown));
        (MonitorHandle { tx }, task)
    }

    async fn run(mut self, mut inbox: mpsc::Receiver<MonitorMessage>, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            boards = self.settings.board_ids.len(),
            interval_secs = self.settings.poll_interval.as_secs(),
            "Board monitor started"
        );

        loop {
            let message = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                msg = inbox.recv() => match msg {
                    Some(msg) => Some(msg),
                    None => break,
                },
                _ = ticker.tick() => None,
            };

            match message {
                None => self.poll_cycle().await,
                Some(MonitorMessage::Report(kind)) => self.scheduled_report(kind).await,
                Some(MonitorMessage::Command { request, done }) => {
                    self.handle_command(request).await;
                    let _ = done.send(());
                }
            }
        }
        info!("Board monitor stopped");
    }

    // -----------------------------------------------------------------------
    // Fetching
    // -----------------------------------------------------------------------

    async fn timed<T, F>(&self, what: &str, fut: F) -> Result<T, BoardApiError>
    where
        F: Future<Output = Result<T, BoardApiError>>,
    {
        tokio::time::timeout(self.settings.board_timeout, fut)
            .await
            .map_err(|_| BoardApiError::timeout(what, self.settings.board_timeout.as_secs()))?
    }

    async fn fetch(&self, board_id: &str, with_archive: bool) -> Result<Fetched, BoardApiError> {
        let board = self.board.as_ref();
        let archive = async {
            if with_archive {
                self.timed("archived cards", board.cards(board_id, true))
                    .await
                    .map(Some)
            } else {
                Ok(None)
            }
        };
        let (info, lists, cards, all_cards) = tokio::try_join!(
            self.timed("board info", board.board_info(board_id)),
            self.timed("lists", board.lists(board_id)),
            self.timed("cards", board.cards(board_id, false)),
            archive,
        )?;
        Ok(Fetched {
            snapshot: BoardSnapshot { info, lists, cards },
            all_cards,
        })
    }

    /// Fetch every board concurrently, keeping configured order.
    async fn fetch_all(&self, with_archive: bool) -> Vec<(String, Result<Fetched, BoardApiError>)> {
        let results = join_all(
            self.settings
                .board_ids
                .iter()
                .map(|id| self.fetch(id, with_archive)),
        )
        .await;
        self.settings.board_ids.iter().cloned().zip(results).collect()
    }

    fn halt_message() -> &'static str {
        "⛔ Board polling is paused: the board API rejected our credentials. \
         Fix them and send /resume."
    }

    /// Stop touching the board API until an operator sends /resume.
    async fn halt(&mut self, err: &BoardApiError) {
        if self.halted.is_some() {
            return;
        }
        error!(error = %err, "Board API credentials rejected; halting board polling");
        self.halted = Some(err.to_string());
        if let Err(e) = self
            .chat
            .send(&self.settings.peer_chat_id, Self::halt_message())
            .await
        {
            error!("Failed to alert operator about halted polling: {}", e);
        }
    }

    /// A board refused us. Halt only if the credentials themselves are
    /// rejected; a board we merely lack access to is skipped like a
    /// missing one.
    async fn check_credentials(&mut self, board_err: &BoardApiError) {
        let check = self
            .timed("credentials", self.board.authenticated_username())
            .await;
        match check {
            Ok(username) => warn!(
                username = %username,
                error = %board_err,
                "Credentials valid but board access denied; skipping board"
            ),
            Err(e) if e.is_auth() => self.halt(&e).await,
            Err(e) => warn!(error = %e, "Could not verify board API credentials"),
        }
    }

    // -----------------------------------------------------------------------
    // Poll cycle
    // -----------------------------------------------------------------------

    /// One pass over every board: diff, notify, track, evict.
    async fn poll_cycle(&mut self) {
        if self.halted.is_some() {
            debug!("Board polling halted; skipping cycle");
            return;
        }
        let now = Utc::now();
        let mut auth_error = None;

        for (board_id, result) in self.fetch_all(false).await {
            let fetched = match result {
                Ok(fetched) => fetched,
                Err(e) if e.is_auth() => {
                    auth_error = Some(e);
                    continue;
                }
                Err(e) if e.is_retryable() => {
                    warn!(board_id = %board_id, error = %e, "Board unreachable; retrying next cycle");
                    continue;
                }
                Err(e) => {
                    error!(board_id = %board_id, error = %e, "Skipping board this cycle");
                    continue;
                }
            };
            self.process_board(&fetched.snapshot, now).await;
        }

        if let Some(e) = auth_error {
            self.check_credentials(&e).await;
        }
    }

    async fn process_board(&mut self, snapshot: &BoardSnapshot, now: DateTime<Utc>) {
        let board_id = snapshot.info.id.as_str();
        let events = self.detector.observe(&mut self.states, snapshot);

        for event in &events {
            let text = render_event(event, &snapshot.info.name, &self.settings.users);
            if let Err(e) = self.chat.send(&self.settings.report_chat_id, &text).await {
                error!(
                    board_id,
                    card_id = %event.card().card_id,
                    "Notification not delivered: {}", e
                );
            }
        }

        if let Err(e) = self.tracker.update(snapshot, &self.classifier, now).await {
            warn!(board_id, "Failed to update progress tracking: {}", e);
        }

        let evicted = self
            .states
            .evict_stale(board_id, self.settings.evict_after_cycles);
        if evicted > 0 {
            debug!(board_id, evicted, tracked = self.states.len(), "Evicted stale card state");
        }
    }

    // -----------------------------------------------------------------------
    // Digests
    // -----------------------------------------------------------------------

    async fn daily_digest(&mut self) -> DailyDigest {
        let now = Utc::now();
        let mut sections = Vec::new();
        let mut auth_error = None;

        for (board_id, result) in self.fetch_all(false).await {
            match result {
                Ok(fetched) => {
                    let progress = match self
                        .tracker
                        .update(&fetched.snapshot, &self.classifier, now)
                        .await
                    {
                        Ok(progress) => progress,
                        Err(e) => {
                            warn!(board_id = %board_id, "Progress tracking unavailable: {}", e);
                            Default::default()
                        }
                    };
                    sections.push(BoardSection::Ready(self.composer.daily_board(
                        &fetched.snapshot,
                        &progress,
                        now,
                    )));
                }
                Err(e) => {
                    warn!(board_id = %board_id, error = %e, "Board missing from daily digest");
                    sections.push(BoardSection::Failed {
                        board_id,
                        message: e.user_message(),
                    });
                    if e.is_auth() {
                        auth_error = Some(e);
                    }
                }
            }
        }

        if let Some(e) = auth_error {
            self.check_credentials(&e).await;
        }
        DailyDigest::new(sections)
    }

    async fn weekly_digest(&mut self) -> WeeklyDigest {
        let now = Utc::now();
        let mut sections = Vec::new();
        let mut auth_error = None;

        for (board_id, result) in self.fetch_all(true).await {
            match result {
                Ok(fetched) => {
                    let all_cards = fetched.all_cards.unwrap_or_default();
                    sections.push(BoardSection::Ready(self.composer.weekly_board(
                        &fetched.snapshot,
                        &all_cards,
                        now,
                    )));
                }
                Err(e) => {
                    warn!(board_id = %board_id, error = %e, "Board missing from weekly digest");
                    sections.push(BoardSection::Failed {
                        board_id,
                        message: e.user_message(),
                    });
                    if e.is_auth() {
                        auth_error = Some(e);
                    }
                }
            }
        }

        if let Some(e) = auth_error {
            self.check_credentials(&e).await;
        }
        WeeklyDigest::new(sections)
    }

    /// Daily digests rotate the chat's pinned report; weekly ones are plain.
    async fn send_report(&mut self, kind: ReportKind, chat_id: &str) -> anyhow::Result<()> {
        match kind {
            ReportKind::Daily => {
                let digest = self.daily_digest().await;
                let text = render_daily(&digest, &self.settings.users);
                self.pins.publish(chat_id, &text).await?;
            }
            ReportKind::Weekly => {
                let digest = self.weekly_digest().await;
                self.chat.send(chat_id, &render_weekly(&digest)).await?;
            }
        }
        Ok(())
    }

    async fn scheduled_report(&mut self, kind: ReportKind) {
        if self.halted.is_some() {
            warn!(kind = kind.as_str(), "Board polling halted; skipping scheduled report");
            return;
        }
        let chat_id = self.settings.report_chat_id.clone();
        match self.send_report(kind, &chat_id).await {
            Ok(()) => info!(kind = kind.as_str(), "Scheduled report sent"),
            Err(e) => error!(kind = kind.as_str(), "Failed to send scheduled report: {}", e),
        }
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    async fn reply(&self, chat_id: &str, text: &str) {
        if let Err(e) = self.chat.send(chat_id, text).await {
            error!(chat_id, "Failed to send command reply: {}", e);
        }
    }

    async fn handle_command(&mut self, request: CommandRequest) {
        let chat_id = request.chat_id.as_str();
        info!(chat_id, command = request.command.name(), "Handling command");

        let needs_board = matches!(
            request.command,
            BotCommand::CurrentReport | BotCommand::WeeklyReport | BotCommand::MyTasks
        );
        if needs_board && self.halted.is_some() {
            self.reply(chat_id, Self::halt_message()).await;
            return;
        }

        match &request.command {
            BotCommand::Help => {
                let help = self.settings.help_text.clone();
                self.reply(chat_id, &help).await;
            }
            BotCommand::CurrentReport => {
                if let Err(e) = self.send_report(ReportKind::Daily, chat_id).await {
                    error!(chat_id, "Failed to send /ct report: {}", e);
                    self.reply(chat_id, "❌ Could not create the report. Details are in the log.")
                        .await;
                }
            }
            BotCommand::WeeklyReport => {
                if let Err(e) = self.send_report(ReportKind::Weekly, chat_id).await {
                    error!(chat_id, "Failed to send /wr report: {}", e);
                    self.reply(
                        chat_id,
                        "❌ Could not create the weekly report. Details are in the log.",
                    )
                    .await;
                }
            }
            BotCommand::MyTasks => {
                let text = self.my_tasks(request.from_username.as_deref()).await;
                self.reply(chat_id, &text).await;
            }
            BotCommand::Stored => {
                let text = match self.pins.stored(chat_id).await {
                    Ok(records) if records.is_empty() => "📌 No stored pinned messages".to_string(),
                    Ok(records) => {
                        let lines: Vec<String> = records
                            .iter()
                            .map(|r| {
                                format!(
                                    "• {} ({})",
                                    r.message_id,
                                    r.pinned_at.format("%Y-%m-%d %H:%M UTC")
                                )
                            })
                            .collect();
                        format!("📌 Stored pinned messages:\n{}", lines.join("\n"))
                    }
                    Err(e) => {
                        error!(chat_id, "Failed to read pin records: {}", e);
                        "❌ Could not read stored messages".to_string()
                    }
                };
                self.reply(chat_id, &text).await;
            }
            BotCommand::Unpin(None) => {
                self.reply(chat_id, "❌ Usage: /unpin MESSAGE_ID").await;
            }
            BotCommand::Unpin(Some(message_id)) => {
                let text = match self.pins.unpin(chat_id, *message_id).await {
                    Ok(()) => format!("✅ Message {} unpinned", message_id),
                    Err(e) => {
                        warn!(chat_id, message_id, "Manual unpin failed: {}", e);
                        format!("❌ Failed to unpin message {}", message_id)
                    }
                };
                self.reply(chat_id, &text).await;
            }
            BotCommand::ClearStored => {
                let text = match self.pins.clear(chat_id).await {
                    Ok(removed) => {
                        info!(chat_id, removed, "Cleared stored pin records");
                        "🗑️ All stored pinned messages cleared".to_string()
                    }
                    Err(e) => {
                        error!(chat_id, "Failed to clear pin records: {}", e);
                        "❌ Could not clear stored messages".to_string()
                    }
                };
                self.reply(chat_id, &text).await;
            }
            BotCommand::ClearCommands => {
                let text = match self.chat.clear_commands().await {
                    Ok(()) => "🗑️ All bot commands cleared",
                    Err(e) => {
                        error!(chat_id, "Failed to clear bot commands: {}", e);
                        "❌ Failed to clear bot commands"
                    }
                };
                self.reply(chat_id, text).await;
            }
            BotCommand::Resume => {
                if self.halted.take().is_some() {
                    info!("Board polling resumed by operator");
                    self.reply(chat_id, "▶️ Board polling resumed").await;
                    self.poll_cycle().await;
                } else {
                    self.reply(chat_id, "Board polling is already running").await;
                }
            }
        }
    }

    async fn my_tasks(&self, from_username: Option<&str>) -> String {
        let Some(username) = from_username.filter(|u| !u.is_empty()) else {
            return "❌ Could not determine your username".to_string();
        };
        let Some(trello_username) = self.settings.users.trello_username_for(username) else {
            return format!("❌ User @{} not found in settings", html_escape(username));
        };

        let boards: Vec<BoardSection<BoardSnapshot>> = self
            .fetch_all(false)
            .await
            .into_iter()
            .map(|(board_id, result)| match result {
                Ok(fetched) => BoardSection::Ready(fetched.snapshot),
                Err(e) => {
                    warn!(board_id = %board_id, error = %e, "Board skipped for /mt");
                    BoardSection::Failed {
                        board_id,
                        message: e.user_message(),
                    }
                }
            })
            .collect();

        let tasks = self.composer.user_tasks(&trello_username, &boards, Utc::now());
        render_user_tasks(&tasks)
    }
}
