use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::board::TrelloClient;
use crate::channels::{spawn_telegram_channel, TelegramChannel};
use crate::classify::Classifier;
use crate::config::AppConfig;
use crate::monitor::{BoardMonitor, MonitorSettings};
use crate::scheduler::ReportScheduler;
use crate::state::SqliteStateStore;
use crate::traits::BoardClient;

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    // 1. State store
    let state = Arc::new(SqliteStateStore::new(&config.state.db_path).await?);
    info!("State store initialized ({})", config.state.db_path);

    // 2. Board API client, with a credentials check before anything runs
    let trello = Arc::new(TrelloClient::new(&config.trello)?);
    match trello.authenticated_username().await {
        Ok(username) => info!(username = %username, "Board API credentials accepted"),
        Err(e) if e.is_auth() => {
            anyhow::bail!("Board API rejected the configured key/token: {}", e.user_message())
        }
        Err(e) => warn!(error = %e, "Could not verify board API credentials; continuing"),
    }
    for board_id in &config.trello.board_ids {
        match trello.board_info(board_id).await {
            Ok(info) => info!(board_id = %board_id, name = %info.name, "Watching board"),
            Err(e) => warn!(board_id = %board_id, error = %e, "Board not accessible at startup"),
        }
    }

    // 3. Telegram channel
    let telegram = Arc::new(TelegramChannel::new(&config));

    // 4. Monitor: the single owner of card state
    let shutdown = CancellationToken::new();
    let monitor = BoardMonitor::new(
        trello,
        telegram.clone(),
        state.clone(),
        state,
        Classifier::from_config(&config.lists),
        MonitorSettings::from_config(&config),
    );
    let (handle, monitor_task) = monitor.spawn(shutdown.clone());

    // 5. Digest schedule
    if config.schedule.enabled {
        ReportScheduler::new(&config.schedule)?.spawn(handle.clone(), shutdown.clone());
    } else {
        info!("Scheduled reports disabled");
    }

    // 6. Telegram dispatcher
    let dispatcher_task = spawn_telegram_channel(telegram, handle, shutdown.clone());

    info!(
        boards = config.trello.board_ids.len(),
        report_chat = %config.report_chat_id(),
        "Starting boardpulse v{}",
        env!("CARGO_PKG_VERSION")
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown requested");
    shutdown.cancel();

    // The monitor finishes the message in hand before it exits.
    if let Err(e) = monitor_task.await {
        error!("Monitor task ended abnormally: {}", e);
    }
    if let Err(e) = dispatcher_task.await {
        error!("Telegram task ended abnormally: {}", e);
    }
    Ok(())
}
