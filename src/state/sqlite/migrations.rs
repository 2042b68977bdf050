use sqlx::SqlitePool;

pub(crate) async fn migrate_state(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS card_progress (
            board_id TEXT NOT NULL,
            card_id TEXT NOT NULL,
            card_name TEXT NOT NULL DEFAULT '',
            started_at TEXT NOT NULL,
            PRIMARY KEY (board_id, card_id)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS pinned_messages (
            chat_id TEXT NOT NULL,
            message_id INTEGER NOT NULL,
            message_url TEXT NOT NULL DEFAULT '',
            pinned_at TEXT NOT NULL,
            PRIMARY KEY (chat_id, message_id)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_pinned_messages_chat ON pinned_messages(chat_id, pinned_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
