use super::*;

#[async_trait]
impl crate::traits::PinStore for SqliteStateStore {
    async fn pins_for_chat(&self, chat_id: &str) -> anyhow::Result<Vec<PinRecord>> {
        let rows = sqlx::query(
            "SELECT chat_id, message_id, message_url, pinned_at
             FROM pinned_messages
             WHERE chat_id = ?
             ORDER BY pinned_at ASC, message_id ASC",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let pinned_at: String = row.get("pinned_at");
            records.push(PinRecord {
                chat_id: row.get("chat_id"),
                message_id: row.get("message_id"),
                message_url: row.get("message_url"),
                pinned_at: parse_timestamp(&pinned_at)?,
            });
        }
        Ok(records)
    }

    async fn remove_pin(&self, chat_id: &str, message_id: i32) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM pinned_messages WHERE chat_id = ? AND message_id = ?")
            .bind(chat_id)
            .bind(message_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn replace_pins(&self, chat_id: &str, record: &PinRecord) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM pinned_messages WHERE chat_id = ?")
            .bind(chat_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO pinned_messages (chat_id, message_id, message_url, pinned_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(chat_id)
        .bind(record.message_id)
        .bind(&record.message_url)
        .bind(format_timestamp(record.pinned_at))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn clear_pins(&self, chat_id: &str) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM pinned_messages WHERE chat_id = ?")
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
