use super::*;

#[async_trait]
impl crate::traits::ProgressStore for SqliteStateStore {
    async fn progress_for_board(
        &self,
        board_id: &str,
    ) -> anyhow::Result<HashMap<String, ProgressEntry>> {
        let rows = sqlx::query(
            "SELECT board_id, card_id, card_name, started_at
             FROM card_progress
             WHERE board_id = ?",
        )
        .bind(board_id)
        .fetch_all(&self.pool)
        .await?;

        let mut entries = HashMap::with_capacity(rows.len());
        for row in &rows {
            let started_at: String = row.get("started_at");
            let entry = ProgressEntry {
                board_id: row.get("board_id"),
                card_id: row.get("card_id"),
                card_name: row.get("card_name"),
                started_at: parse_timestamp(&started_at)?,
            };
            entries.insert(entry.card_id.clone(), entry);
        }
        Ok(entries)
    }

    async fn apply_progress(
        &self,
        board_id: &str,
        inserts: &[ProgressEntry],
        removals: &[String],
    ) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        for card_id in removals {
            sqlx::query("DELETE FROM card_progress WHERE board_id = ? AND card_id = ?")
                .bind(board_id)
                .bind(card_id)
                .execute(&mut *tx)
                .await?;
        }

        for entry in inserts {
            // An existing start time is never overwritten.
            sqlx::query(
                "INSERT INTO card_progress (board_id, card_id, card_name, started_at)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT(board_id, card_id) DO NOTHING",
            )
            .bind(board_id)
            .bind(&entry.card_id)
            .bind(&entry.card_name)
            .bind(format_timestamp(entry.started_at))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
