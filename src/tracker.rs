//! Long-running card tracking.
//!
//! The clock starts when a card is first seen in an in-progress list and is
//! dropped the moment the card is seen anywhere else (or stops being
//! returned by the board). Only list membership matters here; the date
//! window used for the digest does not gate tracking.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::classify::Classifier;
use crate::traits::{ProgressEntry, ProgressStore};
use crate::types::BoardSnapshot;

pub const LONG_RUNNING_DAYS: i64 = 3;

/// Progress entries for one board after an update.
#[derive(Debug, Clone, Default)]
pub struct BoardProgress {
    entries: HashMap<String, ProgressEntry>,
}

impl BoardProgress {
    pub fn is_long_running(&self, card_id: &str, now: DateTime<Utc>) -> bool {
        self.entries
            .get(card_id)
            .is_some_and(|e| is_long_running(e, now))
    }

    pub fn get(&self, card_id: &str) -> Option<&ProgressEntry> {
        self.entries.get(card_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn is_long_running(entry: &ProgressEntry, now: DateTime<Utc>) -> bool {
    now - entry.started_at >= Duration::days(LONG_RUNNING_DAYS)
}

pub struct LongRunningTracker {
    store: Arc<dyn ProgressStore>,
}

impl LongRunningTracker {
    pub fn new(store: Arc<dyn ProgressStore>) -> Self {
        Self { store }
    }

    /// Start clocks for cards newly in progress and drop entries for cards
    /// that left. Returns the board's entries after the update.
    pub async fn update(
        &self,
        snapshot: &BoardSnapshot,
        classifier: &Classifier,
        now: DateTime<Utc>,
    ) -> anyhow::Result<BoardProgress> {
        let board_id = snapshot.info.id.as_str();
        let mut entries = self.store.progress_for_board(board_id).await?;

        let mut inserts = Vec::new();
        let mut in_progress_ids = Vec::new();
        for card in &snapshot.cards {
            if !classifier.is_in_progress_list(snapshot.list_name(&card.list_id)) {
                continue;
            }
            in_progress_ids.push(card.card_id.as_str());
            if !entries.contains_key(&card.card_id) {
                inserts.push(ProgressEntry {
                    board_id: board_id.to_string(),
                    card_id: card.card_id.clone(),
                    card_name: card.name.clone(),
                    started_at: now,
                });
            }
        }

        let removals: Vec<String> = entries
            .keys()
            .filter(|id| !in_progress_ids.contains(&id.as_str()))
            .cloned()
            .collect();

        if !inserts.is_empty() || !removals.is_empty() {
            self.store
                .apply_progress(board_id, &inserts, &removals)
                .await?;
            debug!(
                board_id,
                started = inserts.len(),
                stopped = removals.len(),
                "Progress tracking updated"
            );
        }

        for id in &removals {
            entries.remove(id);
        }
        for entry in inserts {
            entries.insert(entry.card_id.clone(), entry);
        }
        Ok(BoardProgress { entries })
    }

    pub async fn is_long_running(
        &self,
        board_id: &str,
        card_id: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let entries = self.store.progress_for_board(board_id).await?;
        Ok(entries.get(card_id).is_some_and(|e| is_long_running(e, now)))
    }
}
