//! Card classification: pure functions of (card, list name, now).

use chrono::{DateTime, Utc};

use crate::config::ListsConfig;
use crate::types::CardObservation;
use crate::utils::contains_any_ci;

/// A card with no start date due more than this many whole days out is
/// treated as scheduled for later rather than being worked on.
pub const FUTURE_DUE_HORIZON_DAYS: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardStatus {
    Done,
    Overdue,
    Current,
    Future,
    Other,
}

/// List-name markers for "done" and "in progress".
#[derive(Debug, Clone)]
pub struct Classifier {
    done: Vec<String>,
    in_progress: Vec<String>,
}

impl Classifier {
    pub fn new(done: Vec<String>, in_progress: Vec<String>) -> Self {
        Self { done, in_progress }
    }

    pub fn from_config(lists: &ListsConfig) -> Self {
        Self::new(lists.done.clone(), lists.in_progress.clone())
    }

    pub fn is_done_list(&self, list_name: &str) -> bool {
        contains_any_ci(list_name, &self.done)
    }

    pub fn is_in_progress_list(&self, list_name: &str) -> bool {
        contains_any_ci(list_name, &self.in_progress)
    }

    pub fn classify(&self, card: &CardObservation, list_name: &str, now: DateTime<Utc>) -> CardStatus {
        if self.is_done_list(list_name) {
            return CardStatus::Done;
        }
        if card.due.is_some_and(|due| due < now) {
            return CardStatus::Overdue;
        }
        if !self.is_in_progress_list(list_name) {
            return CardStatus::Other;
        }

        match (card.start, card.due) {
            (Some(start), _) if start > now => CardStatus::Future,
            (Some(_), _) => CardStatus::Current,
            (None, Some(due)) if (due - now).num_days() > FUTURE_DUE_HORIZON_DAYS => {
                CardStatus::Future
            }
            (None, _) => CardStatus::Current,
        }
    }
}
