//! Digest composition. Builds structured summaries; `render` turns them
//! into chat text.

mod render;

use chrono::{DateTime, Duration, Utc};

use crate::classify::{CardStatus, Classifier};
use crate::tracker::BoardProgress;
use crate::types::{BoardSnapshot, CardObservation};

pub use render::{render_daily, render_user_tasks, render_weekly};

/// Completions older than this are left out of the weekly digest.
pub const WEEKLY_WINDOW_DAYS: i64 = 7;

/// One board's contribution, or the short reason it could not be read.
#[derive(Debug, Clone)]
pub enum BoardSection<T> {
    Ready(T),
    Failed { board_id: String, message: String },
}

#[derive(Debug, Clone)]
pub struct ReportCard {
    pub card: CardObservation,
    pub list_name: String,
    pub long_running: bool,
}

#[derive(Debug, Clone)]
pub struct DailyBoard {
    pub board_id: String,
    pub board_name: String,
    pub overdue: Vec<ReportCard>,
    pub current: Vec<ReportCard>,
}

impl DailyBoard {
    pub fn has_content(&self) -> bool {
        !self.overdue.is_empty() || !self.current.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct DailyDigest {
    pub boards: Vec<BoardSection<DailyBoard>>,
    pub total_overdue: usize,
    pub total_current: usize,
}

impl DailyDigest {
    pub fn new(boards: Vec<BoardSection<DailyBoard>>) -> Self {
        let mut total_overdue = 0;
        let mut total_current = 0;
        for section in &boards {
            if let BoardSection::Ready(board) = section {
                total_overdue += board.overdue.len();
                total_current += board.current.len();
            }
        }
        Self {
            boards,
            total_overdue,
            total_current,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletedTask {
    pub name: String,
    pub url: String,
    pub board_name: String,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct WeeklyBoard {
    pub board_id: String,
    pub board_name: String,
    pub completed: Vec<CompletedTask>,
    pub overdue_count: usize,
}

#[derive(Debug, Clone)]
pub struct WeeklyDigest {
    pub boards: Vec<BoardSection<WeeklyBoard>>,
    pub total_completed: usize,
    pub total_overdue: usize,
    /// Every completion across boards, newest first. Ties keep board order.
    pub completed: Vec<CompletedTask>,
}

impl WeeklyDigest {
    pub fn new(boards: Vec<BoardSection<WeeklyBoard>>) -> Self {
        let mut completed = Vec::new();
        let mut total_overdue = 0;
        for section in &boards {
            if let BoardSection::Ready(board) = section {
                completed.extend(board.completed.iter().cloned());
                total_overdue += board.overdue_count;
            }
        }
        // Stable, so equal timestamps stay in input order.
        completed.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Self {
            total_completed: completed.len(),
            total_overdue,
            completed,
            boards,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserTask {
    pub name: String,
    pub url: String,
    pub board_name: String,
    pub list_name: String,
}

/// Overdue and current cards for one person, for `/mt`.
#[derive(Debug, Clone)]
pub struct UserTasks {
    pub trello_username: String,
    pub overdue: Vec<UserTask>,
    pub current: Vec<UserTask>,
    pub failed_boards: Vec<String>,
}

pub struct ReportComposer {
    classifier: Classifier,
}

impl ReportComposer {
    pub fn new(classifier: Classifier) -> Self {
        Self { classifier }
    }

    /// Partition a board's live cards into Overdue and Current, marking the
    /// ones in progress for too long.
    pub fn daily_board(
        &self,
        snapshot: &BoardSnapshot,
        progress: &BoardProgress,
        now: DateTime<Utc>,
    ) -> DailyBoard {
        let mut overdue = Vec::new();
        let mut current = Vec::new();

        for card in &snapshot.cards {
            let list_name = snapshot.list_name(&card.list_id);
            let bucket = match self.classifier.classify(card, list_name, now) {
                CardStatus::Overdue => &mut overdue,
                CardStatus::Current => &mut current,
                _ => continue,
            };
            bucket.push(ReportCard {
                card: card.clone(),
                list_name: list_name.to_string(),
                long_running: progress.is_long_running(&card.card_id, now),
            });
        }

        DailyBoard {
            board_id: snapshot.info.id.clone(),
            board_name: snapshot.info.name.clone(),
            overdue,
            current,
        }
    }

    /// Completions come from `all_cards` (archived included) within
    /// `[now - 7 days, now]`; the overdue count comes from the live cards.
    pub fn weekly_board(
        &self,
        live: &BoardSnapshot,
        all_cards: &[CardObservation],
        now: DateTime<Utc>,
    ) -> WeeklyBoard {
        let week_start = now - Duration::days(WEEKLY_WINDOW_DAYS);

        let completed = all_cards
            .iter()
            .filter(|card| self.classifier.is_done_list(live.list_name(&card.list_id)))
            .filter_map(|card| {
                let at = card.last_activity?;
                (at >= week_start && at <= now).then(|| CompletedTask {
                    name: card.name.clone(),
                    url: card.url.clone(),
                    board_name: live.info.name.clone(),
                    completed_at: at,
                })
            })
            .collect();

        let overdue_count = live
            .cards
            .iter()
            .filter(|card| {
                self.classifier.classify(card, live.list_name(&card.list_id), now)
                    == CardStatus::Overdue
            })
            .count();

        WeeklyBoard {
            board_id: live.info.id.clone(),
            board_name: live.info.name.clone(),
            completed,
            overdue_count,
        }
    }

    /// Overdue and current cards assigned to `trello_username`.
    pub fn user_tasks(
        &self,
        trello_username: &str,
        boards: &[BoardSection<BoardSnapshot>],
        now: DateTime<Utc>,
    ) -> UserTasks {
        let mut tasks = UserTasks {
            trello_username: trello_username.to_string(),
            overdue: Vec::new(),
            current: Vec::new(),
            failed_boards: Vec::new(),
        };

        for section in boards {
            let snapshot = match section {
                BoardSection::Ready(snapshot) => snapshot,
                BoardSection::Failed { board_id, .. } => {
                    tasks.failed_boards.push(board_id.clone());
                    continue;
                }
            };
            for card in snapshot.cards.iter().filter(|c| c.is_assigned_to(trello_username)) {
                let list_name = snapshot.list_name(&card.list_id);
                let bucket = match self.classifier.classify(card, list_name, now) {
                    CardStatus::Overdue => &mut tasks.overdue,
                    CardStatus::Current => &mut tasks.current,
                    _ => continue,
                };
                bucket.push(UserTask {
                    name: card.name.clone(),
                    url: card.url.clone(),
                    board_name: snapshot.info.name.clone(),
                    list_name: list_name.to_string(),
                });
            }
        }
        tasks
    }
}
