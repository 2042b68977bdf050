use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

/// Board metadata as returned by the board API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardInfo {
    pub id: String,
    pub name: String,
}

/// A list (column) on a board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListMeta {
    pub id: String,
    pub name: String,
}

/// A member assigned to a card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardMember {
    pub id: String,
    pub username: String,
}

/// Immutable per-poll view of one card. Built fresh on every fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct CardObservation {
    pub card_id: String,
    pub board_id: String,
    pub list_id: String,
    pub name: String,
    pub url: String,
    pub members: Vec<BoardMember>,
    pub due: Option<DateTime<Utc>>,
    pub start: Option<DateTime<Utc>>,
    pub last_activity: Option<DateTime<Utc>>,
}

impl CardObservation {
    pub fn member_ids(&self) -> BTreeSet<String> {
        self.members.iter().map(|m| m.id.clone()).collect()
    }

    pub fn is_assigned_to(&self, username: &str) -> bool {
        self.members.iter().any(|m| m.username == username)
    }
}

/// Everything fetched for one board in one go.
#[derive(Debug, Clone)]
pub struct BoardSnapshot {
    pub info: BoardInfo,
    pub lists: Vec<ListMeta>,
    pub cards: Vec<CardObservation>,
}

impl BoardSnapshot {
    /// Name of the list a card sits in; empty when the list is unknown.
    pub fn list_name(&self, list_id: &str) -> &str {
        self.lists
            .iter()
            .find(|l| l.id == list_id)
            .map(|l| l.name.as_str())
            .unwrap_or("")
    }
}

/// Key for per-card persisted state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CardKey {
    pub board_id: String,
    pub card_id: String,
}

impl CardKey {
    pub fn new(board_id: &str, card_id: &str) -> Self {
        Self {
            board_id: board_id.to_string(),
            card_id: card_id.to_string(),
        }
    }
}

impl std::fmt::Display for CardKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.board_id, self.card_id)
    }
}

/// Which digest a trigger asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Daily,
    Weekly,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Daily => "daily",
            ReportKind::Weekly => "weekly",
        }
    }
}
