//! Test infrastructure: card builders, MockBoardClient, RecordingChat.
//!
//! Lets the poll loop, digests and pin rotation run against scripted boards
//! and a chat that records every call, with a real SQLite store underneath.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::board::BoardApiError;
use crate::channels::formatting::message_link;
use crate::state::SqliteStateStore;
use crate::traits::{BoardClient, ChatDelivery};
use crate::types::{BoardInfo, BoardMember, BoardSnapshot, CardObservation, ListMeta};

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// A bare card on board "b1" with no dates and no members.
pub fn card(id: &str, list_id: &str) -> CardObservation {
    CardObservation {
        card_id: id.to_string(),
        board_id: "b1".to_string(),
        list_id: list_id.to_string(),
        name: format!("Card {}", id),
        url: format!("https://trello.com/c/{}", id),
        members: Vec::new(),
        due: None,
        start: None,
        last_activity: None,
    }
}

/// A card assigned to the given member ids. Usernames are `user_<id>`.
pub fn card_with_members(id: &str, list_id: &str, member_ids: &[&str]) -> CardObservation {
    let mut c = card(id, list_id);
    c.members = member_ids
        .iter()
        .map(|m| BoardMember {
            id: m.to_string(),
            username: format!("user_{}", m),
        })
        .collect();
    c
}

/// Build a snapshot; every card is moved onto `board_id`.
pub fn snapshot(
    board_id: &str,
    lists: &[(&str, &str)],
    cards: Vec<CardObservation>,
) -> BoardSnapshot {
    BoardSnapshot {
        info: BoardInfo {
            id: board_id.to_string(),
            name: format!("Board {}", board_id),
        },
        lists: lists
            .iter()
            .map(|(id, name)| ListMeta {
                id: id.to_string(),
                name: name.to_string(),
            })
            .collect(),
        cards: cards
            .into_iter()
            .map(|mut c| {
                c.board_id = board_id.to_string();
                c
            })
            .collect(),
    }
}

/// A SQLite store on a temp file. Keep the file handle alive for the test.
pub async fn setup_test_store() -> (Arc<SqliteStateStore>, tempfile::NamedTempFile) {
    let db_file = tempfile::NamedTempFile::new().unwrap();
    let store = SqliteStateStore::new(db_file.path().to_str().unwrap())
        .await
        .unwrap();
    (Arc::new(store), db_file)
}

// ---------------------------------------------------------------------------
// MockBoardClient
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct MockBoard {
    info: BoardInfo,
    lists: Vec<ListMeta>,
    cards: Vec<CardObservation>,
    archived: Vec<CardObservation>,
    failure: Option<BoardApiError>,
}

/// Board client serving scripted snapshots. Unknown boards are not-found.
pub struct MockBoardClient {
    boards: Mutex<HashMap<String, MockBoard>>,
    delays: Mutex<HashMap<String, Duration>>,
    card_fetches: AtomicUsize,
    credentials_valid: AtomicBool,
}

impl Default for MockBoardClient {
    fn default() -> Self {
        Self {
            boards: Mutex::new(HashMap::new()),
            delays: Mutex::new(HashMap::new()),
            card_fetches: AtomicUsize::new(0),
            credentials_valid: AtomicBool::new(true),
        }
    }
}

impl MockBoardClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// When false, `authenticated_username()` is rejected with a 401.
    pub fn set_credentials_valid(&self, valid: bool) {
        self.credentials_valid.store(valid, Ordering::SeqCst);
    }

    /// Every call for the board sleeps this long before answering.
    pub async fn set_delay(&self, board_id: &str, delay: Duration) {
        self.delays
            .lock()
            .await
            .insert(board_id.to_string(), delay);
    }

    /// Install or replace a board's live state. Archived cards are kept.
    pub async fn set_board(&self, snapshot: BoardSnapshot) {
        let mut boards = self.boards.lock().await;
        let archived = boards
            .get(&snapshot.info.id)
            .map(|b| b.archived.clone())
            .unwrap_or_default();
        let failure = boards
            .get(&snapshot.info.id)
            .and_then(|b| b.failure.clone());
        boards.insert(
            snapshot.info.id.clone(),
            MockBoard {
                info: snapshot.info,
                lists: snapshot.lists,
                cards: snapshot.cards,
                archived,
                failure,
            },
        );
    }

    /// Closed cards returned only when archived cards are requested.
    pub async fn set_archived(&self, board_id: &str, cards: Vec<CardObservation>) {
        if let Some(board) = self.boards.lock().await.get_mut(board_id) {
            board.archived = cards;
        }
    }

    /// Make every call for the board fail with `err` until cleared.
    pub async fn fail_with(&self, board_id: &str, err: BoardApiError) {
        if let Some(board) = self.boards.lock().await.get_mut(board_id) {
            board.failure = Some(err);
        }
    }

    pub async fn clear_failure(&self, board_id: &str) {
        if let Some(board) = self.boards.lock().await.get_mut(board_id) {
            board.failure = None;
        }
    }

    /// How many times `cards()` was called across all boards.
    pub fn card_fetches(&self) -> usize {
        self.card_fetches.load(Ordering::SeqCst)
    }

    async fn board(&self, board_id: &str) -> Result<MockBoard, BoardApiError> {
        let delay = self.delays.lock().await.get(board_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let boards = self.boards.lock().await;
        let board = boards
            .get(board_id)
            .ok_or_else(|| BoardApiError::from_status(404, "board not found"))?;
        match &board.failure {
            Some(err) => Err(err.clone()),
            None => Ok(board.clone()),
        }
    }
}

#[async_trait]
impl BoardClient for MockBoardClient {
    async fn authenticated_username(&self) -> Result<String, BoardApiError> {
        if self.credentials_valid.load(Ordering::SeqCst) {
            Ok("boardpulse-bot".to_string())
        } else {
            Err(BoardApiError::from_status(401, "invalid token"))
        }
    }

    async fn board_info(&self, board_id: &str) -> Result<BoardInfo, BoardApiError> {
        Ok(self.board(board_id).await?.info)
    }

    async fn lists(&self, board_id: &str) -> Result<Vec<ListMeta>, BoardApiError> {
        Ok(self.board(board_id).await?.lists)
    }

    async fn cards(
        &self,
        board_id: &str,
        include_archived: bool,
    ) -> Result<Vec<CardObservation>, BoardApiError> {
        self.card_fetches.fetch_add(1, Ordering::SeqCst);
        let board = self.board(board_id).await?;
        let mut cards = board.cards;
        if include_archived {
            cards.extend(board.archived);
        }
        Ok(cards)
    }
}

// ---------------------------------------------------------------------------
// RecordingChat
// ---------------------------------------------------------------------------

/// Captured message sent via the chat.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub chat_id: String,
    pub message_id: i32,
    pub text: String,
}

/// A chat that records sends, pins and unpins. Failures can be switched on
/// per operation.
pub struct RecordingChat {
    pub sent: Mutex<Vec<SentMessage>>,
    pub pinned: Mutex<Vec<(String, i32)>>,
    pub unpinned: Mutex<Vec<(String, i32)>>,
    pub commands_cleared: AtomicUsize,
    next_id: AtomicI32,
    pub fail_sends: AtomicBool,
    pub fail_pins: AtomicBool,
    pub fail_unpins: AtomicBool,
    pub fail_clear_commands: AtomicBool,
}

impl RecordingChat {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            pinned: Mutex::new(Vec::new()),
            unpinned: Mutex::new(Vec::new()),
            commands_cleared: AtomicUsize::new(0),
            next_id: AtomicI32::new(100),
            fail_sends: AtomicBool::new(false),
            fail_pins: AtomicBool::new(false),
            fail_unpins: AtomicBool::new(false),
            fail_clear_commands: AtomicBool::new(false),
        }
    }

    pub async fn texts_for(&self, chat_id: &str) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .map(|m| m.text.clone())
            .collect()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    pub async fn last_text(&self) -> Option<String> {
        self.sent.lock().await.last().map(|m| m.text.clone())
    }
}

impl Default for RecordingChat {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatDelivery for RecordingChat {
    async fn send(&self, chat_id: &str, text: &str) -> anyhow::Result<i32> {
        if self.fail_sends.load(Ordering::SeqCst) {
            anyhow::bail!("send failed");
        }
        let message_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().await.push(SentMessage {
            chat_id: chat_id.to_string(),
            message_id,
            text: text.to_string(),
        });
        Ok(message_id)
    }

    async fn pin(&self, chat_id: &str, message_id: i32) -> anyhow::Result<()> {
        if self.fail_pins.load(Ordering::SeqCst) {
            anyhow::bail!("not enough rights to pin");
        }
        self.pinned
            .lock()
            .await
            .push((chat_id.to_string(), message_id));
        Ok(())
    }

    async fn unpin(&self, chat_id: &str, message_id: i32) -> anyhow::Result<()> {
        if self.fail_unpins.load(Ordering::SeqCst) {
            anyhow::bail!("message to unpin not found");
        }
        self.unpinned
            .lock()
            .await
            .push((chat_id.to_string(), message_id));
        Ok(())
    }

    async fn clear_commands(&self) -> anyhow::Result<()> {
        if self.fail_clear_commands.load(Ordering::SeqCst) {
            anyhow::bail!("bot is not authorized");
        }
        self.commands_cleared.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn message_url(&self, chat_id: &str, message_id: i32) -> String {
        message_link(chat_id, message_id)
    }
}
