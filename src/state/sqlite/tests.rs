use super::*;
use crate::traits::{PinStore, ProgressStore};
use chrono::{Duration, TimeZone};

async fn setup_test_store() -> (SqliteStateStore, tempfile::NamedTempFile) {
    let db_file = tempfile::NamedTempFile::new().unwrap();
    let store = SqliteStateStore::new(db_file.path().to_str().unwrap())
        .await
        .unwrap();
    (store, db_file)
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap()
}

fn progress(board: &str, card: &str, started_at: DateTime<Utc>) -> ProgressEntry {
    ProgressEntry {
        board_id: board.to_string(),
        card_id: card.to_string(),
        card_name: format!("Card {}", card),
        started_at,
    }
}

fn pin(chat: &str, message_id: i32, pinned_at: DateTime<Utc>) -> PinRecord {
    PinRecord {
        chat_id: chat.to_string(),
        message_id,
        message_url: format!("https://t.me/c/1/{}", message_id),
        pinned_at,
    }
}

#[tokio::test]
async fn test_progress_insert_and_remove() {
    let (store, _db) = setup_test_store().await;
    store
        .apply_progress("b1", &[progress("b1", "c1", t0()), progress("b1", "c2", t0())], &[])
        .await
        .unwrap();

    let entries = store.progress_for_board("b1").await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries["c1"].started_at, t0());
    assert_eq!(entries["c1"].card_name, "Card c1");

    store
        .apply_progress("b1", &[], &["c1".to_string()])
        .await
        .unwrap();
    let entries = store.progress_for_board("b1").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries.contains_key("c2"));
}

#[tokio::test]
async fn test_progress_never_overwrites_start() {
    let (store, _db) = setup_test_store().await;
    store
        .apply_progress("b1", &[progress("b1", "c1", t0())], &[])
        .await
        .unwrap();
    store
        .apply_progress("b1", &[progress("b1", "c1", t0() + Duration::days(2))], &[])
        .await
        .unwrap();
    let entries = store.progress_for_board("b1").await.unwrap();
    assert_eq!(entries["c1"].started_at, t0());
}

#[tokio::test]
async fn test_progress_is_scoped_by_board() {
    let (store, _db) = setup_test_store().await;
    store
        .apply_progress("b1", &[progress("b1", "c1", t0())], &[])
        .await
        .unwrap();
    store
        .apply_progress("b2", &[progress("b2", "c1", t0())], &[])
        .await
        .unwrap();
    store
        .apply_progress("b2", &[], &["c1".to_string()])
        .await
        .unwrap();
    assert_eq!(store.progress_for_board("b1").await.unwrap().len(), 1);
    assert!(store.progress_for_board("b2").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_replace_pins_leaves_single_record() {
    let (store, _db) = setup_test_store().await;
    store.replace_pins("chat", &pin("chat", 10, t0())).await.unwrap();
    store
        .replace_pins("chat", &pin("chat", 11, t0() + Duration::hours(24)))
        .await
        .unwrap();

    let pins = store.pins_for_chat("chat").await.unwrap();
    assert_eq!(pins.len(), 1);
    assert_eq!(pins[0].message_id, 11);
    assert_eq!(pins[0].message_url, "https://t.me/c/1/11");
}

#[tokio::test]
async fn test_pins_are_per_chat() {
    let (store, _db) = setup_test_store().await;
    store.replace_pins("a", &pin("a", 1, t0())).await.unwrap();
    store.replace_pins("b", &pin("b", 2, t0())).await.unwrap();
    store.remove_pin("a", 1).await.unwrap();
    assert!(store.pins_for_chat("a").await.unwrap().is_empty());
    assert_eq!(store.pins_for_chat("b").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_clear_pins_counts_removed() {
    let (store, _db) = setup_test_store().await;
    store.replace_pins("a", &pin("a", 1, t0())).await.unwrap();
    assert_eq!(store.clear_pins("a").await.unwrap(), 1);
    assert_eq!(store.clear_pins("a").await.unwrap(), 0);
}

#[tokio::test]
async fn test_state_survives_reopen() {
    let db_file = tempfile::NamedTempFile::new().unwrap();
    let path = db_file.path().to_str().unwrap().to_string();
    {
        let store = SqliteStateStore::new(&path).await.unwrap();
        store.replace_pins("chat", &pin("chat", 7, t0())).await.unwrap();
        store
            .apply_progress("b1", &[progress("b1", "c1", t0())], &[])
            .await
            .unwrap();
    }
    let store = SqliteStateStore::new(&path).await.unwrap();
    assert_eq!(store.pins_for_chat("chat").await.unwrap()[0].message_id, 7);
    assert_eq!(store.progress_for_board("b1").await.unwrap().len(), 1);
}
