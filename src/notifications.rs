//! Human-facing text for live notification events.

use crate::channels::formatting::{html_escape, html_link};
use crate::config::UsersConfig;
use crate::detector::NotificationEvent;

/// Render an event as Telegram HTML. `board_name` comes from the snapshot
/// the event was detected in.
pub fn render_event(event: &NotificationEvent, board_name: &str, users: &UsersConfig) -> String {
    match event {
        NotificationEvent::CardCompleted { card, .. } => format!(
            "✅ <b>Card completed!</b>\n\n🗂️ Board: {}\n📋 Card: {}",
            html_escape(board_name),
            html_link(&card.url, &card.name),
        ),
        NotificationEvent::MembersAssigned {
            card,
            new_member_ids,
            ..
        } => {
            let tags: Vec<String> = card
                .members
                .iter()
                .filter(|m| new_member_ids.contains(&m.id))
                .map(|m| html_escape(&users.telegram_tag(&m.username)))
                .collect();
            format!(
                "👥 <b>New assignments!</b>\n\n🗂️ Board: {}\n📋 Card: {}\n\n{}",
                html_escape(board_name),
                html_link(&card.url, &card.name),
                tags.join(" "),
            )
        }
    }
}
