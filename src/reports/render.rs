use crate::channels::formatting::{html_escape, html_link};
use crate::config::UsersConfig;

use super::{BoardSection, DailyDigest, ReportCard, UserTask, UserTasks, WeeklyDigest};

const LONG_RUNNING_MARK: &str = "🐌 ";

fn card_line(item: &ReportCard, users: &UsersConfig) -> String {
    let tags: Vec<String> = item
        .card
        .members
        .iter()
        .map(|m| html_escape(&users.telegram_tag(&m.username)))
        .collect();
    let assignees = if tags.is_empty() {
        String::new()
    } else {
        format!(" - {}", tags.join(" "))
    };
    let marker = if item.long_running { LONG_RUNNING_MARK } else { "" };
    format!(
        "• {}{}{}",
        marker,
        html_link(&item.card.url, &item.card.name),
        assignees
    )
}

fn failed_line(board_id: &str, message: &str) -> String {
    format!(
        "\n❌ Error getting data for board {}: {}",
        html_escape(board_id),
        html_escape(message)
    )
}

pub fn render_daily(digest: &DailyDigest, users: &UsersConfig) -> String {
    let mut parts = vec!["📊 <b>Daily Board Report</b>\n".to_string()];

    for section in &digest.boards {
        let board = match section {
            BoardSection::Ready(board) => board,
            BoardSection::Failed { board_id, message } => {
                parts.push(failed_line(board_id, message));
                continue;
            }
        };
        if !board.has_content() {
            continue;
        }
        parts.push(format!("\n🗂️ <b>{}</b>", html_escape(&board.board_name)));
        if !board.overdue.is_empty() {
            parts.push(format!("⏰ <b>Overdue cards ({}):</b>", board.overdue.len()));
            parts.extend(board.overdue.iter().map(|c| card_line(c, users)));
        }
        if !board.current.is_empty() {
            parts.push(format!("\n🔄 <b>Current ({}):</b>", board.current.len()));
            parts.extend(board.current.iter().map(|c| card_line(c, users)));
        }
    }

    if digest.total_overdue == 0 && digest.total_current == 0 {
        parts.push("\n✅ All tasks completed on time!".to_string());
    } else {
        let mut summary = "\n📈 <b>Summary:</b>".to_string();
        if digest.total_overdue > 0 {
            summary.push_str(&format!("\n• Overdue: {}", digest.total_overdue));
        }
        if digest.total_current > 0 {
            summary.push_str(&format!("\n• Current: {}", digest.total_current));
        }
        parts.push(summary);
    }

    parts.join("\n")
}

pub fn render_weekly(digest: &WeeklyDigest) -> String {
    let mut parts = vec!["📈 <b>Weekly Board Statistics</b>\n".to_string()];

    for section in &digest.boards {
        match section {
            BoardSection::Ready(board) => {
                if board.completed.is_empty() && board.overdue_count == 0 {
                    continue;
                }
                parts.push(format!("🗂️ <b>{}</b>", html_escape(&board.board_name)));
                parts.push(format!("✅ Completed this week: {}", board.completed.len()));
                parts.push(format!("⏰ Currently overdue: {}", board.overdue_count));
            }
            BoardSection::Failed { board_id, message } => {
                parts.push(failed_line(board_id, message));
            }
        }
    }

    parts.push("\n📊 <b>Overall Statistics:</b>".to_string());
    parts.push(format!("✅ Total completed this week: {}", digest.total_completed));
    parts.push(format!("⏰ Total overdue: {}", digest.total_overdue));

    if !digest.completed.is_empty() {
        parts.push("\n📋 <b>Completed tasks this week:</b>".to_string());
        for task in &digest.completed {
            parts.push(format!("• {}", html_link(&task.url, &task.name)));
            parts.push(format!(
                "  📅 {} | 📋 {}",
                task.completed_at.format("%d.%m"),
                html_escape(&task.board_name)
            ));
        }
    }

    parts.join("\n")
}

fn task_lines(task: &UserTask) -> [String; 2] {
    [
        format!("• {}", html_link(&task.url, &task.name)),
        format!(
            "  📋 {} → {}",
            html_escape(&task.board_name),
            html_escape(&task.list_name)
        ),
    ]
}

/// Personal task list. No assignee tags; it is the caller's own list.
pub fn render_user_tasks(tasks: &UserTasks) -> String {
    let mut parts = vec![format!(
        "👤 <b>My tasks ({})</b>\n",
        html_escape(&tasks.trello_username)
    )];

    if !tasks.overdue.is_empty() {
        parts.push(format!("⏰ <b>Overdue ({}):</b>", tasks.overdue.len()));
        parts.extend(tasks.overdue.iter().flat_map(task_lines));
    }
    if !tasks.current.is_empty() {
        parts.push(format!("\n🔄 <b>Current ({}):</b>", tasks.current.len()));
        parts.extend(tasks.current.iter().flat_map(task_lines));
    }
    if tasks.overdue.is_empty() && tasks.current.is_empty() {
        parts.push("✅ You have no active tasks!".to_string());
    }
    if !tasks.failed_boards.is_empty() {
        parts.push(format!(
            "\n⚠️ Could not read boards: {}",
            html_escape(&tasks.failed_boards.join(", "))
        ));
    }

    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::{CompletedTask, DailyBoard, WeeklyBoard};
    use crate::testing::{card, card_with_members};
    use chrono::{TimeZone, Utc};

    fn report_card(id: &str, members: &[&str], long_running: bool) -> ReportCard {
        ReportCard {
            card: card_with_members(id, "l-doing", members),
            list_name: "Doing".into(),
            long_running,
        }
    }

    fn users() -> UsersConfig {
        let mut users = UsersConfig::default();
        users
            .trello_to_telegram
            .insert("user_m1".into(), "@alice".into());
        users
    }

    #[test]
    fn daily_renders_sections_markers_and_summary() {
        let board = DailyBoard {
            board_id: "b1".into(),
            board_name: "Ops".into(),
            overdue: vec![report_card("a", &["m1"], true)],
            current: vec![report_card("b", &[], false), report_card("c", &["m2"], false)],
        };
        let empty = DailyBoard {
            board_id: "b2".into(),
            board_name: "Quiet".into(),
            overdue: vec![],
            current: vec![],
        };
        let digest = DailyDigest::new(vec![
            BoardSection::Ready(board),
            BoardSection::Ready(empty),
            BoardSection::Failed {
                board_id: "b3".into(),
                message: "board not found".into(),
            },
        ]);
        let text = render_daily(&digest, &users());

        assert!(text.starts_with("📊 <b>Daily Board Report</b>"));
        assert!(text.contains("🗂️ <b>Ops</b>"));
        assert!(!text.contains("Quiet"));
        assert!(text.contains("⏰ <b>Overdue cards (1):</b>"));
        assert!(text.contains("• 🐌 <a href=\"https://trello.com/c/a\">Card a</a> - @alice"));
        assert!(text.contains("🔄 <b>Current (2):</b>"));
        assert!(text.contains("• <a href=\"https://trello.com/c/b\">Card b</a>\n"));
        assert!(text.contains("Card c</a> - @user_m2"));
        assert!(text.contains("❌ Error getting data for board b3: board not found"));
        assert!(text.ends_with("📈 <b>Summary:</b>\n• Overdue: 1\n• Current: 2"));
    }

    #[test]
    fn daily_with_nothing_open_says_so() {
        let digest = DailyDigest::new(vec![]);
        assert!(render_daily(&digest, &users()).ends_with("✅ All tasks completed on time!"));
    }

    #[test]
    fn weekly_renders_counts_and_dates() {
        let at = Utc.with_ymd_and_hms(2026, 6, 3, 15, 0, 0).unwrap();
        let task = CompletedTask {
            name: "Deploy".into(),
            url: "https://trello.com/c/d".into(),
            board_name: "Ops".into(),
            completed_at: at,
        };
        let digest = WeeklyDigest::new(vec![
            BoardSection::Ready(WeeklyBoard {
                board_id: "b1".into(),
                board_name: "Ops".into(),
                completed: vec![task],
                overdue_count: 2,
            }),
            BoardSection::Ready(WeeklyBoard {
                board_id: "b2".into(),
                board_name: "Idle".into(),
                completed: vec![],
                overdue_count: 0,
            }),
        ]);
        let text = render_weekly(&digest);
        assert!(text.contains("🗂️ <b>Ops</b>\n✅ Completed this week: 1\n⏰ Currently overdue: 2"));
        assert!(!text.contains("Idle"));
        assert!(text.contains("✅ Total completed this week: 1"));
        assert!(text.contains("⏰ Total overdue: 2"));
        assert!(text.ends_with("  📅 03.06 | 📋 Ops"));
    }

    #[test]
    fn user_tasks_empty_message() {
        let tasks = UserTasks {
            trello_username: "alice".into(),
            overdue: vec![],
            current: vec![],
            failed_boards: vec![],
        };
        let text = render_user_tasks(&tasks);
        assert!(text.starts_with("👤 <b>My tasks (alice)</b>"));
        assert!(text.ends_with("✅ You have no active tasks!"));
    }

    #[test]
    fn user_tasks_show_breadcrumb() {
        let c = card("x", "l1");
        let tasks = UserTasks {
            trello_username: "alice".into(),
            overdue: vec![],
            current: vec![UserTask {
                name: c.name,
                url: c.url,
                board_name: "Ops".into(),
                list_name: "Doing".into(),
            }],
            failed_boards: vec!["b9".into()],
        };
        let text = render_user_tasks(&tasks);
        assert!(text.contains("🔄 <b>Current (1):</b>\n• <a href=\"https://trello.com/c/x\">Card x</a>\n  📋 Ops → Doing"));
        assert!(text.contains("Could not read boards: b9"));
    }
}
