/// Escape `<`, `>`, `&` for Telegram HTML.
pub(crate) fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Escape a value placed inside a quoted HTML attribute.
fn attr_escape(s: &str) -> String {
    html_escape(s).replace('"', "&quot;").replace('\'', "&#39;")
}

/// Clickable `<a>` for Telegram HTML. The label is escaped.
pub(crate) fn html_link(url: &str, label: &str) -> String {
    format!("<a href=\"{}\">{}</a>", attr_escape(url), html_escape(label))
}

/// Public link to a message in a supergroup or channel.
///
/// Telegram prefixes those chat ids with `-100`; the `t.me/c/` form wants
/// the bare id.
pub(crate) fn message_link(chat_id: &str, message_id: i32) -> String {
    let url_chat_id = chat_id.strip_prefix("-100").unwrap_or(chat_id);
    format!("https://t.me/c/{}/{}", url_chat_id, message_id)
}

/// Split a message into chunks respecting Telegram's max length.
/// Prefers splitting at paragraph boundaries, then line boundaries.
/// Never splits inside an HTML tag.
pub(crate) fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let mut boundary = max_len;
        while boundary > 0 && !remaining.is_char_boundary(boundary) {
            boundary -= 1;
        }

        let search_region = &remaining[..boundary];

        let split_at = search_region
            .rfind("\n\n")
            .map(|p| p + 1)
            .or_else(|| search_region.rfind('\n'))
            .unwrap_or(boundary);

        let split_at = adjust_for_html_tags(search_region, split_at);

        // Force progress when nothing fits.
        let split_at = if split_at == 0 {
            remaining
                .char_indices()
                .nth(1)
                .map_or(remaining.len(), |(i, _)| i)
        } else {
            split_at
        };

        let (chunk, rest) = remaining.split_at(split_at);
        let chunk = chunk.trim_end();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        remaining = rest.trim_start_matches('\n');
    }

    chunks
}

/// If the split point is inside an HTML tag, move it before the tag start.
fn adjust_for_html_tags(text: &str, split_at: usize) -> usize {
    let bytes = text.as_bytes();
    let mut j = split_at;
    while j > 0 {
        j -= 1;
        if bytes[j] == b'>' {
            return split_at;
        }
        if bytes[j] == b'<' {
            return j;
        }
    }
    split_at
}

/// Build the /start and /help response text.
pub(crate) fn build_help_text(daily_schedule: &str, weekly_schedule: &str) -> String {
    format!(
        "🤖 <b>Board bot activated!</b>\n\
         \n\
         Available commands:\n\
         • /ct - Current report for all boards (pinned)\n\
         • /wr - Weekly statistics\n\
         • /mt - My tasks (overdue and current)\n\
         • /stored - Show stored pinned messages\n\
         • /unpin MESSAGE_ID - Unpin a message\n\
         • /clear_stored - Clear stored pinned messages\n\
         • /clear_commands - Remove the bot command menu\n\
         • /resume - Resume polling after a credentials error\n\
         • /help - Show this message\n\
         \n\
         Bot automatically:\n\
         • Notifies about completed cards\n\
         • Notifies about member assignments\n\
         • Sends daily reports (<code>{}</code> UTC)\n\
         • Sends weekly statistics (<code>{}</code> UTC)\n\
         \n\
         🐌 - card in progress for more than 3 days",
        html_escape(daily_schedule),
        html_escape(weekly_schedule),
    )
}
