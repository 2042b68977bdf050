/// Bot commands understood in the peer chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Help,
    CurrentReport,
    WeeklyReport,
    MyTasks,
    Stored,
    /// `None` when the argument is missing or not a message id.
    Unpin(Option<i32>),
    ClearStored,
    /// Drop the bot's command menu registration.
    ClearCommands,
    Resume,
}

impl BotCommand {
    /// Parse `/name[@bot] [args]`. Anything else is `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if !text.starts_with('/') {
            return None;
        }
        let mut parts = text.splitn(2, char::is_whitespace);
        let head = parts.next().unwrap_or("");
        let arg = parts.next().unwrap_or("").trim();
        // Group chats append the bot name: /ct@board_bot
        let name = head[1..].split('@').next().unwrap_or("").to_lowercase();

        let command = match name.as_str() {
            "start" | "help" => BotCommand::Help,
            "ct" => BotCommand::CurrentReport,
            "wr" => BotCommand::WeeklyReport,
            "mt" => BotCommand::MyTasks,
            "stored" => BotCommand::Stored,
            "unpin" => BotCommand::Unpin(arg.parse().ok()),
            "clear_stored" => BotCommand::ClearStored,
            "clear_commands" => BotCommand::ClearCommands,
            "resume" => BotCommand::Resume,
            _ => return None,
        };
        Some(command)
    }

    pub fn name(&self) -> &'static str {
        match self {
            BotCommand::Help => "help",
            BotCommand::CurrentReport => "ct",
            BotCommand::WeeklyReport => "wr",
            BotCommand::MyTasks => "mt",
            BotCommand::Stored => "stored",
            BotCommand::Unpin(_) => "unpin",
            BotCommand::ClearStored => "clear_stored",
            BotCommand::ClearCommands => "clear_commands",
            BotCommand::Resume => "resume",
        }
    }
}

/// Entries for the Telegram command menu.
pub const MENU: &[(&str, &str)] = &[
    ("start", "Show help and command list"),
    ("ct", "Current report for all boards"),
    ("wr", "Weekly statistics"),
    ("mt", "My tasks (personal)"),
    ("stored", "Show pinned messages"),
    ("unpin", "Unpin message"),
    ("clear_stored", "Clear stored messages"),
    ("clear_commands", "Remove the bot command menu"),
    ("resume", "Resume polling after a credentials error"),
];
