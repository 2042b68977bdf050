use std::fmt;

/// Classified board API error. Tells the caller *why* a board call failed
/// so it can decide between retrying, skipping the board or halting.
#[derive(Debug, Clone)]
pub struct BoardApiError {
    pub kind: BoardApiErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardApiErrorKind {
    /// Network failure, timeout, rate limit or server-side outage. Retryable.
    Transport,
    /// 404: the board or card no longer exists.
    NotFound,
    /// 401/403: key or token rejected.
    Auth,
    /// The response did not have the expected shape.
    Data,
}

impl BoardApiError {
    pub fn from_status(status: u16, body: &str) -> Self {
        let kind = match status {
            401 | 403 => BoardApiErrorKind::Auth,
            404 => BoardApiErrorKind::NotFound,
            // Trello answers 400 "invalid id" for malformed board ids.
            400 => BoardApiErrorKind::NotFound,
            _ => BoardApiErrorKind::Transport,
        };
        Self {
            kind,
            status: Some(status),
            message: truncate_body(body),
        }
    }

    pub fn network(err: &reqwest::Error) -> Self {
        Self {
            kind: BoardApiErrorKind::Transport,
            status: None,
            message: err.to_string(),
        }
    }

    pub fn timeout(what: &str, secs: u64) -> Self {
        Self {
            kind: BoardApiErrorKind::Transport,
            status: None,
            message: format!("{} timed out after {}s", what, secs),
        }
    }

    pub fn data(message: impl Into<String>) -> Self {
        Self {
            kind: BoardApiErrorKind::Data,
            status: None,
            message: message.into(),
        }
    }

    /// Short summary safe to show in a chat report.
    pub fn user_message(&self) -> String {
        match self.kind {
            BoardApiErrorKind::Transport => "board service unreachable, will retry".to_string(),
            BoardApiErrorKind::NotFound => "board not found".to_string(),
            BoardApiErrorKind::Auth => "access denied by board service".to_string(),
            BoardApiErrorKind::Data => "unexpected response from board service".to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind == BoardApiErrorKind::Transport
    }

    pub fn is_auth(&self) -> bool {
        self.kind == BoardApiErrorKind::Auth
    }
}

impl fmt::Display for BoardApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(status) = self.status {
            write!(f, "Board API error ({}, {:?}): {}", status, self.kind, self.message)
        } else {
            write!(f, "Board API error ({:?}): {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for BoardApiError {}

fn truncate_body(body: &str) -> String {
    crate::utils::truncate_str(body, 300)
}
