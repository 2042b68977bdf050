use async_trait::async_trait;

use crate::board::BoardApiError;
use crate::types::{BoardInfo, CardObservation, ListMeta};

/// Read-only snapshot access to a task-board service.
///
/// Implementations validate raw payloads at the boundary: callers only ever
/// see typed observations. Transport, not-found and auth failures come back
/// as distinct [`BoardApiError`] kinds.
#[async_trait]
pub trait BoardClient: Send + Sync {
    /// Username behind the configured credentials. An auth error here means
    /// the credentials themselves are bad, not just one board's permissions.
    async fn authenticated_username(&self) -> Result<String, BoardApiError>;

    async fn board_info(&self, board_id: &str) -> Result<BoardInfo, BoardApiError>;

    async fn lists(&self, board_id: &str) -> Result<Vec<ListMeta>, BoardApiError>;

    /// Cards on the board. `include_archived` also returns closed cards.
    async fn cards(
        &self,
        board_id: &str,
        include_archived: bool,
    ) -> Result<Vec<CardObservation>, BoardApiError>;
}
