//! Chat history collaborator — an append-only log keyed by session.

use async_trait::async_trait;

use crate::error::HistoryError;
use crate::message::ChatTurn;

/// Session history storage.
///
/// The pipeline appends exactly once per request, after the reply is
/// formatted. Stored turns are never edited.
#[async_trait]
pub trait ChatHistoryStore: Send + Sync {
    /// Backend name (e.g. "in_memory", "sqlite").
    fn name(&self) -> &str;

    /// Append turns to the end of a session's log.
    async fn append(&self, session_id: &str, turns: &[ChatTurn]) -> Result<(), HistoryError>;

    /// The last `limit` turns of a session, oldest first.
    async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<ChatTurn>, HistoryError>;
}
