//! Error types for the session layer.

use townsquare_protocol::PlayerId;

/// Errors that can occur while looking up or mutating sessions.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No live session belongs to this player. Either they never joined
    /// this town or their session was already destroyed.
    #[error("no session for player {0}")]
    PlayerNotFound(PlayerId),

    /// The session token doesn't match any live session.
    #[error("invalid session token")]
    InvalidToken,
}
