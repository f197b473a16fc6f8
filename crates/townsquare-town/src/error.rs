//! Error types for the town layer.

use townsquare_protocol::{PlayerId, TownId};
use townsquare_provider::ProviderError;
use townsquare_session::SessionError;

/// Errors that can occur during town operations.
#[derive(Debug, thiserror::Error)]
pub enum TownError {
    /// Wrong update password, or no such town. Deliberately one variant:
    /// callers must not learn which town ids exist.
    #[error("invalid password")]
    InvalidPassword,

    /// The password matched but the requested values are unacceptable
    /// (an empty new name).
    #[error("invalid update values")]
    InvalidValues,

    /// The player isn't in this town.
    #[error("player {0} not in town {1}")]
    NotInTown(PlayerId, TownId),

    /// The town's actor has shut down (the town was deleted).
    #[error("town {0} is unavailable")]
    Unavailable(TownId),

    /// The operation doesn't fit the town's current state.
    #[error("invalid town state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    /// A call to the channel provider failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}
