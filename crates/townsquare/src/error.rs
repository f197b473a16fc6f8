//! Error types for the request boundary and the server as a whole.

use townsquare_protocol::ProtocolError;
use townsquare_provider::ProviderError;
use townsquare_session::SessionError;
use townsquare_town::TownError;
use townsquare_transport::TransportError;

/// Why a client request was refused.
///
/// The `Display` text is exactly what the client sees in
/// `ResponseEnvelope::message`.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// Join targeted a town that doesn't exist.
    #[error("no such room")]
    NoSuchTown,

    #[error("friendlyName must be specified")]
    MissingFriendlyName,

    /// Delete with a wrong password or an unknown town id.
    #[error("invalid password")]
    InvalidPassword,

    /// Update with a wrong password, unknown town id, or empty new name.
    #[error("invalid password or values")]
    InvalidUpdate,

    #[error("usernames cannot be empty")]
    EmptyPlayerIds,

    #[error("both players are not in the room")]
    PlayersNotInTown,

    /// A chat request targeted a town that doesn't exist.
    #[error("room does not exist")]
    TownDoesNotExist,

    #[error("username cannot be empty")]
    EmptyPlayerId,

    #[error("player is not in the room")]
    PlayerNotInTown,

    /// The channel provider failed while serving the request.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Town(#[from] TownError),
}

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum TownsquareError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    /// A town-level error (unavailable, bad password, not in town).
    #[error(transparent)]
    Town(#[from] TownError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Request(#[from] RequestError),
}
