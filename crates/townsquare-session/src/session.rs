//! The `PlayerSession` record.

use townsquare_protocol::{Player, PlayerId, SessionToken};
use townsquare_provider::Credentials;

/// One joined player's session.
///
/// Created by a town's join operation and destroyed when the player's
/// live connection goes away. A session belongs to exactly one town for
/// its whole life and owns its [`Player`] exclusively.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSession {
    /// Secret bearer token. 128 bits of randomness, hex encoded.
    pub token: SessionToken,

    /// The player this session speaks for.
    pub player: Player,

    /// Provider credentials issued at join time. Relayed to the client,
    /// never re-validated here.
    pub credentials: Credentials,
}

impl PlayerSession {
    /// Shorthand for `self.player.id`.
    pub fn player_id(&self) -> &PlayerId {
        &self.player.id
    }
}
