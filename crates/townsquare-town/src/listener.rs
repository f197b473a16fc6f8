//! The observer interface between a town and whatever delivers its
//! events (normally one live network connection).

use std::fmt;

use townsquare_protocol::Player;

/// Receives a town's lifecycle events.
///
/// Calls happen on the town's actor task, in the order the town applied
/// its mutations. Implementations must not block: hand the event to a
/// channel or another task and return.
///
/// The town holds listeners weakly. A listener stays registered only
/// while its owner keeps an `Arc` to it alive.
pub trait TownListener: Send + Sync + 'static {
    /// A player attached a live connection to the town.
    fn on_player_joined(&self, player: &Player);

    /// A player's location changed. Sent to every listener, including
    /// the mover's own.
    fn on_player_moved(&self, player: &Player);

    /// A player's session ended.
    fn on_player_disconnected(&self, player: &Player);

    /// The town was deleted. No further events follow.
    fn on_town_destroyed(&self);
}

/// Identifies one listener registration.
///
/// Registering the same listener twice yields two independent ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L-{}", self.0)
    }
}
