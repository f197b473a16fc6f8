//! The session registry: one town's live sessions.
//!
//! # Concurrency note
//!
//! `SessionRegistry` is a plain data structure with no locking. Each town
//! actor owns exactly one and mutates it from its own task, so every
//! operation here is already serialized per town.

use std::collections::HashMap;

use townsquare_protocol::{Player, PlayerId, SessionToken, UserLocation};
use townsquare_provider::Credentials;

use crate::{PlayerSession, SessionError, generate_session_token};

/// Tracks every live session of a town.
///
/// ```text
/// create() ──→ [live] ──→ update_location() ... ──→ remove()
///                                                      │
///                                           (remove again: no-op)
/// ```
#[derive(Debug, Default)]
pub struct SessionRegistry {
    /// Live sessions, keyed by their secret token.
    sessions: HashMap<SessionToken, PlayerSession>,

    /// Index from player id to token, kept in sync with `sessions`.
    players: HashMap<PlayerId, SessionToken>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a session for `player` and mints its token.
    pub fn create(
        &mut self,
        player: Player,
        credentials: Credentials,
    ) -> &PlayerSession {
        let token = generate_session_token();
        let player_id = player.id.clone();

        tracing::debug!(%player_id, user_name = %player.user_name, "session created");

        self.players.insert(player_id, token.clone());
        self.sessions.entry(token.clone()).or_insert(PlayerSession {
            token,
            player,
            credentials,
        })
    }

    /// Looks up a session by its token.
    pub fn get_by_token(&self, token: &SessionToken) -> Option<&PlayerSession> {
        self.sessions.get(token)
    }

    /// Looks up a session by its player's id.
    pub fn get_by_player(&self, player_id: &PlayerId) -> Option<&PlayerSession> {
        self.players
            .get(player_id)
            .and_then(|token| self.sessions.get(token))
    }

    /// Overwrites a player's location and returns the updated player.
    ///
    /// # Errors
    /// [`SessionError::PlayerNotFound`] if the player has no live session.
    pub fn update_location(
        &mut self,
        player_id: &PlayerId,
        location: UserLocation,
    ) -> Result<&Player, SessionError> {
        let token = self
            .players
            .get(player_id)
            .ok_or_else(|| SessionError::PlayerNotFound(player_id.clone()))?;
        let session = self
            .sessions
            .get_mut(token)
            .ok_or_else(|| SessionError::PlayerNotFound(player_id.clone()))?;
        session.player.location = location;
        Ok(&session.player)
    }

    /// Ends a session. Returns the removed session, or `None` if it was
    /// already gone. Removing twice is harmless.
    pub fn remove(&mut self, token: &SessionToken) -> Option<PlayerSession> {
        let session = self.sessions.remove(token)?;
        self.players.remove(session.player_id());
        tracing::debug!(player_id = %session.player_id(), "session destroyed");
        Some(session)
    }

    /// Ends every session at once.
    pub fn clear(&mut self) -> Vec<PlayerSession> {
        self.players.clear();
        self.sessions.drain().map(|(_, session)| session).collect()
    }

    /// Snapshot of every player with a live session.
    pub fn players(&self) -> Vec<Player> {
        self.sessions.values().map(|s| s.player.clone()).collect()
    }

    /// Returns `true` if the player has a live session.
    pub fn contains_player(&self, player_id: &PlayerId) -> bool {
        self.players.contains_key(player_id)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if nobody is connected.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Naming convention: `test_{function}_{scenario}_{expected}`.

    use townsquare_protocol::Direction;

    use super::*;

    fn credentials() -> Credentials {
        Credentials {
            video_token: "video".into(),
            chat_token: "chat".into(),
        }
    }

    fn player(id: &str, name: &str) -> Player {
        Player::new(PlayerId::new(id), name)
    }

    fn moved(x: f64, y: f64) -> UserLocation {
        UserLocation {
            x,
            y,
            rotation: Direction::Right,
            moving: true,
        }
    }

    // =====================================================================
    // create()
    // =====================================================================

    #[test]
    fn test_create_new_player_is_findable_by_token_and_player() {
        let mut reg = SessionRegistry::new();
        let token = reg.create(player("p1", "Bob"), credentials()).token.clone();

        let by_token = reg.get_by_token(&token).expect("session by token");
        assert_eq!(by_token.player.user_name, "Bob");
        assert_eq!(by_token.credentials, credentials());

        let by_player = reg.get_by_player(&PlayerId::new("p1")).expect("by player");
        assert_eq!(by_player.token, token);
    }

    #[test]
    fn test_create_each_session_gets_unique_token() {
        let mut reg = SessionRegistry::new();
        let t1 = reg.create(player("p1", "Bob"), credentials()).token.clone();
        let t2 = reg.create(player("p2", "Carol"), credentials()).token.clone();

        assert_ne!(t1, t2);
        assert_eq!(reg.len(), 2);
    }

    // =====================================================================
    // get_by_token()
    // =====================================================================

    #[test]
    fn test_get_by_token_unknown_token_returns_none() {
        let mut reg = SessionRegistry::new();
        reg.create(player("p1", "Bob"), credentials());

        assert!(reg.get_by_token(&SessionToken::new("forged")).is_none());
    }

    // =====================================================================
    // update_location()
    // =====================================================================

    #[test]
    fn test_update_location_overwrites_position() {
        let mut reg = SessionRegistry::new();
        reg.create(player("p1", "Bob"), credentials());

        let updated = reg
            .update_location(&PlayerId::new("p1"), moved(4.0, 2.0))
            .expect("player exists");

        assert_eq!(updated.location, moved(4.0, 2.0));
        let stored = reg.get_by_player(&PlayerId::new("p1")).unwrap();
        assert_eq!(stored.player.location, moved(4.0, 2.0));
    }

    #[test]
    fn test_update_location_unknown_player_returns_not_found() {
        let mut reg = SessionRegistry::new();

        let result = reg.update_location(&PlayerId::new("ghost"), moved(1.0, 1.0));

        assert!(matches!(
            result,
            Err(SessionError::PlayerNotFound(p)) if p == PlayerId::new("ghost")
        ));
    }

    // =====================================================================
    // remove()
    // =====================================================================

    #[test]
    fn test_remove_live_session_returns_it_and_clears_indexes() {
        let mut reg = SessionRegistry::new();
        let token = reg.create(player("p1", "Bob"), credentials()).token.clone();

        let removed = reg.remove(&token).expect("was live");

        assert_eq!(removed.player.id, PlayerId::new("p1"));
        assert!(reg.get_by_token(&token).is_none());
        assert!(!reg.contains_player(&PlayerId::new("p1")));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_remove_twice_is_noop() {
        let mut reg = SessionRegistry::new();
        let token = reg.create(player("p1", "Bob"), credentials()).token.clone();
        reg.remove(&token);

        assert!(reg.remove(&token).is_none());
    }

    #[test]
    fn test_remove_leaves_other_sessions_alone() {
        let mut reg = SessionRegistry::new();
        let t1 = reg.create(player("p1", "Bob"), credentials()).token.clone();
        let t2 = reg.create(player("p2", "Carol"), credentials()).token.clone();

        reg.remove(&t1);

        assert!(reg.get_by_token(&t2).is_some());
        assert_eq!(reg.players().len(), 1);
    }

    // =====================================================================
    // clear()
    // =====================================================================

    #[test]
    fn test_clear_returns_every_session() {
        let mut reg = SessionRegistry::new();
        reg.create(player("p1", "Bob"), credentials());
        reg.create(player("p2", "Carol"), credentials());

        let cleared = reg.clear();

        assert_eq!(cleared.len(), 2);
        assert!(reg.is_empty());
        assert!(reg.get_by_player(&PlayerId::new("p1")).is_none());
    }

    // =====================================================================
    // logging
    // =====================================================================

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_create_and_remove_stay_quiet_at_info_level() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let mut reg = SessionRegistry::new();
            let token = reg.create(player("p1", "Bob"), credentials()).token.clone();
            reg.remove(&token);
        });

        let output = captured.0.lock().unwrap();
        assert!(output.is_empty(), "{}", String::from_utf8_lossy(&output));
    }
}
