//! Records of auxiliary channels provisioned for a town.
//!
//! A record is written once, after the provider has created the channel,
//! and is the source of truth for "does this conversation already exist".
//! The participants are stored structurally; nothing is ever recovered by
//! parsing a channel's display label.

use townsquare_protocol::{ChannelKey, PlayerId};
use townsquare_provider::Participant;

/// What an auxiliary channel is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuxChannelKind {
    /// A private conversation between two players.
    Private,
    /// A conversation between one player and the help bot.
    Help,
}

/// An unordered pair of player ids.
///
/// `PlayerPair::new(a, b) == PlayerPair::new(b, a)`: the ids are stored
/// sorted, so plain equality is the unordered match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlayerPair(PlayerId, PlayerId);

impl PlayerPair {
    pub fn new(a: PlayerId, b: PlayerId) -> Self {
        if a <= b { Self(a, b) } else { Self(b, a) }
    }

    /// Returns `true` if `player` is one of the two.
    pub fn contains(&self, player: &PlayerId) -> bool {
        &self.0 == player || &self.1 == player
    }
}

/// The identity used to detect an already-provisioned channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    Pair(PlayerPair),
    Player(PlayerId),
}

/// One provisioned auxiliary channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxChannel {
    /// The provider's key for the channel.
    pub key: ChannelKey,
    pub kind: AuxChannelKind,
    pub dedup_key: DedupKey,
    /// Who the channel was provisioned for, with display names as they
    /// were at creation time.
    pub participants: Vec<Participant>,
}

impl AuxChannel {
    /// A private channel between two players.
    pub fn private(key: ChannelKey, first: Participant, second: Participant) -> Self {
        Self {
            key,
            kind: AuxChannelKind::Private,
            dedup_key: DedupKey::Pair(PlayerPair::new(
                first.player_id.clone(),
                second.player_id.clone(),
            )),
            participants: vec![first, second],
        }
    }

    /// A help channel for one player.
    pub fn help(key: ChannelKey, player: Participant) -> Self {
        Self {
            key,
            kind: AuxChannelKind::Help,
            dedup_key: DedupKey::Player(player.player_id.clone()),
            participants: vec![player],
        }
    }
}

/// A town's auxiliary channels, in creation order.
///
/// Insertion does not dedup. The lookup-before-create check belongs to
/// the caller, which holds the town's [`ChannelGuard`](crate::ChannelGuard)
/// across lookup, provisioning, and insert.
#[derive(Debug, Default)]
pub(crate) struct ChannelRegistry {
    channels: Vec<AuxChannel>,
}

impl ChannelRegistry {
    pub(crate) fn insert(&mut self, channel: AuxChannel) {
        self.channels.push(channel);
    }

    pub(crate) fn of_kind(&self, kind: AuxChannelKind) -> Vec<AuxChannel> {
        self.channels
            .iter()
            .filter(|c| c.kind == kind)
            .cloned()
            .collect()
    }

    pub(crate) fn drain(&mut self) -> Vec<AuxChannel> {
        std::mem::take(&mut self.channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(id: &str, name: &str) -> Participant {
        Participant::new(PlayerId::new(id), name)
    }

    #[test]
    fn test_player_pair_is_unordered() {
        let ab = PlayerPair::new(PlayerId::new("a"), PlayerId::new("b"));
        let ba = PlayerPair::new(PlayerId::new("b"), PlayerId::new("a"));
        assert_eq!(ab, ba);
        assert!(ab.contains(&PlayerId::new("a")));
        assert!(!ab.contains(&PlayerId::new("c")));
    }

    #[test]
    fn test_private_channel_dedup_key_ignores_participant_order() {
        let one = AuxChannel::private(
            ChannelKey::new("k1"),
            participant("a", "Ann"),
            participant("b", "Ben"),
        );
        let two = AuxChannel::private(
            ChannelKey::new("k2"),
            participant("b", "Ben"),
            participant("a", "Ann"),
        );
        assert_eq!(one.dedup_key, two.dedup_key);
        assert_eq!(one.kind, AuxChannelKind::Private);
    }

    #[test]
    fn test_help_channel_keys_on_single_player() {
        let help = AuxChannel::help(ChannelKey::new("k"), participant("a", "Ann"));
        assert_eq!(help.dedup_key, DedupKey::Player(PlayerId::new("a")));
        assert_eq!(help.participants.len(), 1);
    }

    #[test]
    fn test_registry_of_kind_filters_and_keeps_order() {
        let mut reg = ChannelRegistry::default();
        reg.insert(AuxChannel::help(ChannelKey::new("h1"), participant("a", "Ann")));
        reg.insert(AuxChannel::private(
            ChannelKey::new("p1"),
            participant("a", "Ann"),
            participant("b", "Ben"),
        ));
        reg.insert(AuxChannel::help(ChannelKey::new("h2"), participant("b", "Ben")));

        let help: Vec<_> = reg
            .of_kind(AuxChannelKind::Help)
            .into_iter()
            .map(|c| c.key)
            .collect();
        assert_eq!(help, vec![ChannelKey::new("h1"), ChannelKey::new("h2")]);
        assert_eq!(reg.of_kind(AuxChannelKind::Private).len(), 1);
        assert_eq!(reg.drain().len(), 3);
        assert!(reg.of_kind(AuxChannelKind::Help).is_empty());
    }
}
