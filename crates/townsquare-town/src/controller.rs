//! Town actor: an isolated Tokio task that owns one town's live state.
//!
//! Each town runs in its own task and is driven through an mpsc channel.
//! Every mutation is applied by that task alone, so mutations of one
//! town are linearized without locks, and towns never block each other.
//! Calls into the channel provider happen on the caller's task, never on
//! the actor, so a slow provider can't stall a town.

use std::sync::{Arc, Weak};

use tokio::sync::{Mutex, OwnedMutexGuard, mpsc, oneshot};
use townsquare_protocol::{
    ChannelKey, Player, PlayerId, SessionToken, TownId, UserLocation,
};
use townsquare_provider::{ChannelProvider, Credentials, Participant};
use townsquare_session::{PlayerSession, SessionRegistry, generate_player_id};

use crate::channels::ChannelRegistry;
use crate::{AuxChannel, AuxChannelKind, ListenerId, TownError, TownListener};

/// The mutable, user-facing settings of a town.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TownSettings {
    pub friendly_name: String,
    pub is_public: bool,
}

/// A snapshot of town metadata (not the player roster).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TownInfo {
    pub town_id: TownId,
    pub friendly_name: String,
    pub is_public: bool,
    /// Number of players with a live session.
    pub occupancy: usize,
    /// The town's own chat channel, once provisioned.
    pub channel_key: Option<ChannelKey>,
}

/// What a destroyed town leaves behind on the provider side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TownTeardown {
    pub channel_key: Option<ChannelKey>,
    pub aux_channels: Vec<AuxChannel>,
}

/// Exclusive right to create auxiliary channels in one town.
///
/// Hold it across lookup → provision → insert so that two concurrent
/// requests for the same conversation can't both see "not found".
/// Released on drop.
pub struct ChannelGuard {
    _guard: OwnedMutexGuard<()>,
}

/// Commands sent to a town actor through its channel.
///
/// Every variant carries a `oneshot` reply channel; callers await the
/// answer, which is how they learn the command has been applied.
enum TownCommand {
    AddPlayer {
        player: Player,
        credentials: Credentials,
        reply: oneshot::Sender<PlayerSession>,
    },
    SessionByToken {
        token: SessionToken,
        reply: oneshot::Sender<Option<PlayerSession>>,
    },
    GetPlayer {
        player_id: PlayerId,
        reply: oneshot::Sender<Option<Player>>,
    },
    Players {
        reply: oneshot::Sender<Vec<Player>>,
    },
    UpdateLocation {
        player_id: PlayerId,
        location: UserLocation,
        reply: oneshot::Sender<Result<(), TownError>>,
    },
    DestroySession {
        token: SessionToken,
        reply: oneshot::Sender<Option<Player>>,
    },
    AnnouncePlayer {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<(), TownError>>,
    },
    AddListener {
        listener: Weak<dyn TownListener>,
        reply: oneshot::Sender<ListenerId>,
    },
    RemoveListener {
        id: ListenerId,
        reply: oneshot::Sender<bool>,
    },
    AuxChannels {
        kind: AuxChannelKind,
        reply: oneshot::Sender<Vec<AuxChannel>>,
    },
    AddAuxChannel {
        channel: AuxChannel,
        reply: oneshot::Sender<()>,
    },
    GetInfo {
        reply: oneshot::Sender<TownInfo>,
    },
    UpdateSettings {
        friendly_name: Option<String>,
        is_public: Option<bool>,
        reply: oneshot::Sender<TownInfo>,
    },
    AttachChannel {
        key: ChannelKey,
        reply: oneshot::Sender<Result<(), TownError>>,
    },
    Destroy {
        reply: oneshot::Sender<TownTeardown>,
    },
}

/// Handle to a running town actor.
///
/// Cheap to clone. A handle stays safe to use after the town is deleted:
/// every call then fails with [`TownError::Unavailable`].
#[derive(Debug, Clone)]
pub struct TownController {
    town_id: TownId,
    sender: mpsc::Sender<TownCommand>,
    provisioning: Arc<Mutex<()>>,
}

impl std::fmt::Debug for TownCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TownCommand")
    }
}

impl TownController {
    /// Spawns a new town actor and returns a handle to it.
    ///
    /// `channel_size` bounds the command queue; senders wait when it's
    /// full.
    pub fn spawn(
        town_id: TownId,
        settings: TownSettings,
        channel_size: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(channel_size);

        let actor = TownActor {
            town_id: town_id.clone(),
            settings,
            channel_key: None,
            sessions: SessionRegistry::new(),
            listeners: Vec::new(),
            next_listener_id: 1,
            channels: ChannelRegistry::default(),
            receiver: rx,
        };

        tokio::spawn(actor.run());

        Self {
            town_id,
            sender: tx,
            provisioning: Arc::new(Mutex::new(())),
        }
    }

    /// Returns the town's id.
    pub fn town_id(&self) -> &TownId {
        &self.town_id
    }

    /// Returns `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Returns `true` if both handles drive the same actor.
    pub fn same_town(&self, other: &TownController) -> bool {
        self.sender.same_channel(&other.sender)
    }

    /// Sends a command and waits for the actor's reply.
    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> TownCommand,
    ) -> Result<T, TownError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| TownError::Unavailable(self.town_id.clone()))?;
        reply_rx
            .await
            .map_err(|_| TownError::Unavailable(self.town_id.clone()))
    }

    /// Joins a new player: mints their id, asks the provider for
    /// credentials, and registers the session.
    ///
    /// Listeners are NOT told about the new player here. That happens in
    /// [`announce_player`](Self::announce_player), once the player's live
    /// connection has actually attached.
    pub async fn add_player<P: ChannelProvider>(
        &self,
        user_name: &str,
        provider: &P,
    ) -> Result<PlayerSession, TownError> {
        if self.is_closed() {
            return Err(TownError::Unavailable(self.town_id.clone()));
        }

        let player = Player::new(generate_player_id(), user_name);
        let credentials = provider
            .issue_credentials(&player.id, &player.user_name)
            .await?;

        self.request(|reply| TownCommand::AddPlayer {
            player,
            credentials,
            reply,
        })
        .await
    }

    /// Finds the live session holding `token`.
    pub async fn session_by_token(
        &self,
        token: &SessionToken,
    ) -> Result<Option<PlayerSession>, TownError> {
        let token = token.clone();
        self.request(|reply| TownCommand::SessionByToken { token, reply })
            .await
    }

    /// Looks up one player of this town.
    pub async fn player(
        &self,
        player_id: &PlayerId,
    ) -> Result<Option<Player>, TownError> {
        let player_id = player_id.clone();
        self.request(|reply| TownCommand::GetPlayer { player_id, reply })
            .await
    }

    /// Every player with a live session.
    pub async fn players(&self) -> Result<Vec<Player>, TownError> {
        self.request(|reply| TownCommand::Players { reply }).await
    }

    /// Moves a player and tells every listener.
    pub async fn update_player_location(
        &self,
        player_id: &PlayerId,
        location: UserLocation,
    ) -> Result<(), TownError> {
        let player_id = player_id.clone();
        self.request(|reply| TownCommand::UpdateLocation {
            player_id,
            location,
            reply,
        })
        .await?
    }

    /// Ends a session and tells the remaining listeners.
    ///
    /// Idempotent: returns `Ok(None)` if the session was already gone.
    pub async fn destroy_session(
        &self,
        token: &SessionToken,
    ) -> Result<Option<Player>, TownError> {
        let token = token.clone();
        self.request(|reply| TownCommand::DestroySession { token, reply })
            .await
    }

    /// Tells every listener that `player_id` has attached.
    pub async fn announce_player(
        &self,
        player_id: &PlayerId,
    ) -> Result<(), TownError> {
        let player_id = player_id.clone();
        self.request(|reply| TownCommand::AnnouncePlayer { player_id, reply })
            .await?
    }

    /// Registers a listener. The town keeps only a weak reference.
    pub async fn add_town_listener<L: TownListener>(
        &self,
        listener: &Arc<L>,
    ) -> Result<ListenerId, TownError> {
        let listener = Arc::downgrade(listener);
        let listener: Weak<dyn TownListener> = listener;
        self.request(|reply| TownCommand::AddListener { listener, reply })
            .await
    }

    /// Unregisters a listener. Unknown ids are ignored.
    pub async fn remove_town_listener(
        &self,
        id: ListenerId,
    ) -> Result<(), TownError> {
        self.request(|reply| TownCommand::RemoveListener { id, reply })
            .await
            .map(|_| ())
    }

    /// Read-only view of the town's private channels.
    pub async fn private_channels(&self) -> Result<Vec<AuxChannel>, TownError> {
        let kind = AuxChannelKind::Private;
        self.request(|reply| TownCommand::AuxChannels { kind, reply })
            .await
    }

    /// Read-only view of the town's help channels.
    pub async fn help_channels(&self) -> Result<Vec<AuxChannel>, TownError> {
        let kind = AuxChannelKind::Help;
        self.request(|reply| TownCommand::AuxChannels { kind, reply })
            .await
    }

    /// Records a newly provisioned private channel.
    ///
    /// Does not dedup; see [`lock_channels`](Self::lock_channels).
    pub async fn add_private_channel(
        &self,
        key: ChannelKey,
        first: Participant,
        second: Participant,
    ) -> Result<(), TownError> {
        let channel = AuxChannel::private(key, first, second);
        self.request(|reply| TownCommand::AddAuxChannel { channel, reply })
            .await
    }

    /// Records a newly provisioned help channel.
    pub async fn add_help_channel(
        &self,
        key: ChannelKey,
        player: Participant,
    ) -> Result<(), TownError> {
        let channel = AuxChannel::help(key, player);
        self.request(|reply| TownCommand::AddAuxChannel { channel, reply })
            .await
    }

    /// Takes the town's auxiliary-channel creation lock.
    pub async fn lock_channels(&self) -> ChannelGuard {
        ChannelGuard {
            _guard: Arc::clone(&self.provisioning).lock_owned().await,
        }
    }

    /// Current settings and occupancy.
    pub async fn info(&self) -> Result<TownInfo, TownError> {
        self.request(|reply| TownCommand::GetInfo { reply }).await
    }

    /// Applies whichever settings are `Some`; `None` leaves a setting as
    /// it was.
    pub async fn update_settings(
        &self,
        friendly_name: Option<String>,
        is_public: Option<bool>,
    ) -> Result<TownInfo, TownError> {
        self.request(|reply| TownCommand::UpdateSettings {
            friendly_name,
            is_public,
            reply,
        })
        .await
    }

    /// Records the town's own provider channel. Can only be done once.
    pub async fn attach_channel(&self, key: ChannelKey) -> Result<(), TownError> {
        self.request(|reply| TownCommand::AttachChannel { key, reply })
            .await?
    }

    /// Shuts the town down.
    ///
    /// Listeners get `on_town_destroyed`, all sessions end, and the actor
    /// stops. Returns the provider channels the town was using so the
    /// caller can retire them.
    pub async fn destroy(&self) -> Result<TownTeardown, TownError> {
        self.request(|reply| TownCommand::Destroy { reply }).await
    }
}

/// The internal town state. Runs inside a Tokio task.
struct TownActor {
    town_id: TownId,
    settings: TownSettings,
    channel_key: Option<ChannelKey>,
    sessions: SessionRegistry,
    /// Registration order is delivery order.
    listeners: Vec<(ListenerId, Weak<dyn TownListener>)>,
    next_listener_id: u64,
    channels: ChannelRegistry,
    receiver: mpsc::Receiver<TownCommand>,
}

impl TownActor {
    /// Processes commands until the town is destroyed or every handle is
    /// dropped.
    async fn run(mut self) {
        tracing::info!(town_id = %self.town_id, "town actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                TownCommand::AddPlayer {
                    player,
                    credentials,
                    reply,
                } => {
                    let session = self.sessions.create(player, credentials).clone();
                    tracing::info!(
                        town_id = %self.town_id,
                        player_id = %session.player.id,
                        players = self.sessions.len(),
                        "player joined"
                    );
                    let _ = reply.send(session);
                }
                TownCommand::SessionByToken { token, reply } => {
                    let _ = reply.send(self.sessions.get_by_token(&token).cloned());
                }
                TownCommand::GetPlayer { player_id, reply } => {
                    let player = self
                        .sessions
                        .get_by_player(&player_id)
                        .map(|s| s.player.clone());
                    let _ = reply.send(player);
                }
                TownCommand::Players { reply } => {
                    let _ = reply.send(self.sessions.players());
                }
                TownCommand::UpdateLocation {
                    player_id,
                    location,
                    reply,
                } => {
                    let _ = reply.send(self.handle_move(player_id, location));
                }
                TownCommand::DestroySession { token, reply } => {
                    let _ = reply.send(self.handle_destroy_session(&token));
                }
                TownCommand::AnnouncePlayer { player_id, reply } => {
                    let _ = reply.send(self.handle_announce(player_id));
                }
                TownCommand::AddListener { listener, reply } => {
                    let id = ListenerId(self.next_listener_id);
                    self.next_listener_id += 1;
                    self.listeners.push((id, listener));
                    tracing::debug!(town_id = %self.town_id, listener = %id, "listener added");
                    let _ = reply.send(id);
                }
                TownCommand::RemoveListener { id, reply } => {
                    let before = self.listeners.len();
                    self.listeners.retain(|(lid, _)| *lid != id);
                    let removed = self.listeners.len() != before;
                    if removed {
                        tracing::debug!(town_id = %self.town_id, listener = %id, "listener removed");
                    }
                    let _ = reply.send(removed);
                }
                TownCommand::AuxChannels { kind, reply } => {
                    let _ = reply.send(self.channels.of_kind(kind));
                }
                TownCommand::AddAuxChannel { channel, reply } => {
                    tracing::info!(
                        town_id = %self.town_id,
                        channel_key = %channel.key,
                        kind = ?channel.kind,
                        "aux channel recorded"
                    );
                    self.channels.insert(channel);
                    let _ = reply.send(());
                }
                TownCommand::GetInfo { reply } => {
                    let _ = reply.send(self.info());
                }
                TownCommand::UpdateSettings {
                    friendly_name,
                    is_public,
                    reply,
                } => {
                    if let Some(name) = friendly_name {
                        self.settings.friendly_name = name;
                    }
                    if let Some(is_public) = is_public {
                        self.settings.is_public = is_public;
                    }
                    tracing::info!(
                        town_id = %self.town_id,
                        friendly_name = %self.settings.friendly_name,
                        is_public = self.settings.is_public,
                        "town settings updated"
                    );
                    let _ = reply.send(self.info());
                }
                TownCommand::AttachChannel { key, reply } => {
                    let result = match &self.channel_key {
                        Some(existing) => Err(TownError::InvalidState(format!(
                            "town already has channel {existing}"
                        ))),
                        None => {
                            self.channel_key = Some(key);
                            Ok(())
                        }
                    };
                    let _ = reply.send(result);
                }
                TownCommand::Destroy { reply } => {
                    // Closed before replying so handles see it at once.
                    self.receiver.close();
                    let teardown = self.handle_destroy();
                    let _ = reply.send(teardown);
                    break;
                }
            }
        }

        tracing::info!(town_id = %self.town_id, "town actor stopped");
    }

    fn handle_move(
        &mut self,
        player_id: PlayerId,
        location: UserLocation,
    ) -> Result<(), TownError> {
        let player = match self.sessions.update_location(&player_id, location) {
            Ok(player) => player.clone(),
            Err(_) => {
                return Err(TownError::NotInTown(player_id, self.town_id.clone()));
            }
        };
        self.broadcast(|l| l.on_player_moved(&player));
        Ok(())
    }

    fn handle_destroy_session(&mut self, token: &SessionToken) -> Option<Player> {
        let session = self.sessions.remove(token)?;
        tracing::info!(
            town_id = %self.town_id,
            player_id = %session.player.id,
            players = self.sessions.len(),
            "player left"
        );
        self.broadcast(|l| l.on_player_disconnected(&session.player));
        Some(session.player)
    }

    fn handle_announce(&mut self, player_id: PlayerId) -> Result<(), TownError> {
        let player = self
            .sessions
            .get_by_player(&player_id)
            .map(|s| s.player.clone())
            .ok_or_else(|| TownError::NotInTown(player_id, self.town_id.clone()))?;
        self.broadcast(|l| l.on_player_joined(&player));
        Ok(())
    }

    fn handle_destroy(&mut self) -> TownTeardown {
        tracing::info!(
            town_id = %self.town_id,
            listeners = self.listeners.len(),
            "town shutting down"
        );
        self.broadcast(|l| l.on_town_destroyed());
        self.listeners.clear();
        self.sessions.clear();

        TownTeardown {
            channel_key: self.channel_key.take(),
            aux_channels: self.channels.drain(),
        }
    }

    /// Delivers an event to every live listener and forgets the ones
    /// whose owners have gone away.
    fn broadcast(&mut self, deliver: impl Fn(&dyn TownListener)) {
        self.listeners.retain(|(_, weak)| weak.strong_count() > 0);
        for (_, weak) in &self.listeners {
            if let Some(listener) = weak.upgrade() {
                deliver(listener.as_ref());
            }
        }
    }

    fn info(&self) -> TownInfo {
        TownInfo {
            town_id: self.town_id.clone(),
            friendly_name: self.settings.friendly_name.clone(),
            is_public: self.settings.is_public,
            occupancy: self.sessions.len(),
            channel_key: self.channel_key.clone(),
        }
    }
}
