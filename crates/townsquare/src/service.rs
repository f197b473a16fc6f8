//! Request handlers: town lifecycle, joining, and chat channel creation.
//!
//! `TownService` is what the connection layer calls for every client
//! request. It owns the town store and the channel provider, and is the
//! only place that talks to the provider on a client's behalf.
//!
//! Auxiliary channels are created with lookup-before-create under the
//! town's channel lock:
//!
//! ```text
//! lock_channels ─→ scan records ─┬─ found ──→ re-invite ──→ existing key
//!                                └─ absent ─→ provision ─→ record ─→ invite ─→ new key
//! ```
//!
//! The record is written before the invites go out. If an invite fails,
//! the request fails, but the next identical request finds the record and
//! re-invites instead of provisioning a second channel.

use townsquare_protocol::{
    ChannelKey, ChatCreateRequest, ChatCreateResponse, HelpChatCreateRequest,
    Player, PlayerId, Request, Response, ResponseEnvelope, TownCreateRequest,
    TownCreateResponse, TownDeleteRequest, TownId, TownJoinRequest,
    TownJoinResponse, TownListResponse, TownListing, TownUpdateRequest,
};
use townsquare_provider::{ChannelProvider, Participant, ProvisionOptions};
use townsquare_town::{
    DedupKey, PlayerPair, TownController, TownError, TownStore, TownTeardown,
};

use crate::RequestError;

/// Informational note on a private chat request that found its channel.
pub const PRIVATE_CHANNEL_EXISTS: &str = "private channel already exists";

/// Informational note on a help chat request that found its channel.
pub const HELP_CHANNEL_EXISTS: &str = "help channel already exists for the player";

/// Note on a help chat request whose re-invite the provider refused.
pub const HELP_ALREADY_INVITED: &str = "player has already been invited";

/// A successful chat request: the channel, and a note when it already
/// existed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatOutcome {
    pub channel_key: ChannelKey,
    pub message: Option<&'static str>,
}

/// The request-serving core of the server.
pub struct TownService<P: ChannelProvider> {
    towns: TownStore,
    provider: P,
}

impl<P: ChannelProvider> TownService<P> {
    /// Creates a service with an empty town store.
    pub fn new(provider: P) -> Self {
        Self::with_store(TownStore::new(), provider)
    }

    /// Creates a service around an existing store.
    pub fn with_store(store: TownStore, provider: P) -> Self {
        Self {
            towns: store,
            provider,
        }
    }

    /// The channel provider this service calls.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Returns a handle to a live town.
    pub async fn lookup(&self, town_id: &TownId) -> Option<TownController> {
        self.towns.lookup(town_id).await
    }

    /// Serves one request and wraps the outcome for the wire.
    pub async fn handle(&self, request: Request) -> ResponseEnvelope {
        let result = match request {
            Request::JoinTown(req) => self
                .join_town(req)
                .await
                .map(|r| ResponseEnvelope::ok(Response::Joined(r))),
            Request::ListTowns => Ok(ResponseEnvelope::ok(Response::TownList(
                self.list_towns().await,
            ))),
            Request::CreateTown(req) => self
                .create_town(req)
                .await
                .map(|r| ResponseEnvelope::ok(Response::Created(r))),
            Request::DeleteTown(req) => self
                .delete_town(req)
                .await
                .map(|()| ResponseEnvelope::ok(Response::Done)),
            Request::UpdateTown(req) => self
                .update_town(req)
                .await
                .map(|()| ResponseEnvelope::ok(Response::Done)),
            Request::CreatePrivateChat(req) => {
                self.create_private_chat(req).await.map(chat_envelope)
            }
            Request::CreateHelpChat(req) => {
                self.create_help_chat(req).await.map(chat_envelope)
            }
        };

        result.unwrap_or_else(|e| {
            tracing::debug!(error = %e, "request refused");
            ResponseEnvelope::error(e.to_string())
        })
    }

    /// Adds a player to a town and hands back everything the client needs
    /// to attach a live connection.
    ///
    /// Nobody is told about the new player yet; that happens when the
    /// player's live connection subscribes.
    pub async fn join_town(
        &self,
        req: TownJoinRequest,
    ) -> Result<TownJoinResponse, RequestError> {
        let town = self
            .lookup(&req.town_id)
            .await
            .ok_or(RequestError::NoSuchTown)?;

        let session = town
            .add_player(&req.user_name, &self.provider)
            .await
            .map_err(|e| town_gone_as(e, RequestError::NoSuchTown))?;
        let current_players = town
            .players()
            .await
            .map_err(|e| town_gone_as(e, RequestError::NoSuchTown))?;
        let info = town
            .info()
            .await
            .map_err(|e| town_gone_as(e, RequestError::NoSuchTown))?;

        tracing::debug!(
            town_id = %req.town_id,
            player_id = %session.player.id,
            "join accepted"
        );

        Ok(TownJoinResponse {
            player_id: session.player.id,
            session_token: session.token,
            provider_video_token: session.credentials.video_token,
            provider_chat_token: session.credentials.chat_token,
            current_players,
            friendly_name: info.friendly_name,
            is_publicly_listed: info.is_public,
        })
    }

    /// Every publicly listed town with its occupancy.
    pub async fn list_towns(&self) -> TownListResponse {
        let infos = self.towns.list_towns().await;
        TownListResponse {
            towns: infos
                .into_iter()
                .map(|info| TownListing {
                    town_id: info.town_id,
                    friendly_name: info.friendly_name,
                    current_occupancy: info.occupancy,
                })
                .collect(),
        }
    }

    /// Creates a town and provisions its chat channel.
    ///
    /// The town stays unlisted until the channel exists. If provisioning
    /// fails the town is dropped again and the provider error is returned.
    pub async fn create_town(
        &self,
        req: TownCreateRequest,
    ) -> Result<TownCreateResponse, RequestError> {
        if req.friendly_name.is_empty() {
            return Err(RequestError::MissingFriendlyName);
        }

        let (town, town_password) = self.towns.create_town(&req.friendly_name, false).await;
        let town_id = town.town_id().clone();

        let provisioned = self
            .provider
            .provision_channel(&req.friendly_name, town_id.as_str(), ProvisionOptions::PLAIN)
            .await;
        let channel_key = match provisioned {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!(%town_id, error = %e, "town channel provisioning failed");
                self.towns.unregister(&town_id).await;
                return Err(e.into());
            }
        };

        tracing::info!(%town_id, %channel_key, "town channel provisioned");
        town.attach_channel(channel_key).await?;
        town.update_settings(None, Some(req.is_publicly_listed)).await?;

        Ok(TownCreateResponse {
            town_id,
            town_password,
        })
    }

    /// Deletes a town after checking its password, then retires its
    /// provider channels.
    ///
    /// Retirement is best effort: the town is already gone, so a provider
    /// failure here is only logged.
    pub async fn delete_town(&self, req: TownDeleteRequest) -> Result<(), RequestError> {
        let teardown = self
            .towns
            .delete_town(&req.town_id, &req.town_password)
            .await
            .map_err(|e| match e {
                TownError::InvalidPassword => RequestError::InvalidPassword,
                other => other.into(),
            })?;

        self.retire(&req.town_id, teardown).await;
        Ok(())
    }

    /// Changes a town's name and/or visibility after checking its
    /// password. A new name is pushed to the town's chat channel.
    pub async fn update_town(&self, req: TownUpdateRequest) -> Result<(), RequestError> {
        let renamed = req.friendly_name.clone();
        let info = self
            .towns
            .update_town(
                &req.town_id,
                &req.town_password,
                req.friendly_name,
                req.is_publicly_listed,
            )
            .await
            .map_err(|e| match e {
                TownError::InvalidPassword | TownError::InvalidValues => {
                    RequestError::InvalidUpdate
                }
                other => other.into(),
            })?;

        if let (Some(name), Some(key)) = (renamed, info.channel_key) {
            if let Err(e) = self.provider.rename_channel(&key, &name).await {
                tracing::warn!(
                    town_id = %req.town_id,
                    channel_key = %key,
                    error = %e,
                    "town channel rename failed"
                );
            }
        }
        Ok(())
    }

    /// Returns the private channel for two players of a town, creating it
    /// on first request.
    pub async fn create_private_chat(
        &self,
        req: ChatCreateRequest,
    ) -> Result<ChatOutcome, RequestError> {
        if req.current_player_id.is_empty() || req.other_player_id.is_empty() {
            return Err(RequestError::EmptyPlayerIds);
        }

        let town = self
            .lookup(&req.town_id)
            .await
            .ok_or(RequestError::TownDoesNotExist)?;
        let first = member(&town, &req.current_player_id).await?;
        let second = member(&town, &req.other_player_id).await?;
        let (Some(first), Some(second)) = (first, second) else {
            return Err(RequestError::PlayersNotInTown);
        };

        let _guard = town.lock_channels().await;

        let wanted = DedupKey::Pair(PlayerPair::new(first.id.clone(), second.id.clone()));
        let existing = town
            .private_channels()
            .await
            .map_err(|e| town_gone_as(e, RequestError::TownDoesNotExist))?
            .into_iter()
            .find(|c| c.dedup_key == wanted);

        let first = participant(&first);
        let second = participant(&second);

        if let Some(channel) = existing {
            tracing::debug!(
                town_id = %req.town_id,
                channel_key = %channel.key,
                "private channel exists, re-inviting"
            );
            self.provider.invite(&channel.key, &first).await?;
            self.provider.invite(&channel.key, &second).await?;
            return Ok(ChatOutcome {
                channel_key: channel.key,
                message: Some(PRIVATE_CHANNEL_EXISTS),
            });
        }

        let label = format!("{} & {}", first.user_name, second.user_name);
        let stable_key = private_stable_key(&req.town_id, &first.player_id, &second.player_id);
        let key = self
            .provider
            .provision_channel(&label, &stable_key, ProvisionOptions::PLAIN)
            .await?;
        tracing::info!(town_id = %req.town_id, channel_key = %key, "private channel provisioned");

        town.add_private_channel(key.clone(), first.clone(), second.clone())
            .await
            .map_err(|e| town_gone_as(e, RequestError::TownDoesNotExist))?;
        self.provider.invite(&key, &first).await?;
        self.provider.invite(&key, &second).await?;

        Ok(ChatOutcome {
            channel_key: key,
            message: None,
        })
    }

    /// Returns the help channel for a player, creating it (with the help
    /// bot attached) on first request.
    pub async fn create_help_chat(
        &self,
        req: HelpChatCreateRequest,
    ) -> Result<ChatOutcome, RequestError> {
        if req.player_id.is_empty() {
            return Err(RequestError::EmptyPlayerId);
        }

        let town = self
            .lookup(&req.town_id)
            .await
            .ok_or(RequestError::TownDoesNotExist)?;
        let player = member(&town, &req.player_id)
            .await?
            .ok_or(RequestError::PlayerNotInTown)?;

        let _guard = town.lock_channels().await;

        let wanted = DedupKey::Player(player.id.clone());
        let existing = town
            .help_channels()
            .await
            .map_err(|e| town_gone_as(e, RequestError::TownDoesNotExist))?
            .into_iter()
            .find(|c| c.dedup_key == wanted);

        let player = participant(&player);

        if let Some(channel) = existing {
            let message = match self.provider.invite(&channel.key, &player).await {
                Ok(()) => HELP_CHANNEL_EXISTS,
                Err(e) => {
                    tracing::debug!(
                        town_id = %req.town_id,
                        channel_key = %channel.key,
                        error = %e,
                        "help channel re-invite refused"
                    );
                    HELP_ALREADY_INVITED
                }
            };
            return Ok(ChatOutcome {
                channel_key: channel.key,
                message: Some(message),
            });
        }

        let label = format!("Help: {}", player.user_name);
        let stable_key = format!("{}:help:{}", req.town_id, player.player_id);
        let key = self
            .provider
            .provision_channel(&label, &stable_key, ProvisionOptions::WITH_BOT)
            .await?;
        tracing::info!(town_id = %req.town_id, channel_key = %key, "help channel provisioned");

        town.add_help_channel(key.clone(), player.clone())
            .await
            .map_err(|e| town_gone_as(e, RequestError::TownDoesNotExist))?;
        self.provider.invite(&key, &player).await?;

        Ok(ChatOutcome {
            channel_key: key,
            message: None,
        })
    }

    async fn retire(&self, town_id: &TownId, teardown: TownTeardown) {
        let keys = teardown
            .channel_key
            .into_iter()
            .chain(teardown.aux_channels.into_iter().map(|c| c.key));
        for key in keys {
            if let Err(e) = self.provider.retire_channel(&key).await {
                tracing::warn!(%town_id, channel_key = %key, error = %e, "channel retirement failed");
            }
        }
    }
}

fn chat_envelope(outcome: ChatOutcome) -> ResponseEnvelope {
    let response = Response::ChatCreated(ChatCreateResponse {
        channel_key: outcome.channel_key,
    });
    match outcome.message {
        Some(message) => ResponseEnvelope::ok_with_message(response, message),
        None => ResponseEnvelope::ok(response),
    }
}

/// Looks a player up, reporting a vanished town as "room does not exist".
async fn member(
    town: &TownController,
    player_id: &PlayerId,
) -> Result<Option<Player>, RequestError> {
    town.player(player_id)
        .await
        .map_err(|e| town_gone_as(e, RequestError::TownDoesNotExist))
}

fn participant(player: &Player) -> Participant {
    Participant::new(player.id.clone(), player.user_name.clone())
}

/// Stable provider name for a pair's channel. Independent of argument
/// order.
fn private_stable_key(town_id: &TownId, a: &PlayerId, b: &PlayerId) -> String {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    format!("{town_id}:private:{low}:{high}")
}

/// A town deleted mid-request looks, to the client, like it never
/// existed.
fn town_gone_as(e: TownError, gone: RequestError) -> RequestError {
    match e {
        TownError::Unavailable(_) => gone,
        TownError::Provider(e) => RequestError::Provider(e),
        other => other.into(),
    }
}
