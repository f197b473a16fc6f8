//! The `ChannelProvider` trait and the values it exchanges.

use std::future::Future;

use townsquare_protocol::{ChannelKey, PlayerId};

use crate::ProviderError;

/// Credentials handed to a client at join time.
///
/// Both tokens are opaque. Their validity window is the provider's
/// business; the server relays them and never looks inside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub video_token: String,
    pub chat_token: String,
}

/// Who gets invited to a channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Participant {
    pub player_id: PlayerId,
    pub user_name: String,
}

impl Participant {
    pub fn new(player_id: PlayerId, user_name: impl Into<String>) -> Self {
        Self {
            player_id,
            user_name: user_name.into(),
        }
    }
}

/// How a channel should be provisioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProvisionOptions {
    /// Attach the help bot: every message posted in the channel is also
    /// delivered to the bot's response webhook.
    pub bot: bool,
}

impl ProvisionOptions {
    /// A plain channel.
    pub const PLAIN: Self = Self { bot: false };

    /// A channel with the help bot subscribed.
    pub const WITH_BOT: Self = Self { bot: true };
}

/// The external chat/video service.
///
/// Every method may suspend for an unbounded time and may fail
/// independently of server state. Callers never roll back local state on
/// failure; provider-side resources are the source of truth.
///
/// The returned futures are `Send` so handlers can await them from
/// spawned connection tasks. Implementors may simply write `async fn`.
///
/// # Example
///
/// ```rust
/// use townsquare_protocol::{ChannelKey, PlayerId};
/// use townsquare_provider::{
///     ChannelProvider, Credentials, Participant, ProviderError, ProvisionOptions,
/// };
///
/// /// Refuses everything. Handy for exercising error paths.
/// struct OfflineProvider;
///
/// impl ChannelProvider for OfflineProvider {
///     async fn issue_credentials(
///         &self,
///         _player_id: &PlayerId,
///         _user_name: &str,
///     ) -> Result<Credentials, ProviderError> {
///         Err(ProviderError::Unavailable("offline".into()))
///     }
///
///     async fn provision_channel(
///         &self,
///         _label: &str,
///         _stable_key: &str,
///         _options: ProvisionOptions,
///     ) -> Result<ChannelKey, ProviderError> {
///         Err(ProviderError::Unavailable("offline".into()))
///     }
///
///     async fn invite(
///         &self,
///         _channel: &ChannelKey,
///         _participant: &Participant,
///     ) -> Result<(), ProviderError> {
///         Err(ProviderError::Unavailable("offline".into()))
///     }
///
///     async fn rename_channel(
///         &self,
///         _channel: &ChannelKey,
///         _label: &str,
///     ) -> Result<(), ProviderError> {
///         Err(ProviderError::Unavailable("offline".into()))
///     }
///
///     async fn retire_channel(
///         &self,
///         _channel: &ChannelKey,
///     ) -> Result<(), ProviderError> {
///         Err(ProviderError::Unavailable("offline".into()))
///     }
/// }
/// ```
pub trait ChannelProvider: Send + Sync + 'static {
    /// Mints video and chat credentials for a player.
    fn issue_credentials(
        &self,
        player_id: &PlayerId,
        user_name: &str,
    ) -> impl Future<Output = Result<Credentials, ProviderError>> + Send;

    /// Creates a channel and returns its provider key.
    ///
    /// `label` is the human-readable name shown in clients. `stable_key`
    /// is a caller-chosen unique name; providers reject duplicates.
    fn provision_channel(
        &self,
        label: &str,
        stable_key: &str,
        options: ProvisionOptions,
    ) -> impl Future<Output = Result<ChannelKey, ProviderError>> + Send;

    /// Invites a participant. Re-inviting an existing member is allowed.
    fn invite(
        &self,
        channel: &ChannelKey,
        participant: &Participant,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send;

    /// Changes a channel's human-readable label.
    fn rename_channel(
        &self,
        channel: &ChannelKey,
        label: &str,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send;

    /// Tears a channel down.
    fn retire_channel(
        &self,
        channel: &ChannelKey,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send;
}

/// Shares one provider between a server and whoever else needs it (an
/// admin task, a test inspecting calls).
impl<P: ChannelProvider> ChannelProvider for std::sync::Arc<P> {
    fn issue_credentials(
        &self,
        player_id: &PlayerId,
        user_name: &str,
    ) -> impl Future<Output = Result<Credentials, ProviderError>> + Send {
        (**self).issue_credentials(player_id, user_name)
    }

    fn provision_channel(
        &self,
        label: &str,
        stable_key: &str,
        options: ProvisionOptions,
    ) -> impl Future<Output = Result<ChannelKey, ProviderError>> + Send {
        (**self).provision_channel(label, stable_key, options)
    }

    fn invite(
        &self,
        channel: &ChannelKey,
        participant: &Participant,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send {
        (**self).invite(channel, participant)
    }

    fn rename_channel(
        &self,
        channel: &ChannelKey,
        label: &str,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send {
        (**self).rename_channel(channel, label)
    }

    fn retire_channel(
        &self,
        channel: &ChannelKey,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send {
        (**self).retire_channel(channel)
    }
}
