//! A process-local [`ChannelProvider`].
//!
//! Mints random keys and tokens and remembers every call, so tests can
//! assert on exactly what the server asked the provider to do.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;
use townsquare_protocol::{ChannelKey, PlayerId};

use crate::{ChannelProvider, Credentials, Participant, ProviderError, ProvisionOptions};

/// Everything the provider knows about one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedChannel {
    pub key: ChannelKey,
    pub label: String,
    pub stable_key: String,
    pub bot: bool,
    /// Every invite sent, in order. Duplicates are kept.
    pub invites: Vec<Participant>,
    pub retired: bool,
}

/// In-memory provider for development servers and tests.
///
/// Stable keys are unique across the provider's lifetime, like a real
/// provider's unique channel names. An optional artificial latency is
/// applied to every provisioning call so concurrent callers genuinely
/// overlap.
#[derive(Debug, Default)]
pub struct InMemoryProvider {
    channels: Mutex<HashMap<ChannelKey, ProvisionedChannel>>,
    credentials_issued: AtomicUsize,
    latency: Duration,
}

impl InMemoryProvider {
    /// Creates an empty provider with no artificial latency.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every `provision_channel` call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Looks up a channel by key, retired or not.
    pub async fn channel(&self, key: &ChannelKey) -> Option<ProvisionedChannel> {
        self.channels.lock().await.get(key).cloned()
    }

    /// Returns every channel ever provisioned.
    pub async fn channels(&self) -> Vec<ProvisionedChannel> {
        self.channels.lock().await.values().cloned().collect()
    }

    /// Number of `provision_channel` calls that succeeded.
    pub async fn provision_count(&self) -> usize {
        self.channels.lock().await.len()
    }

    /// Number of credential pairs issued.
    pub fn credentials_issued(&self) -> usize {
        self.credentials_issued.load(Ordering::Relaxed)
    }
}

impl ChannelProvider for InMemoryProvider {
    async fn issue_credentials(
        &self,
        player_id: &PlayerId,
        user_name: &str,
    ) -> Result<Credentials, ProviderError> {
        self.credentials_issued.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(%player_id, user_name, "issuing provider credentials");
        Ok(Credentials {
            video_token: format!("video.{}", random_hex()),
            chat_token: format!("chat.{}", random_hex()),
        })
    }

    async fn provision_channel(
        &self,
        label: &str,
        stable_key: &str,
        options: ProvisionOptions,
    ) -> Result<ChannelKey, ProviderError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut channels = self.channels.lock().await;
        if channels.values().any(|c| c.stable_key == stable_key) {
            return Err(ProviderError::Rejected(format!(
                "stable key {stable_key} already in use"
            )));
        }

        let key = ChannelKey::new(format!("CH{}", random_hex()));
        channels.insert(
            key.clone(),
            ProvisionedChannel {
                key: key.clone(),
                label: label.to_owned(),
                stable_key: stable_key.to_owned(),
                bot: options.bot,
                invites: Vec::new(),
                retired: false,
            },
        );
        tracing::debug!(channel_key = %key, stable_key, bot = options.bot, "channel provisioned");
        Ok(key)
    }

    async fn invite(
        &self,
        channel: &ChannelKey,
        participant: &Participant,
    ) -> Result<(), ProviderError> {
        let mut channels = self.channels.lock().await;
        let entry = channels
            .get_mut(channel)
            .filter(|c| !c.retired)
            .ok_or_else(|| ProviderError::ChannelNotFound(channel.clone()))?;
        entry.invites.push(participant.clone());
        Ok(())
    }

    async fn rename_channel(
        &self,
        channel: &ChannelKey,
        label: &str,
    ) -> Result<(), ProviderError> {
        let mut channels = self.channels.lock().await;
        let entry = channels
            .get_mut(channel)
            .filter(|c| !c.retired)
            .ok_or_else(|| ProviderError::ChannelNotFound(channel.clone()))?;
        entry.label = label.to_owned();
        Ok(())
    }

    async fn retire_channel(
        &self,
        channel: &ChannelKey,
    ) -> Result<(), ProviderError> {
        let mut channels = self.channels.lock().await;
        let entry = channels
            .get_mut(channel)
            .filter(|c| !c.retired)
            .ok_or_else(|| ProviderError::ChannelNotFound(channel.clone()))?;
        entry.retired = true;
        Ok(())
    }
}

/// 128 random bits as 32 lowercase hex characters.
fn random_hex() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bob() -> Participant {
        Participant::new(PlayerId::new("p1"), "Bob")
    }

    #[tokio::test]
    async fn test_issue_credentials_returns_distinct_tokens() {
        let provider = InMemoryProvider::new();
        let a = provider
            .issue_credentials(&PlayerId::new("p1"), "Bob")
            .await
            .unwrap();
        let b = provider
            .issue_credentials(&PlayerId::new("p2"), "Carol")
            .await
            .unwrap();

        assert_ne!(a.video_token, b.video_token);
        assert_ne!(a.chat_token, b.chat_token);
        assert_eq!(provider.credentials_issued(), 2);
    }

    #[tokio::test]
    async fn test_provision_channel_records_label_and_bot_flag() {
        let provider = InMemoryProvider::new();
        let key = provider
            .provision_channel("Help", "k1", ProvisionOptions::WITH_BOT)
            .await
            .unwrap();

        let channel = provider.channel(&key).await.unwrap();
        assert_eq!(channel.label, "Help");
        assert_eq!(channel.stable_key, "k1");
        assert!(channel.bot);
        assert!(!channel.retired);
    }

    #[tokio::test]
    async fn test_provision_channel_duplicate_stable_key_is_rejected() {
        let provider = InMemoryProvider::new();
        provider
            .provision_channel("a", "same", ProvisionOptions::PLAIN)
            .await
            .unwrap();

        let result = provider
            .provision_channel("b", "same", ProvisionOptions::PLAIN)
            .await;

        assert!(matches!(result, Err(ProviderError::Rejected(_))));
        assert_eq!(provider.provision_count().await, 1);
    }

    #[tokio::test]
    async fn test_invite_unknown_channel_returns_not_found() {
        let provider = InMemoryProvider::new();
        let result = provider.invite(&ChannelKey::new("nope"), &bob()).await;
        assert!(matches!(result, Err(ProviderError::ChannelNotFound(_))));
    }

    #[tokio::test]
    async fn test_invite_keeps_duplicate_invites() {
        let provider = InMemoryProvider::new();
        let key = provider
            .provision_channel("x", "k", ProvisionOptions::PLAIN)
            .await
            .unwrap();

        provider.invite(&key, &bob()).await.unwrap();
        provider.invite(&key, &bob()).await.unwrap();

        assert_eq!(provider.channel(&key).await.unwrap().invites.len(), 2);
    }

    #[tokio::test]
    async fn test_retire_channel_blocks_further_invites_and_renames() {
        let provider = InMemoryProvider::new();
        let key = provider
            .provision_channel("x", "k", ProvisionOptions::PLAIN)
            .await
            .unwrap();

        provider.retire_channel(&key).await.unwrap();

        assert!(provider.channel(&key).await.unwrap().retired);
        assert!(provider.invite(&key, &bob()).await.is_err());
        assert!(provider.rename_channel(&key, "y").await.is_err());
        assert!(provider.retire_channel(&key).await.is_err());
    }

    #[tokio::test]
    async fn test_rename_channel_updates_label() {
        let provider = InMemoryProvider::new();
        let key = provider
            .provision_channel("Old", "k", ProvisionOptions::PLAIN)
            .await
            .unwrap();

        provider.rename_channel(&key, "New").await.unwrap();

        assert_eq!(provider.channel(&key).await.unwrap().label, "New");
    }
}
