//! Error types for provider calls.

use townsquare_protocol::ChannelKey;

/// Errors surfaced by a [`ChannelProvider`](crate::ChannelProvider).
///
/// The server treats all of these as opaque failures of the request in
/// flight. Nothing is retried automatically.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The channel doesn't exist (never provisioned, or already retired).
    #[error("channel {0} not found")]
    ChannelNotFound(ChannelKey),

    /// The provider refused the call, e.g. a duplicate stable key.
    #[error("provider rejected the request: {0}")]
    Rejected(String),

    /// The provider could not be reached or timed out.
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}
