//! Chat/video channel provider interface for Townsquare.
//!
//! Townsquare doesn't host chat or video itself. A third-party provider
//! mints client credentials and owns the channels players talk in. The
//! server only needs five things from it, captured by the
//! [`ChannelProvider`] trait:
//!
//! - issue per-player video and chat credentials
//! - provision a channel (optionally with a help bot attached)
//! - invite a participant to a channel
//! - rename a channel
//! - retire a channel
//!
//! [`InMemoryProvider`] implements the trait inside the process. It's
//! what the demo server and the test suites run against.

mod error;
mod memory;
mod provider;

pub use error::ProviderError;
pub use memory::{InMemoryProvider, ProvisionedChannel};
pub use provider::{ChannelProvider, Credentials, Participant, ProvisionOptions};
