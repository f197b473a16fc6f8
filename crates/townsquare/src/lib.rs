//! # Townsquare
//!
//! Multi-town presence and session coordinator.
//!
//! Townsquare keeps a registry of independently administered towns, the
//! players connected to each, and where they are standing. It fans every
//! join, move, and leave out to the other players' live connections, and
//! makes sure repeated or concurrent chat requests never provision the
//! same side channel twice.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use townsquare::prelude::*;
//!
//! # async fn start() -> Result<(), TownsquareError> {
//! let server = TownsquareServerBuilder::new()
//!     .bind("0.0.0.0:8081")
//!     .build(InMemoryProvider::new())
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod connection;
mod error;
mod server;
mod service;
mod subscription;

pub use config::ServerConfig;
pub use error::{RequestError, TownsquareError};
pub use server::{TownsquareServer, TownsquareServerBuilder};
pub use service::{
    ChatOutcome, HELP_ALREADY_INVITED, HELP_CHANNEL_EXISTS,
    PRIVATE_CHANNEL_EXISTS, TownService,
};

/// The types most servers and clients need.
pub mod prelude {
    pub use crate::{
        RequestError, ServerConfig, TownService, TownsquareError,
        TownsquareServer, TownsquareServerBuilder,
    };
    pub use townsquare_protocol::{
        ChannelKey, Codec, Direction, Envelope, JsonCodec, Payload, Player,
        PlayerId, Request, Response, ResponseEnvelope, SessionToken,
        SubscribeRequest, TownEvent, TownId, UserLocation,
    };
    pub use townsquare_provider::{
        ChannelProvider, Credentials, InMemoryProvider, Participant,
        ProviderError, ProvisionOptions,
    };
    pub use townsquare_town::{TownController, TownListener, TownStore};
}
