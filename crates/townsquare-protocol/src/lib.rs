//! Wire protocol for Townsquare.
//!
//! This crate defines everything that crosses the network boundary:
//!
//! - **Identity** ([`PlayerId`], [`TownId`], [`SessionToken`],
//!   [`ChannelKey`]): opaque string newtypes.
//! - **Presence** ([`Player`], [`UserLocation`], [`Direction`]): what a
//!   connected participant looks like to everyone else.
//! - **Messages** ([`Request`], [`Response`], [`ResponseEnvelope`],
//!   [`TownEvent`], [`Envelope`]): the request/response surface and the
//!   live-connection event stream.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how messages become
//!   bytes.
//!
//! The protocol layer knows nothing about connections or towns. It only
//! knows shapes and how to serialize them.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Town (players, sessions)
//! ```

mod codec;
mod error;
mod ids;
mod messages;
mod player;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use ids::{ChannelKey, PlayerId, SessionToken, TownId};
pub use messages::{
    ChatCreateRequest, ChatCreateResponse, Envelope, HelpChatCreateRequest,
    Payload, Request, Response, ResponseEnvelope, SubscribeRequest,
    TownCreateRequest, TownCreateResponse, TownDeleteRequest, TownEvent,
    TownJoinRequest, TownJoinResponse, TownListResponse, TownListing,
    TownUpdateRequest,
};
pub use player::{Direction, Player, UserLocation};
