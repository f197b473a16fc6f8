//! Town lifecycle and live presence for Townsquare.
//!
//! Each town runs as an isolated Tokio task (actor model) that owns its
//! players, sessions, registered listeners, and auxiliary channel
//! records. Operations on one town are linearized through its command
//! channel; different towns never contend.
//!
//! # Key types
//!
//! - [`TownStore`]: the process-wide registry; password-checked
//!   create/update/delete
//! - [`TownController`]: handle to one running town actor
//! - [`TownListener`]: observer interface for player/town events
//! - [`AuxChannel`]: record of a provisioned private or help channel
//! - [`TownInfo`]: snapshot of a town's settings and occupancy

mod channels;
mod controller;
mod error;
mod listener;
mod store;

pub use channels::{AuxChannel, AuxChannelKind, DedupKey, PlayerPair};
pub use controller::{
    ChannelGuard, TownController, TownInfo, TownSettings, TownTeardown,
};
pub use error::TownError;
pub use listener::{ListenerId, TownListener};
pub use store::TownStore;
