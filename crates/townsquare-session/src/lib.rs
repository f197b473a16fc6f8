//! Player session management for Townsquare.
//!
//! A session is the server's record of one joined player:
//!
//! 1. **Identity**: the [`Player`](townsquare_protocol::Player) it owns
//! 2. **Authentication**: a secret [`SessionToken`](townsquare_protocol::SessionToken)
//!    the player's live connection presents to attach to the town
//! 3. **Provider credentials**: the video/chat tokens issued at join time
//!
//! # How it fits in the stack
//!
//! ```text
//! Town Layer (above)  ← each town owns one SessionRegistry
//!     ↕
//! Session Layer (this crate)  ← token → session bookkeeping
//!     ↕
//! Protocol Layer (below)  ← PlayerId, SessionToken, Player
//! ```

mod error;
mod registry;
mod session;
mod token;

pub use error::SessionError;
pub use registry::SessionRegistry;
pub use session::PlayerSession;
pub use token::{generate_player_id, generate_session_token};
