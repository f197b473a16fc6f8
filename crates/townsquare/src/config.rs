//! Server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a [`TownsquareServer`](crate::TownsquareServer).
///
/// Usually built through
/// [`TownsquareServerBuilder`](crate::TownsquareServerBuilder).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,

    /// How long a new connection has to finish the WebSocket upgrade and
    /// send its first message.
    pub handshake_timeout: Duration,

    /// A connection that sends nothing for this long is treated as gone.
    /// On a live town connection that ends the player's session.
    pub idle_timeout: Duration,

    /// Whether a mover's own live connection receives its `playerMoved`
    /// events.
    pub echo_own_movement: bool,

    /// Command queue size of each town actor.
    pub town_channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8081".to_string(),
            handshake_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(300),
            echo_own_movement: true,
            town_channel_capacity: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default_echoes_movement() {
        let config = ServerConfig::default();
        assert!(config.echo_own_movement);
        assert!(config.handshake_timeout < config.idle_timeout);
        assert!(config.town_channel_capacity > 0);
    }
}
