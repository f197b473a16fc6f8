//! Live town connections: binds one connection to one player's session.
//!
//! The adapter registers a [`ConnectionListener`] with the town. The
//! listener turns town callbacks into [`TownEvent`]s on an unbounded
//! channel, and the connection task drains that channel onto the socket
//! while also reading the client's movement, heartbeat and disconnect
//! messages. Any inbound message resets the idle deadline.
//!
//! ```text
//! town actor ──callback──→ ConnectionListener ──mpsc──→ connection task ──→ socket
//! socket ──→ connection task ──→ update_player_location / destroy_session
//! ```
//!
//! Whatever ends the connection (client close, `Disconnect`, idle
//! timeout, town deletion) the listener is unregistered and the session
//! destroyed, in that order.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;
use townsquare_protocol::{
    Codec, Envelope, Payload, Player, PlayerId, Response, ResponseEnvelope,
    SubscribeRequest, TownEvent,
};
use townsquare_provider::ChannelProvider;
use townsquare_session::{PlayerSession, SessionError};
use townsquare_town::{TownController, TownListener};
use townsquare_transport::{Connection, TransportError};

use crate::TownsquareError;
use crate::connection::{Outbound, send_envelope};
use crate::server::ServerState;

/// Forwards one town's events to one connection.
pub(crate) struct ConnectionListener {
    player_id: PlayerId,
    echo_own_movement: bool,
    events: mpsc::UnboundedSender<TownEvent>,
}

impl ConnectionListener {
    fn forward(&self, event: TownEvent) {
        // The connection task may already be gone; nothing to do then.
        let _ = self.events.send(event);
    }
}

impl TownListener for ConnectionListener {
    fn on_player_joined(&self, player: &Player) {
        self.forward(TownEvent::PlayerJoined(player.clone()));
    }

    fn on_player_moved(&self, player: &Player) {
        if !self.echo_own_movement && player.id == self.player_id {
            return;
        }
        self.forward(TownEvent::PlayerMoved(player.clone()));
    }

    fn on_player_disconnected(&self, player: &Player) {
        self.forward(TownEvent::PlayerDisconnected(player.clone()));
    }

    fn on_town_destroyed(&self) {
        self.forward(TownEvent::TownClosing);
    }
}

/// Why a live connection stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ended {
    ClientClosed,
    ClientLeft,
    IdleTimeout,
    TownClosed,
    SendFailed,
}

/// Serves a live town connection whose first message was `subscribe`.
///
/// A subscribe that doesn't match a live session gets one error response
/// and the connection is closed.
pub(crate) async fn serve_subscription<C, P, K>(
    conn: &C,
    state: &Arc<ServerState<P, K>>,
    out: &mut Outbound,
    subscribe_seq: u64,
    req: SubscribeRequest,
) -> Result<(), TownsquareError>
where
    C: Connection<Error = TransportError>,
    P: ChannelProvider,
    K: Codec,
{
    let Some((town, session)) = resolve(state, &req).await else {
        tracing::info!(conn_id = %conn.id(), town_id = %req.town_id, "subscription refused");
        let refusal = ResponseEnvelope::error(SessionError::InvalidToken.to_string());
        send_envelope(conn, &state.codec, out, subscribe_seq, Payload::Response(refusal)).await?;
        let _ = conn.close().await;
        return Ok(());
    };

    let player_id = session.player.id.clone();
    let (tx, mut events) = mpsc::unbounded_channel();
    let listener = Arc::new(ConnectionListener {
        player_id: player_id.clone(),
        echo_own_movement: state.config.echo_own_movement,
        events: tx,
    });
    let listener_id = town.add_town_listener(&listener).await?;

    tracing::info!(
        conn_id = %conn.id(),
        town_id = %req.town_id,
        %player_id,
        listener = %listener_id,
        "live connection attached"
    );

    let ack = ResponseEnvelope::ok(Response::Done);
    let ended = if send_envelope(conn, &state.codec, out, subscribe_seq, Payload::Response(ack))
        .await
        .is_err()
    {
        Ended::SendFailed
    } else {
        if let Err(e) = town.announce_player(&player_id).await {
            tracing::debug!(%player_id, error = %e, "announce failed");
        }
        pump(conn, state, out, &town, &player_id, &mut events).await
    };

    tracing::info!(conn_id = %conn.id(), %player_id, reason = ?ended, "live connection ended");

    // The town may already be gone; both calls are then no-ops.
    if let Err(e) = town.remove_town_listener(listener_id).await {
        tracing::debug!(%player_id, error = %e, "listener removal skipped");
    }
    if let Err(e) = town.destroy_session(&session.token).await {
        tracing::debug!(%player_id, error = %e, "session teardown skipped");
    }
    drop(listener);

    if ended != Ended::ClientClosed {
        let _ = conn.close().await;
    }
    Ok(())
}

async fn resolve<P, K>(
    state: &ServerState<P, K>,
    req: &SubscribeRequest,
) -> Option<(TownController, PlayerSession)>
where
    P: ChannelProvider,
    K: Codec,
{
    let town = state.service.lookup(&req.town_id).await?;
    let session = town.session_by_token(&req.session_token).await.ok()??;
    Some((town, session))
}

/// Moves events out and client messages in until the connection ends.
async fn pump<C, P, K>(
    conn: &C,
    state: &ServerState<P, K>,
    out: &mut Outbound,
    town: &TownController,
    player_id: &PlayerId,
    events: &mut mpsc::UnboundedReceiver<TownEvent>,
) -> Ended
where
    C: Connection<Error = TransportError>,
    P: ChannelProvider,
    K: Codec,
{
    let idle = state.config.idle_timeout;
    let mut deadline = Instant::now() + idle;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { return Ended::TownClosed };
                let closing = matches!(event, TownEvent::TownClosing);
                let seq = out.next_seq();
                if send_envelope(conn, &state.codec, out, seq, Payload::Event(event))
                    .await
                    .is_err()
                {
                    return Ended::SendFailed;
                }
                if closing {
                    return Ended::TownClosed;
                }
            }
            inbound = conn.recv() => {
                let data = match inbound {
                    Ok(Some(data)) => data,
                    Ok(None) => return Ended::ClientClosed,
                    Err(e) => {
                        tracing::debug!(%player_id, error = %e, "recv error");
                        return Ended::ClientClosed;
                    }
                };
                deadline = Instant::now() + idle;

                let envelope: Envelope = match state.codec.decode(&data) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        tracing::debug!(%player_id, error = %e, "failed to decode envelope");
                        continue;
                    }
                };

                match envelope.payload {
                    Payload::Movement(location) => {
                        if let Err(e) = town.update_player_location(player_id, location).await {
                            tracing::debug!(%player_id, error = %e, "movement dropped");
                        }
                    }
                    Payload::Disconnect => return Ended::ClientLeft,
                    Payload::Heartbeat { client_time } => {
                        let seq = out.next_seq();
                        let ack = Payload::HeartbeatAck {
                            client_time,
                            server_time: out.elapsed_ms(),
                        };
                        if send_envelope(conn, &state.codec, out, seq, ack).await.is_err() {
                            return Ended::SendFailed;
                        }
                    }
                    _ => {
                        tracing::debug!(%player_id, "ignoring unexpected message on live connection");
                    }
                }
            }
            _ = tokio::time::sleep_until(deadline) => {
                return Ended::IdleTimeout;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use townsquare_protocol::{Direction, UserLocation};

    use super::*;

    fn listener(echo: bool) -> (ConnectionListener, mpsc::UnboundedReceiver<TownEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener = ConnectionListener {
            player_id: PlayerId::new("me"),
            echo_own_movement: echo,
            events: tx,
        };
        (listener, rx)
    }

    fn player(id: &str) -> Player {
        let mut player = Player::new(PlayerId::new(id), id.to_uppercase());
        player.location = UserLocation {
            x: 1.0,
            y: 2.0,
            rotation: Direction::Back,
            moving: true,
        };
        player
    }

    #[test]
    fn test_on_player_moved_echo_enabled_forwards_own_movement() {
        let (listener, mut rx) = listener(true);
        listener.on_player_moved(&player("me"));
        assert_eq!(rx.try_recv().unwrap(), TownEvent::PlayerMoved(player("me")));
    }

    #[test]
    fn test_on_player_moved_echo_disabled_filters_only_own_movement() {
        let (listener, mut rx) = listener(false);
        listener.on_player_moved(&player("me"));
        listener.on_player_moved(&player("other"));

        assert_eq!(rx.try_recv().unwrap(), TownEvent::PlayerMoved(player("other")));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_listener_forwards_each_event_kind_in_order() {
        let (listener, mut rx) = listener(true);
        listener.on_player_joined(&player("a"));
        listener.on_player_disconnected(&player("a"));
        listener.on_town_destroyed();

        assert_eq!(rx.try_recv().unwrap(), TownEvent::PlayerJoined(player("a")));
        assert_eq!(rx.try_recv().unwrap(), TownEvent::PlayerDisconnected(player("a")));
        assert_eq!(rx.try_recv().unwrap(), TownEvent::TownClosing);
    }

    #[test]
    fn test_listener_after_receiver_dropped_does_not_panic() {
        let (listener, rx) = listener(true);
        drop(rx);
        listener.on_town_destroyed();
    }
}
