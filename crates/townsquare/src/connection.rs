//! Per-connection handler: role selection and request routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive the first envelope (bounded by the handshake timeout)
//!   2. `subscribe` → live town connection (see [`crate::subscription`])
//!   3. `request`   → request connection: answer it and every following
//!      request, echoing each request's `seq`, until the client closes

use std::sync::Arc;
use std::time::Instant;

use townsquare_protocol::{
    Codec, Envelope, Payload, ProtocolError, Request, ResponseEnvelope,
};
use townsquare_provider::ChannelProvider;
use townsquare_transport::{Connection, TransportError};

use crate::TownsquareError;
use crate::server::ServerState;
use crate::subscription::serve_subscription;

/// Outbound bookkeeping for one connection.
pub(crate) struct Outbound {
    next_seq: u64,
    started: Instant,
}

impl Outbound {
    fn new() -> Self {
        Self {
            next_seq: 1,
            started: Instant::now(),
        }
    }

    /// Sequence number for a server-initiated message.
    pub(crate) fn next_seq(&mut self) -> u64 {
        let current = self.next_seq;
        self.next_seq += 1;
        current
    }

    pub(crate) fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C, P, K>(
    conn: C,
    state: Arc<ServerState<P, K>>,
) -> Result<(), TownsquareError>
where
    C: Connection<Error = TransportError>,
    P: ChannelProvider,
    K: Codec,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");
    let mut out = Outbound::new();

    let first = match tokio::time::timeout(
        state.config.handshake_timeout,
        conn.recv(),
    )
    .await
    {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            tracing::debug!(%conn_id, "closed before first message");
            return Ok(());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            let _ = conn.close().await;
            return Err(ProtocolError::InvalidMessage(
                "no message before handshake timeout".into(),
            )
            .into());
        }
    };

    let envelope: Envelope = state.codec.decode(&first)?;
    match envelope.payload {
        Payload::Subscribe(req) => {
            serve_subscription(&conn, &state, &mut out, envelope.seq, req).await
        }
        Payload::Request(request) => {
            answer(&conn, &state, &mut out, envelope.seq, request).await?;
            serve_requests(&conn, &state, &mut out).await
        }
        _ => {
            let refusal = ResponseEnvelope::error("expected a request or a subscription");
            send_envelope(&conn, &state.codec, &mut out, envelope.seq, Payload::Response(refusal))
                .await?;
            let _ = conn.close().await;
            Err(ProtocolError::InvalidMessage(
                "first message must be a request or a subscription".into(),
            )
            .into())
        }
    }
}

/// Request/response loop for a request connection.
async fn serve_requests<C, P, K>(
    conn: &C,
    state: &Arc<ServerState<P, K>>,
    out: &mut Outbound,
) -> Result<(), TownsquareError>
where
    C: Connection<Error = TransportError>,
    P: ChannelProvider,
    K: Codec,
{
    let conn_id = conn.id();
    loop {
        let data = match tokio::time::timeout(state.config.idle_timeout, conn.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::debug!(%conn_id, "request connection closed");
                return Ok(());
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                tracing::debug!(%conn_id, "request connection idle, closing");
                let _ = conn.close().await;
                return Ok(());
            }
        };

        let envelope: Envelope = match state.codec.decode(&data) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "failed to decode envelope");
                let refusal = ResponseEnvelope::error(format!("malformed message: {e}"));
                let seq = out.next_seq();
                send_envelope(conn, &state.codec, out, seq, Payload::Response(refusal)).await?;
                continue;
            }
        };

        match envelope.payload {
            Payload::Request(request) => {
                answer(conn, state, out, envelope.seq, request).await?;
            }
            Payload::Heartbeat { client_time } => {
                let ack = Payload::HeartbeatAck {
                    client_time,
                    server_time: out.elapsed_ms(),
                };
                send_envelope(conn, &state.codec, out, envelope.seq, ack).await?;
            }
            _ => {
                let refusal = ResponseEnvelope::error("expected a request");
                send_envelope(conn, &state.codec, out, envelope.seq, Payload::Response(refusal))
                    .await?;
            }
        }
    }
}

async fn answer<C, P, K>(
    conn: &C,
    state: &Arc<ServerState<P, K>>,
    out: &mut Outbound,
    seq: u64,
    request: Request,
) -> Result<(), TownsquareError>
where
    C: Connection<Error = TransportError>,
    P: ChannelProvider,
    K: Codec,
{
    let response = state.service.handle(request).await;
    send_envelope(conn, &state.codec, out, seq, Payload::Response(response)).await
}

/// Encodes and sends one envelope.
pub(crate) async fn send_envelope<C, K>(
    conn: &C,
    codec: &K,
    out: &Outbound,
    seq: u64,
    payload: Payload,
) -> Result<(), TownsquareError>
where
    C: Connection<Error = TransportError>,
    K: Codec,
{
    let envelope = Envelope::new(seq, out.elapsed_ms(), payload);
    let bytes = codec.encode(&envelope)?;
    conn.send(&bytes).await?;
    Ok(())
}

