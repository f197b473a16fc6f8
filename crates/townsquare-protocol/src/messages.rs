//! Request/response bodies, live town events, and the top-level envelope.
//!
//! A connection speaks one of two dialects, chosen by its first message:
//!
//! ```text
//! request connection:  Request ──→  ←── Response(ResponseEnvelope)   (repeat)
//! live connection:     Subscribe ──→  ←── Event(TownEvent) ...
//!                      Movement  ──→
//!                      Disconnect ─→
//!
//! either dialect:      Heartbeat ──→  ←── HeartbeatAck
//! ```

use serde::{Deserialize, Serialize};

use crate::{ChannelKey, Player, PlayerId, SessionToken, TownId, UserLocation};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Ask to join a town under a display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TownJoinRequest {
    pub user_name: String,
    pub town_id: TownId,
}

/// Ask to create a new town.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TownCreateRequest {
    pub friendly_name: String,
    pub is_publicly_listed: bool,
}

/// Ask to delete a town. Requires the town's update password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TownDeleteRequest {
    pub town_id: TownId,
    pub town_password: String,
}

/// Ask to rename a town and/or change its visibility.
///
/// Both settings are optional and independent. An absent
/// `is_publicly_listed` leaves the visibility alone; it is NOT the same
/// as `Some(false)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TownUpdateRequest {
    pub town_id: TownId,
    pub town_password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_publicly_listed: Option<bool>,
}

/// Ask for a private conversation between two players of the same town.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatCreateRequest {
    pub current_player_id: PlayerId,
    pub other_player_id: PlayerId,
    pub town_id: TownId,
}

/// Ask for a bot-assisted help conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelpChatCreateRequest {
    pub player_id: PlayerId,
    pub town_id: TownId,
}

/// Every request a client can make on a request connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Request {
    JoinTown(TownJoinRequest),
    ListTowns,
    CreateTown(TownCreateRequest),
    DeleteTown(TownDeleteRequest),
    UpdateTown(TownUpdateRequest),
    CreatePrivateChat(ChatCreateRequest),
    CreateHelpChat(HelpChatCreateRequest),
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Everything a freshly joined player needs to attach to the town.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TownJoinResponse {
    /// The player id the server assigned.
    pub player_id: PlayerId,
    /// Present this on the live connection's `Subscribe`.
    pub session_token: SessionToken,
    /// Opaque credential for the video provider.
    pub provider_video_token: String,
    /// Opaque credential for the chat provider.
    pub provider_chat_token: String,
    /// Everyone in the town right now, including the new player.
    pub current_players: Vec<Player>,
    pub friendly_name: String,
    pub is_publicly_listed: bool,
}

/// Returned once, at creation. The password is never shown again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TownCreateResponse {
    pub town_id: TownId,
    pub town_password: String,
}

/// One publicly listed town.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TownListing {
    pub town_id: TownId,
    pub friendly_name: String,
    pub current_occupancy: usize,
}

/// The public town directory. Order carries no meaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TownListResponse {
    pub towns: Vec<TownListing>,
}

/// The provider key of a private or help channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatCreateResponse {
    pub channel_key: ChannelKey,
}

/// Successful response bodies, one per request kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Response {
    Joined(TownJoinResponse),
    TownList(TownListResponse),
    Created(TownCreateResponse),
    /// Delete and update have nothing to report beyond success.
    Done,
    ChatCreated(ChatCreateResponse),
}

/// Wraps every response: `is_ok` plus either a body or an explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub is_ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Response>,
}

impl ResponseEnvelope {
    /// A successful response.
    pub fn ok(response: Response) -> Self {
        Self {
            is_ok: true,
            message: None,
            response: Some(response),
        }
    }

    /// A successful response with an informational note.
    pub fn ok_with_message(
        response: Response,
        message: impl Into<String>,
    ) -> Self {
        Self {
            is_ok: true,
            message: Some(message.into()),
            response: Some(response),
        }
    }

    /// A failed request. Nothing changed on the server.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            is_ok: false,
            message: Some(message.into()),
            response: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Live connection
// ---------------------------------------------------------------------------

/// First message of a live connection: "attach me to my session".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    pub session_token: SessionToken,
    pub town_id: TownId,
}

/// Server → client notifications on a live connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum TownEvent {
    PlayerJoined(Player),
    PlayerMoved(Player),
    PlayerDisconnected(Player),
    /// The town was deleted. The server closes the connection right after.
    TownClosing,
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The content of an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum Payload {
    /// Client → server on a request connection.
    Request(Request),
    /// Server → client, answering the request with the same `seq`.
    Response(ResponseEnvelope),
    /// Client → server, first message of a live connection.
    Subscribe(SubscribeRequest),
    /// Server → client on a live connection.
    Event(TownEvent),
    /// Client → server on a live connection: "I moved".
    Movement(UserLocation),
    /// Client → server on a live connection: "I'm leaving".
    Disconnect,
    /// Client → server keep-alive. Resets the idle deadline.
    #[serde(rename_all = "camelCase")]
    Heartbeat { client_time: u64 },
    /// Server → client answer to a heartbeat.
    ///
    /// `server_time` is milliseconds since the connection was accepted.
    #[serde(rename_all = "camelCase")]
    HeartbeatAck { client_time: u64, server_time: u64 },
}

/// Every message on the wire is an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Sender-local sequence number. Responses echo the request's `seq`.
    pub seq: u64,

    /// Milliseconds since the sending side's connection started.
    #[serde(default)]
    pub timestamp: u64,

    pub payload: Payload,
}

impl Envelope {
    pub fn new(seq: u64, timestamp: u64, payload: Payload) -> Self {
        Self {
            seq,
            timestamp,
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_join_town_json_format() {
        let req = Request::JoinTown(TownJoinRequest {
            user_name: "Bob".into(),
            town_id: TownId::new("t1"),
        });
        let json: serde_json::Value = serde_json::to_value(&req).unwrap();

        assert_eq!(json["type"], "joinTown");
        assert_eq!(json["userName"], "Bob");
        assert_eq!(json["townId"], "t1");
    }

    #[test]
    fn test_request_list_towns_is_bare_tag() {
        let json = serde_json::to_string(&Request::ListTowns).unwrap();
        assert_eq!(json, r#"{"type":"listTowns"}"#);
    }

    #[test]
    fn test_update_request_omitted_visibility_parses_as_none() {
        // Absent and `false` must stay distinguishable.
        let raw = r#"{"type":"updateTown","townId":"t1","townPassword":"pw","friendlyName":"New"}"#;
        let req: Request = serde_json::from_str(raw).unwrap();
        match req {
            Request::UpdateTown(update) => {
                assert_eq!(update.friendly_name.as_deref(), Some("New"));
                assert_eq!(update.is_publicly_listed, None);
            }
            other => panic!("expected UpdateTown, got {other:?}"),
        }
    }

    #[test]
    fn test_update_request_explicit_false_parses_as_some_false() {
        let raw = r#"{"type":"updateTown","townId":"t1","townPassword":"pw","isPubliclyListed":false}"#;
        let req: Request = serde_json::from_str(raw).unwrap();
        match req {
            Request::UpdateTown(update) => {
                assert_eq!(update.friendly_name, None);
                assert_eq!(update.is_publicly_listed, Some(false));
            }
            other => panic!("expected UpdateTown, got {other:?}"),
        }
    }

    #[test]
    fn test_update_request_skips_absent_fields_when_serialized() {
        let req = TownUpdateRequest {
            town_id: TownId::new("t1"),
            town_password: "pw".into(),
            friendly_name: None,
            is_publicly_listed: None,
        };
        let json: serde_json::Value = serde_json::to_value(&req).unwrap();
        assert!(json.get("friendlyName").is_none());
        assert!(json.get("isPubliclyListed").is_none());
    }

    #[test]
    fn test_response_envelope_error_has_no_body() {
        let env = ResponseEnvelope::error("invalid password");
        let json: serde_json::Value = serde_json::to_value(&env).unwrap();

        assert_eq!(json["isOk"], false);
        assert_eq!(json["message"], "invalid password");
        assert!(json.get("response").is_none());
    }

    #[test]
    fn test_response_envelope_ok_carries_tagged_body() {
        let env = ResponseEnvelope::ok(Response::ChatCreated(
            ChatCreateResponse {
                channel_key: ChannelKey::new("CH1"),
            },
        ));
        let json: serde_json::Value = serde_json::to_value(&env).unwrap();

        assert_eq!(json["isOk"], true);
        assert_eq!(json["response"]["type"], "chatCreated");
        assert_eq!(json["response"]["channelKey"], "CH1");
    }

    #[test]
    fn test_town_event_player_moved_json_format() {
        let event = TownEvent::PlayerMoved(Player::new(
            PlayerId::new("p1"),
            "Carol",
        ));
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "playerMoved");
        assert_eq!(json["data"]["userName"], "Carol");
    }

    #[test]
    fn test_town_event_town_closing_has_no_data() {
        let json: serde_json::Value =
            serde_json::to_value(&TownEvent::TownClosing).unwrap();
        assert_eq!(json["type"], "townClosing");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn test_envelope_subscribe_json_format() {
        let env = Envelope::new(
            0,
            0,
            Payload::Subscribe(SubscribeRequest {
                session_token: SessionToken::new("secret"),
                town_id: TownId::new("t1"),
            }),
        );
        let json: serde_json::Value = serde_json::to_value(&env).unwrap();

        assert_eq!(json["payload"]["type"], "subscribe");
        assert_eq!(json["payload"]["data"]["sessionToken"], "secret");
        assert_eq!(json["payload"]["data"]["townId"], "t1");
    }

    #[test]
    fn test_envelope_timestamp_defaults_when_missing() {
        let raw = r#"{"seq": 3, "payload": {"type": "disconnect"}}"#;
        let env: Envelope = serde_json::from_str(raw).unwrap();
        assert_eq!(env.seq, 3);
        assert_eq!(env.timestamp, 0);
        assert_eq!(env.payload, Payload::Disconnect);
    }

    #[test]
    fn test_envelope_heartbeat_json_format() {
        let raw = r#"{"seq": 9, "payload": {"type": "heartbeat", "data": {"clientTime": 5000}}}"#;
        let env: Envelope = serde_json::from_str(raw).unwrap();
        assert_eq!(env.payload, Payload::Heartbeat { client_time: 5000 });
    }

    #[test]
    fn test_envelope_heartbeat_ack_json_format() {
        let env = Envelope::new(
            4,
            0,
            Payload::HeartbeatAck {
                client_time: 5000,
                server_time: 120,
            },
        );
        let json: serde_json::Value = serde_json::to_value(&env).unwrap();

        assert_eq!(json["payload"]["type"], "heartbeatAck");
        assert_eq!(json["payload"]["data"]["clientTime"], 5000);
        assert_eq!(json["payload"]["data"]["serverTime"], 120);
    }

    #[test]
    fn test_decode_unknown_request_type_returns_error() {
        let raw = r#"{"type": "flyToMoon"}"#;
        let result: Result<Request, _> = serde_json::from_str(raw);
        assert!(result.is_err());
    }
}
