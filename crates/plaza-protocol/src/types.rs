//! Core protocol types: everything that travels over a town socket.
//!
//! A client holds one socket per town. It sends [`ClientMessage`]s (the
//! subscribe handshake and its own movement) and receives
//! [`ServerEvent`]s describing what every other participant did. Both
//! directions are wrapped in an [`Envelope`] carrying a per-connection
//! sequence number.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a player (one avatar inside one town).
///
/// Player ids are assigned by the server when a join is accepted and are
/// unique within the process. A client that leaves and rejoins gets a
/// new id.
///
/// `#[serde(transparent)]` makes `PlayerId(42)` serialize as plain `42`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A unique identifier for a town.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TownId(pub u64);

impl fmt::Display for TownId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

/// Which way an avatar is facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Front,
    Back,
    Left,
    Right,
}

/// Where an avatar is and what it is doing.
///
/// Locations are client-authoritative: the server stores whatever the
/// owning client reports, with no bounds or speed checks.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub rotation: Direction,
    #[serde(default)]
    pub moving: bool,
}

impl Location {
    /// A standing, front-facing location at `(x, y)`.
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            ..Self::default()
        }
    }

    /// Euclidean distance between two locations (facing is ignored).
    pub fn distance_to(&self, other: &Location) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

// ---------------------------------------------------------------------------
// Privileges
// ---------------------------------------------------------------------------

/// Per-player capability flags.
///
/// `audio`, `video`, and `chat` gate what the client may publish to the
/// external media/chat providers. `admin` grants moderation rights
/// (ban, mute, promote, empty town) over the other players of the town.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Privileges {
    pub audio: bool,
    pub video: bool,
    pub chat: bool,
    pub admin: bool,
}

impl Default for Privileges {
    /// Everything allowed except moderation.
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
            chat: true,
            admin: false,
        }
    }
}

/// A partial privilege change requested by an admin.
///
/// Only the fields that are `Some` are applied; absent fields keep their
/// current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrivilegeUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
}

// ---------------------------------------------------------------------------
// PlayerSnapshot
// ---------------------------------------------------------------------------

/// The wire form of a player: a copy of its state at the moment the
/// event was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    /// Display name. Not unique within a town.
    pub user_name: String,
    pub location: Location,
    pub privileges: Privileges,
}

// ---------------------------------------------------------------------------
// Socket messages
// ---------------------------------------------------------------------------

/// Client → server messages on a town socket.
///
/// Internally tagged: `{ "type": "PlayerMovement", "location": { ... } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// First message on every socket: "bind this connection to the
    /// session I got from the join call".
    Subscribe {
        town_id: TownId,
        session_token: String,
    },

    /// "My avatar is now here."
    PlayerMovement { location: Location },

    /// "I'm leaving." Closing the socket has the same effect.
    Disconnect,
}

/// Why the server ended a session on its own initiative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectReason {
    /// The town was deleted.
    TownDestroyed,
    /// An admin removed every player from the town.
    TownEmptied,
    /// An admin banned this player.
    RemovedByAdmin,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::TownDestroyed => "town destroyed",
            Self::TownEmptied => "town emptied by an admin",
            Self::RemovedByAdmin => "removed by an admin",
        };
        f.write_str(text)
    }
}

/// Server → client events on a town socket.
///
/// Every mutating operation on a town produces zero or more of these,
/// delivered to each subscribed connection in the order the operations
/// were applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Ack for [`ClientMessage::Subscribe`].
    Subscribed { player_id: PlayerId },

    /// Another player joined the town.
    NewPlayer { player: PlayerSnapshot },

    /// Another player moved.
    PlayerMoved { player: PlayerSnapshot },

    /// A player left (voluntarily, banned, or swept by an empty-town).
    PlayerDisconnect { player: PlayerSnapshot },

    /// A player's privileges changed.
    PlayerUpdated { player: PlayerSnapshot },

    /// A non-admin asked to be promoted. Only an admin can act on it.
    PlayerAskedToBecomeAdmin { player: PlayerSnapshot },

    /// The server ended this session. The socket closes right after.
    Disconnect { reason: DisconnectReason },

    /// Something the client sent could not be processed.
    /// `code` follows HTTP conventions (400, 403, 404, ...).
    Error { code: u16, message: String },
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Wrapper around every socket frame.
///
/// `seq` is maintained per connection and per direction. `timestamp` is
/// milliseconds since the sender's connection started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub seq: u64,
    #[serde(default)]
    pub timestamp: u64,
    pub payload: T,
}

impl<T> Envelope<T> {
    pub fn new(seq: u64, timestamp: u64, payload: T) -> Self {
        Self {
            seq,
            timestamp,
            payload,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The client parses these JSON shapes directly, so the serde
    //! attributes are checked field by field.

    use super::*;

    fn snapshot() -> PlayerSnapshot {
        PlayerSnapshot {
            id: PlayerId(3),
            user_name: "ada".into(),
            location: Location::at(10.0, 20.0),
            privileges: Privileges::default(),
        }
    }

    // =====================================================================
    // Identity types
    // =====================================================================

    #[test]
    fn test_player_id_serializes_as_plain_number() {
        assert_eq!(serde_json::to_string(&PlayerId(42)).unwrap(), "42");
        let pid: PlayerId = serde_json::from_str("42").unwrap();
        assert_eq!(pid, PlayerId(42));
    }

    #[test]
    fn test_ids_display() {
        assert_eq!(PlayerId(7).to_string(), "P-7");
        assert_eq!(TownId(3).to_string(), "T-3");
    }

    // =====================================================================
    // Location / Privileges
    // =====================================================================

    #[test]
    fn test_location_distance_is_euclidean() {
        let a = Location::at(0.0, 0.0);
        let b = Location::at(30.0, 40.0);
        assert_eq!(a.distance_to(&b), 50.0);
        assert_eq!(b.distance_to(&a), 50.0);
    }

    #[test]
    fn test_location_rotation_serializes_lowercase() {
        let loc = Location {
            x: 1.0,
            y: 2.0,
            rotation: Direction::Left,
            moving: true,
        };
        let json = serde_json::to_value(loc).unwrap();
        assert_eq!(json["rotation"], "left");
        assert_eq!(json["moving"], true);
    }

    #[test]
    fn test_location_missing_rotation_defaults_to_front() {
        let loc: Location = serde_json::from_str(r#"{"x": 5, "y": 6}"#).unwrap();
        assert_eq!(loc.rotation, Direction::Front);
        assert!(!loc.moving);
    }

    #[test]
    fn test_privileges_default_everything_but_admin() {
        let p = Privileges::default();
        assert!(p.audio && p.video && p.chat);
        assert!(!p.admin);
    }

    #[test]
    fn test_privilege_update_omits_absent_fields() {
        let update = PrivilegeUpdate {
            video: Some(false),
            ..PrivilegeUpdate::default()
        };
        let json = serde_json::to_value(update).unwrap();
        assert_eq!(json, serde_json::json!({ "video": false }));

        let parsed: PrivilegeUpdate = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed, PrivilegeUpdate::default());
    }

    // =====================================================================
    // Socket messages
    // =====================================================================

    #[test]
    fn test_client_subscribe_json_format() {
        let msg = ClientMessage::Subscribe {
            town_id: TownId(9),
            session_token: "abc".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "Subscribe");
        assert_eq!(json["town_id"], 9);
        assert_eq!(json["session_token"], "abc");
    }

    #[test]
    fn test_client_movement_parses_from_client_json() {
        let raw = r#"{"type":"PlayerMovement","location":{"x":1.5,"y":2,"rotation":"back","moving":true}}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(
            msg,
            ClientMessage::PlayerMovement {
                location: Location {
                    x: 1.5,
                    y: 2.0,
                    rotation: Direction::Back,
                    moving: true,
                }
            }
        );
    }

    #[test]
    fn test_server_event_player_moved_json_format() {
        let json = serde_json::to_value(ServerEvent::PlayerMoved {
            player: snapshot(),
        })
        .unwrap();
        assert_eq!(json["type"], "PlayerMoved");
        assert_eq!(json["player"]["id"], 3);
        assert_eq!(json["player"]["user_name"], "ada");
        assert_eq!(json["player"]["privileges"]["admin"], false);
    }

    #[test]
    fn test_server_event_disconnect_reason_snake_case() {
        let json = serde_json::to_value(ServerEvent::Disconnect {
            reason: DisconnectReason::RemovedByAdmin,
        })
        .unwrap();
        assert_eq!(json["type"], "Disconnect");
        assert_eq!(json["reason"], "removed_by_admin");
    }

    #[test]
    fn test_disconnect_reason_display() {
        assert_eq!(DisconnectReason::TownDestroyed.to_string(), "town destroyed");
    }

    #[test]
    fn test_unknown_client_message_type_is_rejected() {
        let result: Result<ClientMessage, _> =
            serde_json::from_str(r#"{"type":"Teleport","x":1}"#);
        assert!(result.is_err());
    }

    // =====================================================================
    // Envelope
    // =====================================================================

    #[test]
    fn test_envelope_wraps_payload_and_defaults_timestamp() {
        let raw = r#"{"seq": 4, "payload": {"type": "Disconnect"}}"#;
        let env: Envelope<ClientMessage> = serde_json::from_str(raw).unwrap();
        assert_eq!(env.seq, 4);
        assert_eq!(env.timestamp, 0);
        assert_eq!(env.payload, ClientMessage::Disconnect);
    }
}
