//! Request/response contracts for the request-style (REST) surface.
//!
//! Routing and HTTP plumbing live outside Plaza. These structs are the
//! bodies an HTTP layer would accept and return; the service facade in
//! the `plaza` crate consumes and produces them directly.

use serde::{Deserialize, Serialize};

use crate::{PlayerId, PlayerSnapshot, PrivilegeUpdate, TownId};

// ---------------------------------------------------------------------------
// Towns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TownCreateRequest {
    pub friendly_name: String,
    pub is_publicly_listed: bool,
    /// Omitted → server default.
    #[serde(default)]
    pub capacity: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TownCreateResponse {
    pub town_id: TownId,
    /// The capability to update or delete this town. Shown to the creator
    /// once; the server never lists it again.
    pub town_password: String,
}

/// One row of the public town listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TownListEntry {
    pub town_id: TownId,
    pub friendly_name: String,
    pub current_occupancy: usize,
    pub maximum_occupancy: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TownListResponse {
    pub towns: Vec<TownListEntry>,
}

/// Absent fields are left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TownUpdateRequest {
    pub town_id: TownId,
    pub town_password: String,
    #[serde(default)]
    pub friendly_name: Option<String>,
    #[serde(default)]
    pub is_publicly_listed: Option<bool>,
    #[serde(default)]
    pub capacity: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TownDeleteRequest {
    pub town_id: TownId,
    pub town_password: String,
}

// ---------------------------------------------------------------------------
// Joining
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TownJoinRequest {
    pub user_name: String,
    pub town_id: TownId,
}

/// Everything a client needs to enter a town without a second round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TownJoinResponse {
    pub user_id: PlayerId,
    /// Presented in the socket `Subscribe` message.
    pub session_token: String,
    /// Opaque; handed to the video provider.
    pub video_token: String,
    /// Opaque; handed to the chat provider.
    pub chat_token: String,
    /// Full roster, including the joining player.
    pub current_players: Vec<PlayerSnapshot>,
    pub friendly_name: String,
    pub is_publicly_listed: bool,
    pub capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TownParticipantsResponse {
    pub participants: Vec<PlayerSnapshot>,
}

// ---------------------------------------------------------------------------
// Moderation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerUpdateRequest {
    pub town_id: TownId,
    pub town_password: String,
    /// The acting player; must currently be an admin.
    pub user_id: PlayerId,
    /// The player whose privileges change.
    pub player_id: PlayerId,
    #[serde(flatten)]
    pub privileges: PrivilegeUpdate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanPlayerRequest {
    pub town_id: TownId,
    pub town_password: String,
    pub user_id: PlayerId,
    pub player_id: PlayerId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyTownRequest {
    pub town_id: TownId,
    pub town_password: String,
    pub user_id: PlayerId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskToBecomeAdminRequest {
    pub town_id: TownId,
    pub user_id: PlayerId,
}

// ---------------------------------------------------------------------------
// Accounts / chat
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRequest {
    pub user_name: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountResponse {
    pub user_id: String,
    pub user_name: String,
    pub auth_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTokenResponse {
    pub token: String,
}

// ---------------------------------------------------------------------------
// ResponseEnvelope
// ---------------------------------------------------------------------------

/// Uniform wrapper for every response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope<T> {
    pub is_ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<T>,
}

impl<T> ResponseEnvelope<T> {
    pub fn ok(response: T) -> Self {
        Self {
            is_ok: true,
            message: None,
            response: Some(response),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            is_ok: false,
            message: Some(message.into()),
            response: None,
        }
    }
}

impl<T, E: std::fmt::Display> From<Result<T, E>> for ResponseEnvelope<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(response) => Self::ok(response),
            Err(e) => Self::err(e.to_string()),
        }
    }
}
