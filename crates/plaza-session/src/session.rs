//! The session record and its token.
//!
//! A session ties together:
//! - WHO the client controls (`PlayerId`)
//! - WHERE that player lives (`TownId`)
//! - HOW the client proves it (the bearer token)
//! - WHICH socket currently carries it (`ConnectionId`, once subscribed)
//!
//! Sessions are never persisted and never reused: leaving a town ends
//! the session, and rejoining issues a new player and a new token.

use plaza_protocol::{PlayerId, TownId};
use plaza_transport::ConnectionId;
use rand::Rng;

/// One client's session inside one town.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// The bearer token. 32 lowercase hex characters (128 random bits).
    ///
    /// The token carries no claims. Whoever presents it is resolved to
    /// the live player record at that moment, so privilege changes apply
    /// to the next action without re-issuing anything.
    pub token: String,

    /// The player this session controls.
    pub player_id: PlayerId,

    /// The town that issued the token. The token is meaningless anywhere
    /// else.
    pub town_id: TownId,

    /// The socket bound to this session, if the client has subscribed.
    pub connection: Option<ConnectionId>,
}

/// Generates a random 32-character hex string (128 bits of entropy).
///
/// Used for session tokens, town update passwords, and account ids.
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
