//! Per-town session table.
//!
//! Every town controller owns exactly one `SessionTable`. Because the
//! table lives inside the town, a token issued by one town simply does
//! not exist in any other town's table: "valid only for the town it was
//! issued for" falls out of ownership rather than a check.
//!
//! # Concurrency note
//!
//! `SessionTable` is a plain pair of `HashMap`s with no locking. It is
//! only ever touched from the town's actor task, which already
//! serializes every mutation for that town.

use std::collections::HashMap;

use plaza_protocol::{PlayerId, TownId};
use plaza_transport::ConnectionId;

use crate::{Session, SessionError, generate_token};

/// Sessions of a single town.
///
/// ```text
/// issue() ──→ bind(connection) ──→ remove()
///    │                                ▲
///    └────────────────────────────────┘  (client never subscribed)
/// ```
#[derive(Debug)]
pub struct SessionTable {
    town_id: TownId,

    /// Sessions keyed by player. One session per player.
    sessions: HashMap<PlayerId, Session>,

    /// Index from token to player, kept in sync with `sessions`.
    tokens: HashMap<String, PlayerId>,
}

impl SessionTable {
    /// Creates an empty table for `town_id`.
    pub fn new(town_id: TownId) -> Self {
        Self {
            town_id,
            sessions: HashMap::new(),
            tokens: HashMap::new(),
        }
    }

    /// Issues a fresh session for a player that was just admitted.
    ///
    /// If the player somehow already had a session, it is replaced and
    /// its old token stops resolving.
    pub fn issue(&mut self, player_id: PlayerId) -> &Session {
        if let Some(old) = self.sessions.remove(&player_id) {
            self.tokens.remove(&old.token);
        }

        let token = generate_token();
        self.tokens.insert(token.clone(), player_id);
        tracing::debug!(town_id = %self.town_id, %player_id, "session issued");

        self.sessions.entry(player_id).or_insert(Session {
            token,
            player_id,
            town_id: self.town_id,
            connection: None,
        })
    }

    /// Resolves a bearer token to the player it controls.
    ///
    /// # Errors
    /// [`SessionError::InvalidToken`] if this town never issued the token
    /// or its session has ended.
    pub fn resolve(&self, token: &str) -> Result<PlayerId, SessionError> {
        self.tokens
            .get(token)
            .copied()
            .ok_or(SessionError::InvalidToken)
    }

    /// Binds a session to the socket that presented its token.
    ///
    /// Re-binding the same connection is a no-op.
    ///
    /// # Errors
    /// - [`SessionError::InvalidToken`]: token not known here
    /// - [`SessionError::AlreadyBound`]: another socket holds the session
    pub fn bind(
        &mut self,
        token: &str,
        connection: ConnectionId,
    ) -> Result<PlayerId, SessionError> {
        let player_id = self.resolve(token)?;
        let session = self
            .sessions
            .get_mut(&player_id)
            .ok_or(SessionError::InvalidToken)?;

        match session.connection {
            Some(existing) if existing != connection => {
                Err(SessionError::AlreadyBound(player_id))
            }
            _ => {
                session.connection = Some(connection);
                Ok(player_id)
            }
        }
    }

    /// Ends a player's session. Returns it if there was one.
    ///
    /// Removing an already-removed player returns `None`; disconnects are
    /// idempotent.
    pub fn remove(&mut self, player_id: PlayerId) -> Option<Session> {
        let session = self.sessions.remove(&player_id)?;
        self.tokens.remove(&session.token);
        Some(session)
    }

    /// Ends every session in the town.
    pub fn drain(&mut self) -> Vec<Session> {
        self.tokens.clear();
        self.sessions.drain().map(|(_, s)| s).collect()
    }

    /// Looks up a session by player.
    pub fn get(&self, player_id: &PlayerId) -> Option<&Session> {
        self.sessions.get(player_id)
    }

    /// Number of live sessions (the town's occupancy).
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SessionTable {
        SessionTable::new(TownId(1))
    }

    fn pid(id: u64) -> PlayerId {
        PlayerId(id)
    }

    fn conn(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    // =====================================================================
    // issue()
    // =====================================================================

    #[test]
    fn test_issue_new_player_returns_unbound_session() {
        let mut t = table();

        let session = t.issue(pid(1));

        assert_eq!(session.player_id, pid(1));
        assert_eq!(session.town_id, TownId(1));
        assert_eq!(session.token.len(), 32);
        assert!(session.connection.is_none());
    }

    #[test]
    fn test_issue_each_player_gets_unique_token() {
        let mut t = table();
        let t1 = t.issue(pid(1)).token.clone();
        let t2 = t.issue(pid(2)).token.clone();

        assert_ne!(t1, t2);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn test_issue_twice_invalidates_previous_token() {
        let mut t = table();
        let old = t.issue(pid(1)).token.clone();
        let new = t.issue(pid(1)).token.clone();

        assert!(matches!(t.resolve(&old), Err(SessionError::InvalidToken)));
        assert_eq!(t.resolve(&new).unwrap(), pid(1));
        assert_eq!(t.len(), 1);
    }

    // =====================================================================
    // resolve()
    // =====================================================================

    #[test]
    fn test_resolve_token_from_other_town_is_invalid() {
        let mut here = table();
        let mut elsewhere = SessionTable::new(TownId(2));
        let foreign = elsewhere.issue(pid(9)).token.clone();
        here.issue(pid(1));

        assert!(matches!(here.resolve(&foreign), Err(SessionError::InvalidToken)));
    }

    // =====================================================================
    // bind()
    // =====================================================================

    #[test]
    fn test_bind_first_connection_succeeds() {
        let mut t = table();
        let token = t.issue(pid(1)).token.clone();

        assert_eq!(t.bind(&token, conn(10)).unwrap(), pid(1));
        assert_eq!(t.get(&pid(1)).unwrap().connection, Some(conn(10)));
    }

    #[test]
    fn test_bind_same_connection_twice_is_noop() {
        let mut t = table();
        let token = t.issue(pid(1)).token.clone();
        t.bind(&token, conn(10)).unwrap();

        assert_eq!(t.bind(&token, conn(10)).unwrap(), pid(1));
    }

    #[test]
    fn test_bind_second_connection_is_rejected() {
        let mut t = table();
        let token = t.issue(pid(1)).token.clone();
        t.bind(&token, conn(10)).unwrap();

        let result = t.bind(&token, conn(11));

        assert!(matches!(result, Err(SessionError::AlreadyBound(p)) if p == pid(1)));
        assert_eq!(t.get(&pid(1)).unwrap().connection, Some(conn(10)));
    }

    #[test]
    fn test_bind_unknown_token_is_invalid() {
        let mut t = table();
        assert!(matches!(t.bind("nope", conn(1)), Err(SessionError::InvalidToken)));
    }

    // =====================================================================
    // remove() / drain()
    // =====================================================================

    #[test]
    fn test_remove_invalidates_token_and_is_idempotent() {
        let mut t = table();
        let token = t.issue(pid(1)).token.clone();

        assert!(t.remove(pid(1)).is_some());
        assert!(t.remove(pid(1)).is_none());
        assert!(matches!(t.resolve(&token), Err(SessionError::InvalidToken)));
        assert!(t.is_empty());
    }

    #[test]
    fn test_remove_leaves_other_sessions_alone() {
        let mut t = table();
        t.issue(pid(1));
        let keep = t.issue(pid(2)).token.clone();

        t.remove(pid(1));

        assert_eq!(t.resolve(&keep).unwrap(), pid(2));
    }

    #[test]
    fn test_drain_returns_all_and_empties_table() {
        let mut t = table();
        let token = t.issue(pid(1)).token.clone();
        t.issue(pid(2));

        let mut drained: Vec<PlayerId> = t.drain().into_iter().map(|s| s.player_id).collect();
        drained.sort();

        assert_eq!(drained, vec![pid(1), pid(2)]);
        assert!(t.is_empty());
        assert!(t.resolve(&token).is_err());
    }
}
