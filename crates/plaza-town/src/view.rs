//! Client-side view of a town, as a pure reducer.
//!
//! A client folds every [`ServerEvent`] it receives, plus its own
//! movements, into a [`TownView`]. The reducer is deterministic: replaying
//! the same updates from the same starting view always yields the same
//! view, which is what the tests rely on.
//!
//! ```rust
//! use plaza_protocol::Location;
//! use plaza_town::{TownView, ViewUpdate};
//!
//! // Moving before the join call completes changes nothing.
//! let view = TownView::default().apply(ViewUpdate::WeMoved(Location::at(1.0, 1.0)));
//! assert!(!view.is_connected());
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use plaza_protocol::rest::TownJoinResponse;
use plaza_protocol::{Location, PlayerId, PlayerSnapshot, ServerEvent};

use crate::NearbySet;

/// Inputs to [`TownView::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum ViewUpdate {
    /// The join call succeeded.
    Connected(TownJoinResponse),
    /// An event arrived on the town socket.
    Server(ServerEvent),
    /// We moved our own avatar (the server never echoes this back).
    WeMoved(Location),
}

/// Everything a client knows about the town it is in.
#[derive(Debug, Clone, Default)]
pub struct TownView {
    me: Option<PlayerId>,
    friendly_name: String,
    is_public: bool,
    capacity: usize,
    session_token: Option<String>,
    players: BTreeMap<PlayerId, PlayerSnapshot>,
    nearby: Arc<NearbySet>,
    /// Players waiting for an admin to act on their request.
    admin_requests: Vec<PlayerSnapshot>,
}

impl TownView {
    /// Folds one update into the view.
    pub fn apply(mut self, update: ViewUpdate) -> TownView {
        match update {
            ViewUpdate::Connected(join) => {
                let nearby = self.nearby;
                self = TownView {
                    me: Some(join.user_id),
                    friendly_name: join.friendly_name,
                    is_public: join.is_publicly_listed,
                    capacity: join.capacity,
                    session_token: Some(join.session_token),
                    players: join
                        .current_players
                        .into_iter()
                        .map(|p| (p.id, p))
                        .collect(),
                    nearby,
                    admin_requests: Vec::new(),
                };
            }
            ViewUpdate::WeMoved(location) => {
                let Some(me) = self.me else {
                    return self;
                };
                if let Some(player) = self.players.get_mut(&me) {
                    player.location = location;
                }
            }
            ViewUpdate::Server(event) => match event {
                ServerEvent::NewPlayer { player }
                | ServerEvent::PlayerMoved { player } => {
                    self.players.insert(player.id, player);
                }
                ServerEvent::PlayerUpdated { player } => {
                    if player.privileges.admin {
                        self.admin_requests.retain(|r| r.id != player.id);
                    }
                    self.players.insert(player.id, player);
                }
                ServerEvent::PlayerDisconnect { player } => {
                    self.players.remove(&player.id);
                    self.admin_requests.retain(|r| r.id != player.id);
                }
                ServerEvent::PlayerAskedToBecomeAdmin { player } => {
                    if !self.admin_requests.iter().any(|r| r.id == player.id) {
                        self.admin_requests.push(player);
                    }
                    return self;
                }
                ServerEvent::Disconnect { .. } => return TownView::default(),
                ServerEvent::Subscribed { .. } | ServerEvent::Error { .. } => {
                    return self;
                }
            },
        }

        self.recompute_nearby();
        self
    }

    fn recompute_nearby(&mut self) {
        let Some(reference) = self.my_player().map(|p| p.location) else {
            return;
        };
        let me = self.me;
        let others = self.players.values().filter(|p| Some(p.id) != me);
        self.nearby = NearbySet::refresh(&self.nearby, others, &reference);
    }

    /// Our own player id, once connected.
    pub fn me(&self) -> Option<PlayerId> {
        self.me
    }

    pub fn my_player(&self) -> Option<&PlayerSnapshot> {
        self.me.and_then(|id| self.players.get(&id))
    }

    pub fn is_connected(&self) -> bool {
        self.me.is_some()
    }

    pub fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    pub fn is_public(&self) -> bool {
        self.is_public
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    /// Everyone in the town, ourselves included, by id.
    pub fn players(&self) -> impl Iterator<Item = &PlayerSnapshot> {
        self.players.values()
    }

    pub fn player(&self, id: PlayerId) -> Option<&PlayerSnapshot> {
        self.players.get(&id)
    }

    /// The other players close enough to talk to. Unchanged membership
    /// keeps the same `Arc` across updates.
    pub fn nearby(&self) -> &Arc<NearbySet> {
        &self.nearby
    }

    pub fn admin_requests(&self) -> &[PlayerSnapshot] {
        &self.admin_requests
    }
}
