//! Town controller: an isolated Tokio task that owns one town.
//!
//! Each town runs in its own task and talks to the outside world only
//! through an mpsc channel. Every read-modify-write of the roster, the
//! ban list, or a player's flags happens inside that task, one command
//! at a time, so no two operations on the same town can interleave.
//! Different towns are different tasks and run fully in parallel.
//!
//! # Event delivery
//!
//! Each player gets an unbounded outbound channel at join time. The actor
//! pushes [`ServerEvent`]s into those channels in the order it applies
//! operations, so every receiver observes the same order. The receiving
//! half is parked until the client subscribes its socket; events produced
//! in between are buffered, not lost.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use plaza_protocol::{
    DisconnectReason, Location, PlayerId, PlayerSnapshot, PrivilegeUpdate,
    ServerEvent, TownId,
};
use plaza_session::{SessionError, SessionTable};
use plaza_transport::ConnectionId;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

use crate::{NearbySet, Player, TownConfig, TownError, TownInfo, TownUpdate};

/// Counter for generating process-unique player ids.
static NEXT_PLAYER_ID: AtomicU64 = AtomicU64::new(1);

/// Sending half of a player's or observer's event channel.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Receiving half of a player's or observer's event channel.
pub type EventReceiver = mpsc::UnboundedReceiver<ServerEvent>;

/// Identifies an observer registration within one town.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obs-{}", self.0)
    }
}

/// A non-player listener attached to a town.
///
/// Receives every town-wide broadcast (joins, moves, departures,
/// privilege changes, admin requests) and the final `Disconnect` when
/// the town is deleted. Any number of observers can coexist.
#[derive(Debug)]
pub struct Observer {
    pub id: ObserverId,
    pub events: EventReceiver,
}

/// A socket successfully bound to a session.
#[derive(Debug)]
pub struct Subscription {
    pub player_id: PlayerId,
    /// Every event for this player, starting right after its join.
    pub events: EventReceiver,
}

/// The result of a committed join, for the joining client only.
#[derive(Debug, Clone)]
pub struct Joined {
    pub player: PlayerSnapshot,
    pub session_token: String,
    /// Full roster, the new player included.
    pub roster: Vec<PlayerSnapshot>,
    pub info: TownInfo,
}

/// Commands sent to a town actor through its channel.
pub(crate) enum TownCommand {
    Reserve {
        user_name: String,
        reply: oneshot::Sender<Result<PlayerId, TownError>>,
    },
    Commit {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<Joined, TownError>>,
    },
    Abort {
        player_id: PlayerId,
    },
    Subscribe {
        token: String,
        connection: ConnectionId,
        reply: oneshot::Sender<Result<Subscription, TownError>>,
    },
    Move {
        player_id: PlayerId,
        location: Location,
    },
    Disconnect {
        player_id: PlayerId,
        reply: oneshot::Sender<()>,
    },
    UpdatePrivileges {
        acting: PlayerId,
        target: PlayerId,
        update: PrivilegeUpdate,
        reply: oneshot::Sender<bool>,
    },
    Ban {
        acting: PlayerId,
        target: PlayerId,
        reply: oneshot::Sender<bool>,
    },
    RequestAdmin {
        player_id: PlayerId,
        reply: oneshot::Sender<bool>,
    },
    Empty {
        acting: PlayerId,
        reply: oneshot::Sender<bool>,
    },
    Participants {
        reply: oneshot::Sender<Vec<PlayerSnapshot>>,
    },
    Nearby {
        player_id: PlayerId,
        reply: oneshot::Sender<Option<Arc<NearbySet>>>,
    },
    Info {
        reply: oneshot::Sender<TownInfo>,
    },
    SetConfig {
        update: TownUpdate,
        reply: oneshot::Sender<Result<TownInfo, TownError>>,
    },
    Observe {
        reply: oneshot::Sender<Observer>,
    },
    Unobserve {
        id: ObserverId,
    },
    Shutdown {
        reason: DisconnectReason,
        reply: oneshot::Sender<()>,
    },
}

// ---------------------------------------------------------------------------
// TownHandle
// ---------------------------------------------------------------------------

/// Handle to a running town actor.
///
/// Cheap to clone; it is just an `mpsc::Sender` wrapper. Every method
/// fails with [`TownError::Unavailable`] once the town has shut down.
#[derive(Clone)]
pub struct TownHandle {
    town_id: TownId,
    sender: mpsc::Sender<TownCommand>,
}

impl TownHandle {
    pub fn town_id(&self) -> TownId {
        self.town_id
    }

    /// First phase of a join: checks the ban list and capacity and holds
    /// a slot for `user_name`.
    ///
    /// The slot counts toward capacity until the returned reservation is
    /// committed or dropped.
    ///
    /// # Errors
    /// - [`TownError::Banned`] if `user_name` is on the ban list
    /// - [`TownError::Capacity`] if no slot is free
    pub async fn reserve(
        &self,
        user_name: impl Into<String>,
    ) -> Result<JoinReservation, TownError> {
        let user_name = user_name.into();
        let player_id = self
            .request(|reply| TownCommand::Reserve {
                user_name: user_name.clone(),
                reply,
            })
            .await??;
        Ok(JoinReservation {
            handle: self.clone(),
            player_id,
            user_name,
            committed: false,
        })
    }

    /// Reserves and immediately commits. For callers with no external
    /// tokens to fetch in between.
    pub async fn join(
        &self,
        user_name: impl Into<String>,
    ) -> Result<Joined, TownError> {
        self.reserve(user_name).await?.commit().await
    }

    /// Binds `connection` to the session behind `token` and hands over
    /// the player's event stream.
    ///
    /// # Errors
    /// [`TownError::Session`] if the token is unknown to this town or its
    /// session is already bound to a socket.
    pub async fn subscribe(
        &self,
        token: impl Into<String>,
        connection: ConnectionId,
    ) -> Result<Subscription, TownError> {
        let token = token.into();
        self.request(|reply| TownCommand::Subscribe {
            token,
            connection,
            reply,
        })
        .await?
    }

    /// Records a new location for `player_id` (fire-and-forget).
    ///
    /// No bounds or speed checks: movement is client-authoritative.
    pub async fn move_player(
        &self,
        player_id: PlayerId,
        location: Location,
    ) -> Result<(), TownError> {
        self.send(TownCommand::Move {
            player_id,
            location,
        })
        .await
    }

    /// Removes a player and its session. Idempotent.
    pub async fn disconnect(&self, player_id: PlayerId) -> Result<(), TownError> {
        self.request(|reply| TownCommand::Disconnect { player_id, reply })
            .await
    }

    /// Changes `target`'s flags. `Ok(false)` unless `acting` is an admin
    /// and `target` is in the town.
    pub async fn update_privileges(
        &self,
        acting: PlayerId,
        target: PlayerId,
        update: PrivilegeUpdate,
    ) -> Result<bool, TownError> {
        self.request(|reply| TownCommand::UpdatePrivileges {
            acting,
            target,
            update,
            reply,
        })
        .await
    }

    /// Bans `target`'s display name and removes the player.
    /// `Ok(false)` unless `acting` is an admin and `target` is present.
    pub async fn ban(
        &self,
        acting: PlayerId,
        target: PlayerId,
    ) -> Result<bool, TownError> {
        self.request(|reply| TownCommand::Ban {
            acting,
            target,
            reply,
        })
        .await
    }

    /// Announces that `player_id` would like to be promoted.
    /// `Ok(false)` if the player is unknown or already an admin.
    pub async fn request_admin(&self, player_id: PlayerId) -> Result<bool, TownError> {
        self.request(|reply| TownCommand::RequestAdmin { player_id, reply })
            .await
    }

    /// Removes every player but keeps the town.
    /// `Ok(false)` unless `acting` is an admin.
    pub async fn empty(&self, acting: PlayerId) -> Result<bool, TownError> {
        self.request(|reply| TownCommand::Empty { acting, reply })
            .await
    }

    /// Current roster, ordered by player id.
    pub async fn participants(&self) -> Result<Vec<PlayerSnapshot>, TownError> {
        self.request(|reply| TownCommand::Participants { reply })
            .await
    }

    /// The players currently nearby `player_id` (itself excluded), or
    /// `None` if the player is not in the town.
    ///
    /// Two calls return the same `Arc` as long as the set has not
    /// changed in between.
    pub async fn nearby_players(
        &self,
        player_id: PlayerId,
    ) -> Result<Option<Arc<NearbySet>>, TownError> {
        self.request(|reply| TownCommand::Nearby { player_id, reply })
            .await
    }

    pub async fn info(&self) -> Result<TownInfo, TownError> {
        self.request(|reply| TownCommand::Info { reply }).await
    }

    /// Applies a settings change. See [`TownConfig::apply`].
    pub async fn set_config(&self, update: TownUpdate) -> Result<TownInfo, TownError> {
        self.request(|reply| TownCommand::SetConfig { update, reply })
            .await?
    }

    /// Registers a new observer.
    pub async fn observe(&self) -> Result<Observer, TownError> {
        self.request(|reply| TownCommand::Observe { reply }).await
    }

    /// Drops an observer registration. Unknown ids are ignored.
    pub async fn unobserve(&self, id: ObserverId) -> Result<(), TownError> {
        self.send(TownCommand::Unobserve { id }).await
    }

    /// Disconnects everyone with `reason` and stops the actor.
    pub async fn shutdown(&self, reason: DisconnectReason) -> Result<(), TownError> {
        self.request(|reply| TownCommand::Shutdown { reason, reply })
            .await
    }

    async fn send(&self, cmd: TownCommand) -> Result<(), TownError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| TownError::Unavailable(self.town_id))
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> TownCommand,
    ) -> Result<T, TownError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(make(reply_tx)).await?;
        reply_rx
            .await
            .map_err(|_| TownError::Unavailable(self.town_id))
    }
}

// ---------------------------------------------------------------------------
// JoinReservation
// ---------------------------------------------------------------------------

/// A held slot in a town, between the admission checks and the actual
/// join.
///
/// The caller fetches external tokens while holding this, then calls
/// [`commit`](Self::commit). Dropping it uncommitted (provider failure,
/// early return, cancelled task) releases the slot; no player or session
/// is ever created for it.
pub struct JoinReservation {
    handle: TownHandle,
    player_id: PlayerId,
    user_name: String,
    committed: bool,
}

impl JoinReservation {
    /// The id the player will have once committed.
    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn town_id(&self) -> TownId {
        self.handle.town_id
    }

    /// Second phase: creates the player and its session, grants admin if
    /// the town is empty, and announces the newcomer to everyone else.
    ///
    /// # Errors
    /// - [`TownError::Banned`] if the name was banned after reserving
    /// - [`TownError::Unavailable`] if the town was deleted meanwhile
    pub async fn commit(mut self) -> Result<Joined, TownError> {
        let town_id = self.handle.town_id;
        let (reply_tx, reply_rx) = oneshot::channel();
        self.handle
            .sender
            .send(TownCommand::Commit {
                player_id: self.player_id,
                reply: reply_tx,
            })
            .await
            .map_err(|_| TownError::Unavailable(town_id))?;

        // The actor owns the reservation from here on.
        self.committed = true;

        reply_rx
            .await
            .map_err(|_| TownError::Unavailable(town_id))?
    }
}

impl Drop for JoinReservation {
    fn drop(&mut self) {
        if self.committed {
            return;
        }

        let cmd = TownCommand::Abort {
            player_id: self.player_id,
        };
        match self.handle.sender.try_send(cmd) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(cmd)) => {
                // Drop can't await. Hand the abort to the runtime instead.
                let sender = self.handle.sender.clone();
                if let Ok(rt) = tokio::runtime::Handle::try_current() {
                    rt.spawn(async move {
                        let _ = sender.send(cmd).await;
                    });
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TownActor
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum Audience {
    All,
    AllExcept(PlayerId),
}

/// The internal town state. Runs inside a Tokio task.
struct TownActor {
    town_id: TownId,
    config: TownConfig,

    /// The roster, keyed by player. Ordered so snapshots are stable.
    players: BTreeMap<PlayerId, Player>,

    /// Reserved but not yet committed joins, with their display names.
    pending: HashMap<PlayerId, String>,

    /// Display names barred from joining. Only ever grows.
    banned: HashSet<String>,

    sessions: SessionTable,

    /// Per-player outbound channels.
    outbound: HashMap<PlayerId, EventSender>,

    /// Receivers not yet claimed by a subscribing socket.
    unclaimed: HashMap<PlayerId, EventReceiver>,

    /// Each player's nearby set, itself excluded.
    nearby: HashMap<PlayerId, Arc<NearbySet>>,

    observers: HashMap<ObserverId, EventSender>,
    next_observer: u64,

    receiver: mpsc::Receiver<TownCommand>,
}

impl TownActor {
    /// Runs the actor loop, processing commands until shutdown.
    async fn run(mut self) {
        tracing::info!(town_id = %self.town_id, "town actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                TownCommand::Reserve { user_name, reply } => {
                    let _ = reply.send(self.handle_reserve(user_name));
                }
                TownCommand::Commit { player_id, reply } => {
                    self.handle_commit(player_id, reply);
                }
                TownCommand::Abort { player_id } => {
                    if self.pending.remove(&player_id).is_some() {
                        tracing::debug!(
                            town_id = %self.town_id,
                            %player_id,
                            "join reservation released"
                        );
                    }
                }
                TownCommand::Subscribe {
                    token,
                    connection,
                    reply,
                } => {
                    let _ = reply.send(self.handle_subscribe(&token, connection));
                }
                TownCommand::Move {
                    player_id,
                    location,
                } => {
                    self.handle_move(player_id, location);
                }
                TownCommand::Disconnect { player_id, reply } => {
                    self.handle_disconnect(player_id);
                    let _ = reply.send(());
                }
                TownCommand::UpdatePrivileges {
                    acting,
                    target,
                    update,
                    reply,
                } => {
                    let _ = reply.send(self.handle_update_privileges(acting, target, update));
                }
                TownCommand::Ban {
                    acting,
                    target,
                    reply,
                } => {
                    let _ = reply.send(self.handle_ban(acting, target));
                }
                TownCommand::RequestAdmin { player_id, reply } => {
                    let _ = reply.send(self.handle_request_admin(player_id));
                }
                TownCommand::Empty { acting, reply } => {
                    let _ = reply.send(self.handle_empty(acting));
                }
                TownCommand::Participants { reply } => {
                    let _ = reply.send(self.roster());
                }
                TownCommand::Nearby { player_id, reply } => {
                    let _ = reply.send(self.nearby.get(&player_id).cloned());
                }
                TownCommand::Info { reply } => {
                    let _ = reply.send(self.info());
                }
                TownCommand::SetConfig { update, reply } => {
                    let result = self.config.apply(update).map(|()| {
                        tracing::info!(
                            town_id = %self.town_id,
                            name = %self.config.friendly_name,
                            public = self.config.is_public,
                            capacity = self.config.capacity,
                            "town updated"
                        );
                        self.info()
                    });
                    let _ = reply.send(result);
                }
                TownCommand::Observe { reply } => {
                    let _ = reply.send(self.handle_observe());
                }
                TownCommand::Unobserve { id } => {
                    if self.observers.remove(&id).is_some() {
                        tracing::debug!(town_id = %self.town_id, observer = %id, "observer removed");
                    }
                }
                TownCommand::Shutdown { reason, reply } => {
                    self.handle_shutdown(reason);
                    let _ = reply.send(());
                    break;
                }
            }
        }

        tracing::info!(town_id = %self.town_id, "town actor stopped");
    }

    fn handle_reserve(&mut self, user_name: String) -> Result<PlayerId, TownError> {
        if self.banned.contains(&user_name) {
            tracing::warn!(town_id = %self.town_id, %user_name, "banned name tried to join");
            return Err(TownError::Banned(user_name));
        }
        if self.players.len() + self.pending.len() >= self.config.capacity {
            tracing::warn!(
                town_id = %self.town_id,
                capacity = self.config.capacity,
                "join rejected, town full"
            );
            return Err(TownError::Capacity(self.town_id));
        }

        let player_id = PlayerId(NEXT_PLAYER_ID.fetch_add(1, Ordering::Relaxed));
        self.pending.insert(player_id, user_name);
        tracing::debug!(town_id = %self.town_id, %player_id, "join reserved");
        Ok(player_id)
    }

    fn handle_commit(
        &mut self,
        player_id: PlayerId,
        reply: oneshot::Sender<Result<Joined, TownError>>,
    ) {
        let Some(user_name) = self.pending.remove(&player_id) else {
            let _ = reply.send(Err(TownError::NotInTown(player_id, self.town_id)));
            return;
        };
        if self.banned.contains(&user_name) {
            let _ = reply.send(Err(TownError::Banned(user_name)));
            return;
        }

        let mut player = Player::new(player_id, user_name);
        player.privileges.admin = self.players.is_empty();
        let snapshot = player.snapshot();
        self.players.insert(player_id, player);

        let session_token = self.sessions.issue(player_id).token.clone();
        let (tx, rx) = mpsc::unbounded_channel();
        self.outbound.insert(player_id, tx);
        self.unclaimed.insert(player_id, rx);

        let joined = Joined {
            player: snapshot.clone(),
            session_token,
            roster: self.roster(),
            info: self.info(),
        };
        if reply.send(Ok(joined)).is_err() {
            // The joiner never saw its token, so nobody can drive this
            // player. Undo before anyone hears about it.
            self.forget(player_id);
            tracing::debug!(town_id = %self.town_id, %player_id, "join abandoned at commit");
            return;
        }

        tracing::info!(
            town_id = %self.town_id,
            %player_id,
            user_name = %snapshot.user_name,
            admin = snapshot.privileges.admin,
            players = self.players.len(),
            "player joined"
        );
        self.dispatch(
            Audience::AllExcept(player_id),
            ServerEvent::NewPlayer { player: snapshot },
        );
        self.refresh_nearby();
    }

    fn handle_subscribe(
        &mut self,
        token: &str,
        connection: ConnectionId,
    ) -> Result<Subscription, TownError> {
        let player_id = self.sessions.bind(token, connection)?;
        let events = self
            .unclaimed
            .remove(&player_id)
            .ok_or(SessionError::AlreadyBound(player_id))?;

        tracing::info!(
            town_id = %self.town_id,
            %player_id,
            conn_id = %connection,
            "player subscribed"
        );
        Ok(Subscription { player_id, events })
    }

    fn handle_move(&mut self, player_id: PlayerId, location: Location) {
        let Some(player) = self.players.get_mut(&player_id) else {
            tracing::warn!(
                town_id = %self.town_id,
                %player_id,
                "movement from non-member, ignoring"
            );
            return;
        };
        player.location = location;
        let snapshot = player.snapshot();

        tracing::debug!(
            town_id = %self.town_id,
            %player_id,
            x = location.x,
            y = location.y,
            "player moved"
        );
        self.dispatch(
            Audience::AllExcept(player_id),
            ServerEvent::PlayerMoved { player: snapshot },
        );
        self.refresh_nearby();
    }

    fn handle_disconnect(&mut self, player_id: PlayerId) {
        let Some(player) = self.forget(player_id) else {
            return;
        };
        tracing::info!(
            town_id = %self.town_id,
            %player_id,
            players = self.players.len(),
            "player left"
        );
        self.dispatch(
            Audience::All,
            ServerEvent::PlayerDisconnect {
                player: player.snapshot(),
            },
        );
        self.refresh_nearby();
    }

    fn handle_update_privileges(
        &mut self,
        acting: PlayerId,
        target: PlayerId,
        update: PrivilegeUpdate,
    ) -> bool {
        if !self.is_admin(acting) {
            tracing::warn!(town_id = %self.town_id, %acting, %target, "privilege update denied");
            return false;
        }
        let Some(player) = self.players.get_mut(&target) else {
            return false;
        };
        player.apply_privileges(update);
        let snapshot = player.snapshot();

        tracing::info!(
            town_id = %self.town_id,
            %acting,
            %target,
            privileges = ?snapshot.privileges,
            "privileges updated"
        );
        self.dispatch(Audience::All, ServerEvent::PlayerUpdated { player: snapshot });
        true
    }

    fn handle_ban(&mut self, acting: PlayerId, target: PlayerId) -> bool {
        if !self.is_admin(acting) {
            tracing::warn!(town_id = %self.town_id, %acting, %target, "ban denied");
            return false;
        }
        let Some(user_name) = self.players.get(&target).map(|p| p.user_name.clone()) else {
            return false;
        };

        self.send_to(
            target,
            ServerEvent::Disconnect {
                reason: DisconnectReason::RemovedByAdmin,
            },
        );
        self.banned.insert(user_name.clone());

        if let Some(player) = self.forget(target) {
            tracing::info!(
                town_id = %self.town_id,
                %acting,
                %target,
                %user_name,
                "player banned"
            );
            self.dispatch(
                Audience::All,
                ServerEvent::PlayerDisconnect {
                    player: player.snapshot(),
                },
            );
        }
        self.refresh_nearby();
        true
    }

    fn handle_request_admin(&mut self, player_id: PlayerId) -> bool {
        let snapshot = match self.players.get(&player_id) {
            Some(p) if !p.is_admin() => p.snapshot(),
            _ => return false,
        };
        tracing::info!(town_id = %self.town_id, %player_id, "player asked to become admin");
        self.dispatch(
            Audience::All,
            ServerEvent::PlayerAskedToBecomeAdmin { player: snapshot },
        );
        true
    }

    fn handle_empty(&mut self, acting: PlayerId) -> bool {
        if !self.is_admin(acting) {
            tracing::warn!(town_id = %self.town_id, %acting, "empty town denied");
            return false;
        }

        let ids: Vec<PlayerId> = self.players.keys().copied().collect();
        for player_id in &ids {
            self.send_to(
                *player_id,
                ServerEvent::Disconnect {
                    reason: DisconnectReason::TownEmptied,
                },
            );
        }
        for player_id in ids {
            if let Some(player) = self.forget(player_id) {
                // Players are all gone; only observers are left to tell.
                self.notify_observers(&ServerEvent::PlayerDisconnect {
                    player: player.snapshot(),
                });
            }
        }

        tracing::info!(town_id = %self.town_id, %acting, "town emptied");
        true
    }

    fn handle_observe(&mut self) -> Observer {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.insert(id, tx);
        tracing::debug!(town_id = %self.town_id, observer = %id, "observer added");
        Observer { id, events: rx }
    }

    fn handle_shutdown(&mut self, reason: DisconnectReason) {
        tracing::info!(town_id = %self.town_id, %reason, "town shutting down");
        let event = ServerEvent::Disconnect { reason };
        for tx in self.outbound.values() {
            let _ = tx.send(event.clone());
        }
        self.notify_observers(&event);

        self.sessions.drain();
        self.players.clear();
        self.pending.clear();
        self.outbound.clear();
        self.unclaimed.clear();
        self.nearby.clear();
        self.observers.clear();
    }

    /// Removes every trace of a player. Returns the player if it was here.
    fn forget(&mut self, player_id: PlayerId) -> Option<Player> {
        let player = self.players.remove(&player_id)?;
        self.sessions.remove(player_id);
        self.outbound.remove(&player_id);
        self.unclaimed.remove(&player_id);
        self.nearby.remove(&player_id);
        Some(player)
    }

    /// Recomputes every player's nearby set, keeping the previous `Arc`
    /// wherever the membership did not change.
    fn refresh_nearby(&mut self) {
        for player in self.players.values() {
            let previous = self
                .nearby
                .get(&player.id)
                .cloned()
                .unwrap_or_else(NearbySet::empty);
            let others = self.players.values().filter(|p| p.id != player.id);
            let next = NearbySet::refresh(&previous, others, &player.location);

            if !Arc::ptr_eq(&previous, &next) {
                tracing::debug!(
                    town_id = %self.town_id,
                    player_id = %player.id,
                    nearby = ?next.ids(),
                    "nearby set changed"
                );
            }
            self.nearby.insert(player.id, next);
        }
    }

    /// Sends a town-wide event to players and observers.
    fn dispatch(&mut self, audience: Audience, event: ServerEvent) {
        for (player_id, tx) in &self.outbound {
            if let Audience::AllExcept(excluded) = audience {
                if *player_id == excluded {
                    continue;
                }
            }
            let _ = tx.send(event.clone());
        }
        self.notify_observers(&event);
    }

    /// Sends an event to a single player. Silently drops it if the
    /// receiver is gone.
    fn send_to(&self, player_id: PlayerId, event: ServerEvent) {
        if let Some(tx) = self.outbound.get(&player_id) {
            let _ = tx.send(event);
        }
    }

    /// Delivers to every observer, forgetting the ones that hung up.
    fn notify_observers(&mut self, event: &ServerEvent) {
        self.observers.retain(|_, tx| tx.send(event.clone()).is_ok());
    }

    fn is_admin(&self, player_id: PlayerId) -> bool {
        self.players.get(&player_id).is_some_and(Player::is_admin)
    }

    fn roster(&self) -> Vec<PlayerSnapshot> {
        self.players.values().map(Player::snapshot).collect()
    }

    fn info(&self) -> TownInfo {
        TownInfo {
            town_id: self.town_id,
            friendly_name: self.config.friendly_name.clone(),
            is_public: self.config.is_public,
            occupancy: self.players.len(),
            capacity: self.config.capacity,
        }
    }
}

/// Spawns a new town actor task and returns a handle to it.
///
/// `channel_size` bounds the command queue; when it fills up, callers
/// wait.
pub(crate) fn spawn_town(
    town_id: TownId,
    config: TownConfig,
    channel_size: usize,
) -> TownHandle {
    let (tx, rx) = mpsc::channel(channel_size);

    let actor = TownActor {
        town_id,
        config,
        players: BTreeMap::new(),
        pending: HashMap::new(),
        banned: HashSet::new(),
        sessions: SessionTable::new(town_id),
        outbound: HashMap::new(),
        unclaimed: HashMap::new(),
        nearby: HashMap::new(),
        observers: HashMap::new(),
        next_observer: 1,
        receiver: rx,
    };

    tokio::spawn(actor.run());

    TownHandle {
        town_id,
        sender: tx,
    }
}
