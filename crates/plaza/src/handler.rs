//! Per-connection handler: subscribe handshake, then event routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive `Subscribe` → find the town, bind the session
//!   2. Send `Subscribed` → the socket now carries the player
//!   3. Loop: forward the client's movements to the town, and the town's
//!      events to the client, until either side hangs up
//!
//! A player standing still sends nothing, so liveness is not tied to
//! movement. The handler pings the socket every third of the idle timeout;
//! any frame back, pongs included, keeps the player in town. Only a socket
//! that stays completely silent for the whole timeout is dropped.

use std::sync::Arc;
use std::time::{Duration, Instant};

use plaza_protocol::{
    ClientMessage, Codec, Envelope, PlayerId, ProtocolError, ServerEvent, TownId,
};
use plaza_town::{Subscription, TownError, TownHandle};
use plaza_transport::{Connection, TransportError};

use crate::PlazaError;
use crate::server::ServerState;

/// Drop guard that removes the player from its town when the handler
/// exits, on every path including panics.
///
/// `Drop` is synchronous, so the disconnect runs as a spawned task.
/// Disconnect is idempotent, so a player the town already removed
/// (banned, emptied, deleted) is simply a no-op.
struct DisconnectGuard {
    player_id: PlayerId,
    town: TownHandle,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        let player_id = self.player_id;
        let town = self.town.clone();
        tokio::spawn(async move {
            let _ = town.disconnect(player_id).await;
        });
    }
}

/// Outbound frame numbering for one connection.
struct Outbox {
    seq: u64,
    start: Instant,
}

impl Outbox {
    fn new() -> Self {
        Self {
            seq: 0,
            start: Instant::now(),
        }
    }

    async fn send<C: Codec, K: Connection<Error = TransportError>>(
        &mut self,
        conn: &K,
        codec: &C,
        event: ServerEvent,
    ) -> Result<(), PlazaError> {
        let envelope = Envelope::new(self.seq, millis(self.start.elapsed()), event);
        self.seq += 1;
        let bytes = codec.encode(&envelope)?;
        conn.send(&bytes).await?;
        Ok(())
    }

    async fn send_error<C: Codec, K: Connection<Error = TransportError>>(
        &mut self,
        conn: &K,
        codec: &C,
        error: &PlazaError,
    ) -> Result<(), PlazaError> {
        let event = ServerEvent::Error {
            code: error.error_code(),
            message: error.to_string(),
        };
        self.send(conn, codec, event).await
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C, K>(
    conn: K,
    state: Arc<ServerState<C>>,
) -> Result<(), PlazaError>
where
    C: Codec,
    K: Connection<Error = TransportError>,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    let mut outbox = Outbox::new();

    // --- Step 1: Subscribe ---
    let (town, subscription) = match subscribe(&conn, &state).await {
        Ok(bound) => bound,
        Err(e) => {
            // Best effort; the client may already be gone.
            let _ = outbox.send_error(&conn, &state.codec, &e).await;
            let _ = conn.close().await;
            return Err(e);
        }
    };
    let Subscription {
        player_id,
        mut events,
    } = subscription;
    let _guard = DisconnectGuard {
        player_id,
        town: town.clone(),
    };
    tracing::info!(%conn_id, town_id = %town.town_id(), %player_id, "socket subscribed");

    outbox
        .send(&conn, &state.codec, ServerEvent::Subscribed { player_id })
        .await?;

    // --- Step 2: Route ---
    let mut keepalive =
        tokio::time::interval((state.idle_timeout / 3).max(Duration::from_millis(1)));
    keepalive.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        let idle_deadline = tokio::time::Instant::from_std(conn.last_seen() + state.idle_timeout);

        tokio::select! {
            inbound = conn.recv() => {
                let data = match inbound {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::info!(%player_id, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%player_id, error = %e, "recv error");
                        break;
                    }
                };

                let message = match state.codec.decode::<Envelope<ClientMessage>>(&data) {
                    Ok(envelope) => envelope.payload,
                    Err(e) => {
                        tracing::debug!(%player_id, error = %e, "failed to decode envelope");
                        outbox.send_error(&conn, &state.codec, &e.into()).await?;
                        continue;
                    }
                };

                match message {
                    ClientMessage::PlayerMovement { location } => {
                        town.move_player(player_id, location).await?;
                    }
                    ClientMessage::Disconnect => {
                        tracing::info!(%player_id, "client disconnected");
                        break;
                    }
                    ClientMessage::Subscribe { .. } => {
                        let e = PlazaError::Protocol(ProtocolError::InvalidMessage(
                            "already subscribed".into(),
                        ));
                        outbox.send_error(&conn, &state.codec, &e).await?;
                    }
                }
            }

            event = events.recv() => {
                let Some(event) = event else {
                    // The town dropped our channel without a goodbye;
                    // it no longer knows this player.
                    tracing::debug!(%player_id, "event channel closed");
                    break;
                };

                let forced = matches!(event, ServerEvent::Disconnect { .. });
                outbox.send(&conn, &state.codec, event).await?;
                if forced {
                    tracing::info!(%player_id, "session ended by the server");
                    break;
                }
            }

            _ = keepalive.tick() => {
                conn.ping().await?;
            }

            _ = tokio::time::sleep_until(idle_deadline) => {
                // A pong may have landed while this arm was armed.
                if conn.last_seen().elapsed() < state.idle_timeout {
                    continue;
                }
                tracing::info!(%player_id, "connection unresponsive, dropping");
                break;
            }
        }
    }

    let _ = conn.close().await;
    // _guard drops here → town disconnect fires.
    Ok(())
}

/// Waits for the `Subscribe` frame and binds the socket to its session.
async fn subscribe<C: Codec, K: Connection<Error = TransportError>>(
    conn: &K,
    state: &ServerState<C>,
) -> Result<(TownHandle, Subscription), PlazaError> {
    let data = match tokio::time::timeout(state.subscribe_timeout, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(invalid("connection closed before subscribe"));
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => return Err(invalid("subscribe timed out")),
    };

    let envelope: Envelope<ClientMessage> = state.codec.decode(&data)?;
    let (town_id, session_token) = match envelope.payload {
        ClientMessage::Subscribe {
            town_id,
            session_token,
        } => (town_id, session_token),
        _ => return Err(invalid("first message must be Subscribe")),
    };

    let town = find_town(state, town_id).await?;
    let subscription = town.subscribe(session_token, conn.id()).await?;
    Ok((town, subscription))
}

async fn find_town<C: Codec>(
    state: &ServerState<C>,
    town_id: TownId,
) -> Result<TownHandle, TownError> {
    state
        .registry
        .get(town_id)
        .await
        .ok_or(TownError::NotFound(town_id))
}

fn invalid(reason: &str) -> PlazaError {
    PlazaError::Protocol(ProtocolError::InvalidMessage(reason.to_string()))
}

/// Milliseconds in `elapsed`, saturating at `u64::MAX`.
fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
