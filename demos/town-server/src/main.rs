//! A runnable Plaza town server.
//!
//! Reads its settings from the environment (`PLAZA_BIND`,
//! `PLAZA_MASTER_TOWN_PASSWORD`, `PLAZA_DEFAULT_CAPACITY`), opens a
//! public "Lobby" town, and serves town sockets until Ctrl-C. Tokens are
//! issued locally, so no video or chat provider is needed.
//!
//! Clients join through [`TownService::join_town`] and then open a socket
//! with the `session_token` they got back.

use std::sync::Arc;

use plaza::prelude::*;

type DemoService = TownService<LocalTokenIssuer, LocalTokenIssuer, InMemoryAccounts>;

/// A bound server with its service and the seeded lobby.
struct Demo {
    service: DemoService,
    server: PlazaServer<JsonCodec>,
    lobby: TownCreateResponse,
}

async fn start(config: &ServerConfig) -> Result<Demo, PlazaError> {
    let registry = Arc::new(
        TownRegistry::new(config.master_password.clone())
            .with_default_capacity(config.default_capacity),
    );
    let service = TownService::new(
        Arc::clone(&registry),
        LocalTokenIssuer,
        LocalTokenIssuer,
        InMemoryAccounts::new(),
    );

    let lobby = service
        .create_town(TownCreateRequest {
            friendly_name: "Lobby".into(),
            is_publicly_listed: true,
            capacity: None,
        })
        .await?;

    let server = PlazaServer::builder()
        .bind(&config.bind_addr)
        .registry(registry)
        .build()
        .await?;

    Ok(Demo {
        service,
        server,
        lobby,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = ServerConfig::from_env();
    let Demo {
        service,
        server,
        lobby,
    } = start(&config).await?;

    tracing::info!(
        addr = %server.local_addr()?,
        town_id = %lobby.town_id,
        town_password = %lobby.town_password,
        master_password = config.master_password.is_some(),
        "lobby is open"
    );

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            service.registry().reset().await;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use std::time::Duration;
    use tokio_tungstenite::tungstenite::Message;

    type Ws = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn boot() -> (DemoService, TownCreateResponse, String) {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".into(),
            ..ServerConfig::default()
        };
        let demo = start(&config).await.unwrap();
        let addr = demo.server.local_addr().unwrap().to_string();
        let server = demo.server;
        tokio::spawn(async move {
            let _ = server.run().await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        (demo.service, demo.lobby, addr)
    }

    async fn ws(addr: &str) -> Ws {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .unwrap();
        ws
    }

    async fn send(ws: &mut Ws, seq: u64, message: ClientMessage) {
        let text = serde_json::to_string(&Envelope::new(seq, 0, message)).unwrap();
        ws.send(Message::text(text)).await.unwrap();
    }

    async fn recv(ws: &mut Ws) -> ServerEvent {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(1), ws.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            if msg.is_text() || msg.is_binary() {
                let env: Envelope<ServerEvent> = serde_json::from_slice(&msg.into_data()).unwrap();
                return env.payload;
            }
        }
    }

    async fn enter(
        service: &DemoService,
        lobby: &TownCreateResponse,
        addr: &str,
        name: &str,
    ) -> (TownJoinResponse, Ws) {
        let joined = service
            .join_town(TownJoinRequest {
                user_name: name.into(),
                town_id: lobby.town_id,
            })
            .await
            .unwrap();
        let mut socket = ws(addr).await;
        send(
            &mut socket,
            0,
            ClientMessage::Subscribe {
                town_id: lobby.town_id,
                session_token: joined.session_token.clone(),
            },
        )
        .await;
        assert_eq!(
            recv(&mut socket).await,
            ServerEvent::Subscribed {
                player_id: joined.user_id
            }
        );
        (joined, socket)
    }

    #[tokio::test]
    async fn test_lobby_is_listed() {
        let (service, lobby, _addr) = boot().await;

        let listing = service.list_towns().await;

        assert_eq!(listing.towns.len(), 1);
        assert_eq!(listing.towns[0].town_id, lobby.town_id);
        assert_eq!(listing.towns[0].friendly_name, "Lobby");
    }

    #[tokio::test]
    async fn test_walking_away_leaves_the_conversation() {
        let (service, lobby, addr) = boot().await;
        let (_ada, mut ada_ws) = enter(&service, &lobby, &addr, "ada").await;
        let (bob, mut bob_ws) = enter(&service, &lobby, &addr, "bob").await;

        // A third client follows along with a client-side view.
        let mut view = TownView::default();
        view = view.apply(ViewUpdate::Connected(
            service
                .join_town(TownJoinRequest {
                    user_name: "observer".into(),
                    town_id: lobby.town_id,
                })
                .await
                .unwrap(),
        ));
        assert!(matches!(recv(&mut ada_ws).await, ServerEvent::NewPlayer { .. }));
        // The observer's own arrival.
        assert!(matches!(recv(&mut ada_ws).await, ServerEvent::NewPlayer { .. }));
        // Everyone starts at the origin.
        assert!(view.nearby().contains(bob.user_id));

        send(
            &mut bob_ws,
            1,
            ClientMessage::PlayerMovement {
                location: Location::at(300.0, 400.0),
            },
        )
        .await;

        let moved = recv(&mut ada_ws).await;
        match &moved {
            ServerEvent::PlayerMoved { player } => assert_eq!(player.id, bob.user_id),
            other => panic!("expected PlayerMoved, got {other:?}"),
        }

        view = view.apply(ViewUpdate::Server(moved));
        // The observer stayed at the origin; bob is now 500 away.
        assert!(!view.nearby().contains(bob.user_id));
    }
}
