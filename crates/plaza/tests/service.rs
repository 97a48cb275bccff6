//! Integration tests for the request/response surface.

use std::sync::Arc;

use plaza::prelude::*;

// =========================================================================
// Test collaborators
// =========================================================================

/// A video provider that is always down.
struct VideoDown;

impl MediaTokenIssuer for VideoDown {
    async fn issue_media_token(&self, _identity: &str, _town_id: TownId) -> Result<String, SessionError> {
        Err(SessionError::Provider("video provider down".into()))
    }
}

/// A chat provider that is always down.
struct ChatDown;

impl ChatTokenIssuer for ChatDown {
    async fn issue_chat_token(&self, _identity: &str) -> Result<String, SessionError> {
        Err(SessionError::Provider("chat provider down".into()))
    }
}

type LocalService = TownService<LocalTokenIssuer, LocalTokenIssuer, InMemoryAccounts>;

fn service_with(registry: TownRegistry) -> LocalService {
    TownService::new(
        Arc::new(registry),
        LocalTokenIssuer,
        LocalTokenIssuer,
        InMemoryAccounts::new(),
    )
}

fn service() -> LocalService {
    service_with(TownRegistry::default())
}

async fn create(service: &LocalService, name: &str, public: bool) -> TownCreateResponse {
    service
        .create_town(TownCreateRequest {
            friendly_name: name.into(),
            is_publicly_listed: public,
            capacity: None,
        })
        .await
        .unwrap()
}

async fn join(service: &LocalService, town_id: TownId, name: &str) -> TownJoinResponse {
    service
        .join_town(TownJoinRequest {
            user_name: name.into(),
            town_id,
        })
        .await
        .unwrap()
}

// =========================================================================
// create / list / update / delete
// =========================================================================

#[tokio::test]
async fn test_create_town_empty_name_is_invalid() {
    let service = service();

    let err = service
        .create_town(TownCreateRequest {
            friendly_name: String::new(),
            is_publicly_listed: true,
            capacity: None,
        })
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), 400);
    assert!(service.registry().is_empty().await);
}

#[tokio::test]
async fn test_create_town_explicit_capacity_out_of_range_is_invalid() {
    let service = service();

    for capacity in [0, 9, 151] {
        let err = service
            .create_town(TownCreateRequest {
                friendly_name: "lobby".into(),
                is_publicly_listed: true,
                capacity: Some(capacity),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PlazaError::Town(TownError::InvalidArgument(_))));
    }
}

#[tokio::test]
async fn test_create_town_returns_fresh_password() {
    let service = service();
    let a = create(&service, "a", true).await;
    let b = create(&service, "b", true).await;

    assert_ne!(a.town_id, b.town_id);
    assert_ne!(a.town_password, b.town_password);
    assert_eq!(a.town_password.len(), 32);
}

#[tokio::test]
async fn test_list_towns_public_only_with_occupancy() {
    let service = service();
    let open = create(&service, "open", true).await;
    create(&service, "hidden", false).await;
    join(&service, open.town_id, "ada").await;

    let listing = service.list_towns().await;

    assert_eq!(listing.towns.len(), 1);
    let entry = &listing.towns[0];
    assert_eq!(entry.town_id, open.town_id);
    assert_eq!(entry.friendly_name, "open");
    assert_eq!(entry.current_occupancy, 1);
    assert_eq!(entry.maximum_occupancy, 50);
}

#[tokio::test]
async fn test_update_town_wrong_password_is_forbidden() {
    let service = service();
    let town = create(&service, "lobby", true).await;

    let err = service
        .update_town(TownUpdateRequest {
            town_id: town.town_id,
            town_password: "guess".into(),
            friendly_name: Some("mine".into()),
            is_publicly_listed: None,
            capacity: None,
        })
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), 403);
    assert_eq!(service.list_towns().await.towns[0].friendly_name, "lobby");
}

#[tokio::test]
async fn test_update_town_unlisting_hides_it() {
    let service = service();
    let town = create(&service, "lobby", true).await;

    service
        .update_town(TownUpdateRequest {
            town_id: town.town_id,
            town_password: town.town_password,
            friendly_name: None,
            is_publicly_listed: Some(false),
            capacity: Some(12),
        })
        .await
        .unwrap();

    assert!(service.list_towns().await.towns.is_empty());
}

#[tokio::test]
async fn test_delete_town_then_join_is_not_found() {
    let service = service();
    let town = create(&service, "lobby", true).await;

    service
        .delete_town(TownDeleteRequest {
            town_id: town.town_id,
            town_password: town.town_password,
        })
        .await
        .unwrap();

    let err = service
        .join_town(TownJoinRequest {
            user_name: "ada".into(),
            town_id: town.town_id,
        })
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), 404);
}

// =========================================================================
// join
// =========================================================================

#[tokio::test]
async fn test_join_town_returns_everything_the_client_needs() {
    let service = service();
    let town = create(&service, "lobby", true).await;

    let first = join(&service, town.town_id, "ada").await;
    let second = join(&service, town.town_id, "bob").await;

    assert_eq!(second.friendly_name, "lobby");
    assert!(second.is_publicly_listed);
    assert_eq!(second.capacity, 50);
    assert_eq!(second.current_players.len(), 2);
    assert!(!second.video_token.is_empty());
    assert!(!second.chat_token.is_empty());
    assert_ne!(first.session_token, second.session_token);

    let ada = second
        .current_players
        .iter()
        .find(|p| p.id == first.user_id)
        .unwrap();
    assert!(ada.privileges.admin);
    let bob = second
        .current_players
        .iter()
        .find(|p| p.id == second.user_id)
        .unwrap();
    assert!(!bob.privileges.admin);
}

#[tokio::test]
async fn test_join_town_unknown_town_is_not_found() {
    let service = service();

    let err = service
        .join_town(TownJoinRequest {
            user_name: "ada".into(),
            town_id: TownId(u64::MAX),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, PlazaError::Town(TownError::NotFound(_))));
}

#[tokio::test]
async fn test_join_town_media_failure_rolls_back() {
    let registry = Arc::new(TownRegistry::default().with_default_capacity(1));
    let town = registry.create_town("lobby", true, None).await;
    let failing = TownService::new(
        Arc::clone(&registry),
        VideoDown,
        LocalTokenIssuer,
        InMemoryAccounts::new(),
    );
    let working = TownService::new(
        Arc::clone(&registry),
        LocalTokenIssuer,
        LocalTokenIssuer,
        InMemoryAccounts::new(),
    );
    let town_id = town.handle.town_id();

    let err = failing
        .join_town(TownJoinRequest {
            user_name: "ada".into(),
            town_id,
        })
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), 502);
    assert!(town.handle.participants().await.unwrap().is_empty());

    // The single slot was released, and the next joiner is still first.
    let bob = working
        .join_town(TownJoinRequest {
            user_name: "bob".into(),
            town_id,
        })
        .await
        .unwrap();
    assert_eq!(bob.current_players.len(), 1);
    assert!(bob.current_players[0].privileges.admin);
}

#[tokio::test]
async fn test_join_town_chat_failure_rolls_back() {
    let registry = Arc::new(TownRegistry::default());
    let town = registry.create_town("lobby", true, None).await;
    let service = TownService::new(
        Arc::clone(&registry),
        LocalTokenIssuer,
        ChatDown,
        InMemoryAccounts::new(),
    );

    let result = service
        .join_town(TownJoinRequest {
            user_name: "ada".into(),
            town_id: town.handle.town_id(),
        })
        .await;

    assert!(matches!(
        result,
        Err(PlazaError::Session(SessionError::Provider(_)))
    ));
    assert!(town.handle.participants().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_participants_matches_roster() {
    let service = service();
    let town = create(&service, "lobby", true).await;
    let ada = join(&service, town.town_id, "ada").await;

    let res = service.list_participants(town.town_id).await.unwrap();

    assert_eq!(res.participants.len(), 1);
    assert_eq!(res.participants[0].id, ada.user_id);
    assert_eq!(res.participants[0].user_name, "ada");
}

// =========================================================================
// moderation
// =========================================================================

#[tokio::test]
async fn test_update_player_needs_password_and_admin() {
    let service = service();
    let town = create(&service, "lobby", true).await;
    let a = join(&service, town.town_id, "A").await;
    let b = join(&service, town.town_id, "B").await;
    let mute = |user_id, password: &str| PlayerUpdateRequest {
        town_id: town.town_id,
        town_password: password.into(),
        user_id,
        player_id: b.user_id,
        privileges: PrivilegeUpdate {
            audio: Some(false),
            ..PrivilegeUpdate::default()
        },
    };

    assert!(!service.update_player(mute(a.user_id, "wrong")).await);
    assert!(!service.update_player(mute(b.user_id, &town.town_password)).await);
    assert!(service.update_player(mute(a.user_id, &town.town_password)).await);

    let roster = service.list_participants(town.town_id).await.unwrap().participants;
    let b_now = roster.iter().find(|p| p.id == b.user_id).unwrap();
    assert!(!b_now.privileges.audio);
}

#[tokio::test]
async fn test_ban_player_blocks_rejoin() {
    let service = service();
    let town = create(&service, "lobby", true).await;
    let a = join(&service, town.town_id, "A").await;
    let b = join(&service, town.town_id, "B").await;

    assert!(
        service
            .ban_player(BanPlayerRequest {
                town_id: town.town_id,
                town_password: town.town_password.clone(),
                user_id: a.user_id,
                player_id: b.user_id,
            })
            .await
    );

    let err = service
        .join_town(TownJoinRequest {
            user_name: "B".into(),
            town_id: town.town_id,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, PlazaError::Town(TownError::Banned(_))));
    assert_eq!(err.error_code(), 403);
}

#[tokio::test]
async fn test_ban_player_with_master_password() {
    let service = service_with(TownRegistry::new(Some("operator".into())));
    let town = create(&service, "lobby", true).await;
    let a = join(&service, town.town_id, "A").await;
    let b = join(&service, town.town_id, "B").await;

    let banned = service
        .ban_player(BanPlayerRequest {
            town_id: town.town_id,
            town_password: "operator".into(),
            user_id: a.user_id,
            player_id: b.user_id,
        })
        .await;

    assert!(banned);
}

#[tokio::test]
async fn test_moderation_on_unknown_town_fails_closed() {
    let service = service();

    let emptied = service
        .empty_town(EmptyTownRequest {
            town_id: TownId(u64::MAX),
            town_password: "x".into(),
            user_id: PlayerId(1),
        })
        .await;
    let asked = service
        .request_admin(AskToBecomeAdminRequest {
            town_id: TownId(u64::MAX),
            user_id: PlayerId(1),
        })
        .await;

    assert!(!emptied);
    assert!(!asked);
}

#[tokio::test]
async fn test_empty_town_clears_roster() {
    let service = service();
    let town = create(&service, "lobby", true).await;
    let a = join(&service, town.town_id, "A").await;
    join(&service, town.town_id, "B").await;

    assert!(
        service
            .empty_town(EmptyTownRequest {
                town_id: town.town_id,
                town_password: town.town_password.clone(),
                user_id: a.user_id,
            })
            .await
    );

    let res = service.list_participants(town.town_id).await.unwrap();
    assert!(res.participants.is_empty());
    assert_eq!(service.list_towns().await.towns.len(), 1);
}

#[tokio::test]
async fn test_request_admin_only_for_non_admins() {
    let service = service();
    let town = create(&service, "lobby", true).await;
    let a = join(&service, town.town_id, "A").await;
    let b = join(&service, town.town_id, "B").await;
    let ask = |user_id| AskToBecomeAdminRequest {
        town_id: town.town_id,
        user_id,
    };

    assert!(!service.request_admin(ask(a.user_id)).await);
    assert!(service.request_admin(ask(b.user_id)).await);
}

// =========================================================================
// accounts and chat
// =========================================================================

#[tokio::test]
async fn test_sign_up_then_log_in() {
    let service = service();
    let creds = AccountRequest {
        user_name: "ada".into(),
        password: "hunter2".into(),
    };

    let signed_up = service.sign_up(creds.clone()).await.unwrap();
    let logged_in = service.log_in(creds.clone()).await.unwrap();

    assert_eq!(signed_up.user_id, logged_in.user_id);
    assert_eq!(logged_in.user_name, "ada");
    assert_ne!(signed_up.auth_token, logged_in.auth_token);

    let dup = service.sign_up(creds).await.unwrap_err();
    assert_eq!(dup.error_code(), 409);
}

#[tokio::test]
async fn test_log_in_wrong_password_is_unauthorized() {
    let service = service();
    service
        .sign_up(AccountRequest {
            user_name: "ada".into(),
            password: "hunter2".into(),
        })
        .await
        .unwrap();

    let err = service
        .log_in(AccountRequest {
            user_name: "ada".into(),
            password: "nope".into(),
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PlazaError::Session(SessionError::BadCredentials)
    ));
    assert_eq!(err.error_code(), 401);
}

#[tokio::test]
async fn test_chat_token_is_issued() {
    let service = service();
    let res = service.chat_token("ada").await.unwrap();
    assert_eq!(res.token.len(), 32);
}
