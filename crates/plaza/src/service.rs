//! The request/response surface: town management, joining, moderation,
//! and accounts.
//!
//! `TownService` is what an HTTP layer would call, one method per route.
//! Bodies in and out are the contracts from [`plaza_protocol::rest`];
//! routing and envelopes are left to the caller.
//!
//! # Failure model
//!
//! Moderation calls (`update_player`, `ban_player`, `empty_town`,
//! `request_admin`) fail closed: a wrong password, an unknown town, an
//! acting player that is not an admin, or a town that vanished mid-call
//! all come back as `false` with nothing changed. Everything else returns
//! a [`PlazaError`] whose [`error_code`](PlazaError::error_code) tells the
//! client what went wrong.

use std::sync::Arc;

use plaza_protocol::rest::{
    AccountRequest, AccountResponse, AskToBecomeAdminRequest, BanPlayerRequest,
    ChatTokenResponse, EmptyTownRequest, PlayerUpdateRequest, TownCreateRequest,
    TownCreateResponse, TownDeleteRequest, TownJoinRequest, TownJoinResponse,
    TownListEntry, TownListResponse, TownParticipantsResponse, TownUpdateRequest,
};
use plaza_protocol::TownId;
use plaza_session::{
    AccountStore, ChatTokenIssuer, MediaTokenIssuer, SessionError, generate_token,
};
use plaza_town::{TownError, TownHandle, TownRegistry, TownUpdate, capacity_in_range};

use crate::PlazaError;

struct Inner<M, C, A> {
    registry: Arc<TownRegistry>,
    media: M,
    chat: C,
    accounts: A,
}

/// Town management and join flow, wired to the external collaborators.
///
/// Cheap to clone; clones share the same registry and collaborators.
pub struct TownService<M, C, A> {
    inner: Arc<Inner<M, C, A>>,
}

impl<M, C, A> Clone for TownService<M, C, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M, C, A> TownService<M, C, A>
where
    M: MediaTokenIssuer,
    C: ChatTokenIssuer,
    A: AccountStore,
{
    pub fn new(registry: Arc<TownRegistry>, media: M, chat: C, accounts: A) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                media,
                chat,
                accounts,
            }),
        }
    }

    /// The registry this service manages. Share it with the socket
    /// server so both surfaces see the same towns.
    pub fn registry(&self) -> &Arc<TownRegistry> {
        &self.inner.registry
    }

    // -----------------------------------------------------------------------
    // Towns
    // -----------------------------------------------------------------------

    /// Creates a town and returns its id and update password.
    ///
    /// # Errors
    /// [`TownError::InvalidArgument`] for an empty name or an explicit
    /// capacity outside the allowed range.
    pub async fn create_town(
        &self,
        req: TownCreateRequest,
    ) -> Result<TownCreateResponse, PlazaError> {
        if req.friendly_name.is_empty() {
            return Err(TownError::InvalidArgument("town name must not be empty".into()).into());
        }
        if let Some(capacity) = req.capacity {
            if !capacity_in_range(capacity) {
                return Err(TownError::InvalidArgument(format!(
                    "capacity {capacity} out of range"
                ))
                .into());
            }
        }

        let created = self
            .inner
            .registry
            .create_town(req.friendly_name, req.is_publicly_listed, req.capacity)
            .await;

        Ok(TownCreateResponse {
            town_id: created.handle.town_id(),
            town_password: created.update_password,
        })
    }

    /// Public towns with their occupancy.
    pub async fn list_towns(&self) -> TownListResponse {
        let towns = self
            .inner
            .registry
            .list_public_towns()
            .await
            .into_iter()
            .map(|info| TownListEntry {
                town_id: info.town_id,
                friendly_name: info.friendly_name,
                current_occupancy: info.occupancy,
                maximum_occupancy: info.capacity,
            })
            .collect();
        TownListResponse { towns }
    }

    /// Password-gated rename, relist, or resize.
    pub async fn update_town(&self, req: TownUpdateRequest) -> Result<(), PlazaError> {
        let update = TownUpdate {
            friendly_name: req.friendly_name,
            is_public: req.is_publicly_listed,
            capacity: req.capacity,
        };
        self.inner
            .registry
            .update_town(req.town_id, &req.town_password, update)
            .await?;
        Ok(())
    }

    /// Password-gated deletion. Connected clients are told the town is
    /// gone.
    pub async fn delete_town(&self, req: TownDeleteRequest) -> Result<(), PlazaError> {
        self.inner
            .registry
            .delete_town(req.town_id, &req.town_password)
            .await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Joining
    // -----------------------------------------------------------------------

    /// Admits a player and fetches its media and chat tokens.
    ///
    /// Either everything succeeds, or nothing is left behind: a provider
    /// failure releases the reserved slot and no other client ever hears
    /// about the attempt.
    ///
    /// # Errors
    /// - [`TownError::NotFound`] for an unknown town
    /// - [`TownError::Banned`] / [`TownError::Capacity`] from admission
    /// - [`SessionError::Provider`] if a token could not be issued
    pub async fn join_town(&self, req: TownJoinRequest) -> Result<TownJoinResponse, PlazaError> {
        let handle = self.town(req.town_id).await?;
        let reservation = handle.reserve(req.user_name).await?;

        let identity = reservation.player_id().to_string();
        let video_token = self
            .inner
            .media
            .issue_media_token(&identity, req.town_id)
            .await
            .inspect_err(|e| {
                tracing::warn!(town_id = %req.town_id, %identity, error = %e, "media token failed");
            })?;
        let chat_token = self
            .inner
            .chat
            .issue_chat_token(&identity)
            .await
            .inspect_err(|e| {
                tracing::warn!(town_id = %req.town_id, %identity, error = %e, "chat token failed");
            })?;

        let joined = reservation.commit().await?;

        Ok(TownJoinResponse {
            user_id: joined.player.id,
            session_token: joined.session_token,
            video_token,
            chat_token,
            current_players: joined.roster,
            friendly_name: joined.info.friendly_name,
            is_publicly_listed: joined.info.is_public,
            capacity: joined.info.capacity,
        })
    }

    /// Read-only roster for polling clients.
    pub async fn list_participants(
        &self,
        town_id: TownId,
    ) -> Result<TownParticipantsResponse, PlazaError> {
        let participants = self.town(town_id).await?.participants().await?;
        Ok(TownParticipantsResponse { participants })
    }

    // -----------------------------------------------------------------------
    // Moderation
    // -----------------------------------------------------------------------

    /// Changes a player's flags. Needs the town password and an acting
    /// admin.
    pub async fn update_player(&self, req: PlayerUpdateRequest) -> bool {
        let Some(handle) = self.authorized(req.town_id, &req.town_password).await else {
            return false;
        };
        handle
            .update_privileges(req.user_id, req.player_id, req.privileges)
            .await
            .unwrap_or(false)
    }

    /// Bans a player's display name and removes it from the town. Needs
    /// the town password and an acting admin.
    pub async fn ban_player(&self, req: BanPlayerRequest) -> bool {
        let Some(handle) = self.authorized(req.town_id, &req.town_password).await else {
            return false;
        };
        handle.ban(req.user_id, req.player_id).await.unwrap_or(false)
    }

    /// Disconnects everyone but keeps the town. Needs the town password
    /// and an acting admin.
    pub async fn empty_town(&self, req: EmptyTownRequest) -> bool {
        let Some(handle) = self.authorized(req.town_id, &req.town_password).await else {
            return false;
        };
        handle.empty(req.user_id).await.unwrap_or(false)
    }

    /// Announces that a non-admin would like to be promoted.
    pub async fn request_admin(&self, req: AskToBecomeAdminRequest) -> bool {
        match self.town(req.town_id).await {
            Ok(handle) => handle.request_admin(req.user_id).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    // -----------------------------------------------------------------------
    // Accounts and chat
    // -----------------------------------------------------------------------

    /// A chat token for `user_name`, outside of any town.
    pub async fn chat_token(&self, user_name: &str) -> Result<ChatTokenResponse, PlazaError> {
        let token = self.inner.chat.issue_chat_token(user_name).await?;
        Ok(ChatTokenResponse { token })
    }

    /// Registers a new account and logs it in.
    ///
    /// # Errors
    /// [`SessionError::AccountExists`] if the name is taken.
    pub async fn sign_up(&self, req: AccountRequest) -> Result<AccountResponse, PlazaError> {
        let account = self.inner.accounts.insert(&req.user_name, &req.password).await?;
        Ok(AccountResponse {
            user_id: account.user_id,
            user_name: account.user_name,
            auth_token: generate_token(),
        })
    }

    /// Checks credentials and hands out a fresh auth token.
    ///
    /// # Errors
    /// [`SessionError::BadCredentials`] for an unknown name or wrong
    /// password.
    pub async fn log_in(&self, req: AccountRequest) -> Result<AccountResponse, PlazaError> {
        let account = self
            .inner
            .accounts
            .lookup(&req.user_name, &req.password)
            .await?
            .ok_or(SessionError::BadCredentials)?;
        tracing::info!(user_name = %account.user_name, "account logged in");
        Ok(AccountResponse {
            user_id: account.user_id,
            user_name: account.user_name,
            auth_token: generate_token(),
        })
    }

    async fn town(&self, town_id: TownId) -> Result<TownHandle, TownError> {
        self.inner
            .registry
            .get(town_id)
            .await
            .ok_or(TownError::NotFound(town_id))
    }

    async fn authorized(&self, town_id: TownId, password: &str) -> Option<TownHandle> {
        self.inner.registry.authorize(town_id, password).await.ok()
    }
}
