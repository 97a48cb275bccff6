//! Token handshakes with the external media and chat providers.
//!
//! Plaza never carries audio, video, or chat traffic itself. When a
//! player joins, the server asks each provider for an opaque access token
//! and passes it through to the client untouched. What the provider puts
//! inside the token is none of Plaza's business.
//!
//! Both providers sit behind a trait so production can call the real
//! vendor API, while development and tests use [`LocalTokenIssuer`].

use std::future::Future;

use plaza_protocol::TownId;

use crate::{SessionError, generate_token};

/// Issues tokens for the video-conferencing provider.
///
/// # Trait bounds
///
/// `Send + Sync + 'static`: one issuer is shared by every request task
/// for the lifetime of the server.
///
/// # Example
///
/// ```rust
/// use plaza_protocol::TownId;
/// use plaza_session::{MediaTokenIssuer, SessionError};
///
/// /// Refuses everyone; handy for exercising the failure path.
/// struct Offline;
///
/// impl MediaTokenIssuer for Offline {
///     async fn issue_media_token(
///         &self,
///         _identity: &str,
///         _town_id: TownId,
///     ) -> Result<String, SessionError> {
///         Err(SessionError::Provider("video provider offline".into()))
///     }
/// }
/// ```
pub trait MediaTokenIssuer: Send + Sync + 'static {
    /// Returns a token that lets `identity` enter the media room of
    /// `town_id`.
    ///
    /// This is the only call in a join that may suspend on the network.
    /// A failure here aborts the join; no player is left behind.
    fn issue_media_token(
        &self,
        identity: &str,
        town_id: TownId,
    ) -> impl Future<Output = Result<String, SessionError>> + Send;
}

/// Issues tokens for the text-chat provider.
pub trait ChatTokenIssuer: Send + Sync + 'static {
    /// Returns a token that lets `identity` use the chat service.
    fn issue_chat_token(
        &self,
        identity: &str,
    ) -> impl Future<Output = Result<String, SessionError>> + Send;
}

/// An in-process issuer for development and tests.
///
/// Hands out fresh random tokens for both providers and never fails.
/// Nothing downstream can redeem them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTokenIssuer;

impl MediaTokenIssuer for LocalTokenIssuer {
    async fn issue_media_token(
        &self,
        identity: &str,
        town_id: TownId,
    ) -> Result<String, SessionError> {
        tracing::trace!(identity, %town_id, "issuing local media token");
        Ok(generate_token())
    }
}

impl ChatTokenIssuer for LocalTokenIssuer {
    async fn issue_chat_token(&self, identity: &str) -> Result<String, SessionError> {
        tracing::trace!(identity, "issuing local chat token");
        Ok(generate_token())
    }
}
