//! Error types for the session layer.

use plaza_protocol::PlayerId;

/// Errors that can occur while issuing or resolving sessions, or while
/// talking to an external collaborator.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The token is unknown to this town. It may belong to another town,
    /// or its session already ended.
    #[error("invalid session token")]
    InvalidToken,

    /// The session is already bound to a different connection.
    /// Tokens are not shared between sockets.
    #[error("session for player {0} is already bound to a connection")]
    AlreadyBound(PlayerId),

    /// The video or chat provider refused or failed to issue a token.
    #[error("token provider failed: {0}")]
    Provider(String),

    /// Sign-up with a user name that already has an account.
    #[error("account {0} already exists")]
    AccountExists(String),

    /// Log-in with an unknown user name or a wrong password.
    #[error("unknown user name or wrong password")]
    BadCredentials,

    /// The account store failed.
    #[error("account store failed: {0}")]
    Store(String),
}
