//! Unified error type for Plaza.

use plaza_protocol::ProtocolError;
use plaza_session::SessionError;
use plaza_town::TownError;
use plaza_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum PlazaError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, unexpected message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (token, provider, accounts).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A town-level error (not found, forbidden, banned, full).
    #[error(transparent)]
    Town(#[from] TownError),
}

impl PlazaError {
    /// HTTP-style status code for reporting this error to a client.
    pub fn error_code(&self) -> u16 {
        match self {
            Self::Transport(_) => 500,
            Self::Protocol(_) => 400,
            Self::Session(e) => session_code(e),
            Self::Town(e) => match e {
                TownError::NotFound(_) | TownError::NotInTown(..) => 404,
                TownError::Forbidden(_) | TownError::Banned(_) => 403,
                TownError::Capacity(_) => 409,
                TownError::InvalidArgument(_) => 400,
                TownError::Unavailable(_) => 503,
                TownError::Session(e) => session_code(e),
            },
        }
    }
}

fn session_code(e: &SessionError) -> u16 {
    match e {
        SessionError::InvalidToken | SessionError::BadCredentials => 401,
        SessionError::AlreadyBound(_) | SessionError::AccountExists(_) => 409,
        SessionError::Provider(_) => 502,
        SessionError::Store(_) => 500,
    }
}
