//! Error types for the town layer.

use plaza_protocol::{PlayerId, TownId};
use plaza_session::SessionError;

/// Errors that can occur during town operations.
#[derive(Debug, thiserror::Error)]
pub enum TownError {
    /// No town with this id is registered.
    #[error("town {0} not found")]
    NotFound(TownId),

    /// Wrong town password, or the acting player lacks admin rights.
    #[error("not authorized for town {0}")]
    Forbidden(TownId),

    /// The display name is on the town's ban list.
    #[error("{0} is banned from this town")]
    Banned(String),

    /// The town has no free slot (pending joins included).
    #[error("town {0} is full")]
    Capacity(TownId),

    /// Empty name, out-of-range capacity on create, and the like.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The player is not (or no longer) part of this town.
    #[error("player {0} not in town {1}")]
    NotInTown(PlayerId, TownId),

    /// The town's command channel is closed; it was deleted or its
    /// task has stopped.
    #[error("town {0} is unavailable")]
    Unavailable(TownId),

    /// Token resolution or binding failed.
    #[error(transparent)]
    Session(#[from] SessionError),
}
