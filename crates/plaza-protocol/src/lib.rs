//! Wire protocol for Plaza.
//!
//! - **Socket types** ([`ClientMessage`], [`ServerEvent`], [`Envelope`]):
//!   the per-town event channel.
//! - **Domain values** ([`PlayerId`], [`TownId`], [`Location`],
//!   [`Privileges`], [`PlayerSnapshot`]) shared by every layer above.
//! - **REST contracts** ([`rest`]): request/response bodies for the
//!   town-management surface.
//! - **Codec** ([`Codec`], [`JsonCodec`]): bytes in, types out.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Session / Town
//! ```

mod codec;
mod error;
pub mod rest;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientMessage, Direction, DisconnectReason, Envelope, Location, PlayerId,
    PlayerSnapshot, PrivilegeUpdate, Privileges, ServerEvent, TownId,
};
