//! Session management for Plaza.
//!
//! A session is the binding between one connected client and one player
//! inside one town, reached through an opaque bearer token. This crate
//! provides:
//!
//! 1. **Token issuance**: fresh random tokens with no embedded claims
//! 2. **Session tables**: one [`SessionTable`] per town, resolving tokens
//!    to players and remembering which connection each session is bound to
//! 3. **External collaborators**: the narrow traits through which the
//!    server reaches the video provider ([`MediaTokenIssuer`]), the chat
//!    provider ([`ChatTokenIssuer`]), and the account rows
//!    ([`AccountStore`]), plus in-process implementations for development
//!    and tests
//!
//! ```text
//! Town Layer (above)  ← owns one SessionTable per town
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Protocol / Transport (below)  ← PlayerId, TownId, ConnectionId
//! ```

#![allow(async_fn_in_trait)]

mod accounts;
mod error;
mod providers;
mod session;
mod table;

pub use accounts::{Account, AccountStore, InMemoryAccounts};
pub use error::SessionError;
pub use providers::{ChatTokenIssuer, LocalTokenIssuer, MediaTokenIssuer};
pub use session::{Session, generate_token};
pub use table::SessionTable;
