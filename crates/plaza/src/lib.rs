//! # Plaza
//!
//! A proximity-gated town session server.
//!
//! Clients share a 2D "town": each controls an avatar, avatars move
//! freely, and whoever stands close enough is grouped into the same
//! audio/video conversation. Plaza keeps a race-free view of who is in
//! which town, pushes every change to everyone else in order, and
//! enforces the moderation model (admins, muting, bans).
//!
//! Two surfaces share one [`TownRegistry`](plaza_town::TownRegistry):
//!
//! - [`TownService`]: request/response calls (create, list, join,
//!   moderate, accounts), for an HTTP layer to route to
//! - [`PlazaServer`]: the WebSocket event channel, one socket per player
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use plaza::prelude::*;
//!
//! # async fn run() -> Result<(), PlazaError> {
//! let config = ServerConfig::from_env();
//! let registry = Arc::new(TownRegistry::new(config.master_password.clone()));
//! let service = TownService::new(
//!     Arc::clone(&registry),
//!     LocalTokenIssuer,
//!     LocalTokenIssuer,
//!     InMemoryAccounts::new(),
//! );
//! // hand `service` to your HTTP routes, then:
//! let server = PlazaServer::builder()
//!     .bind(&config.bind_addr)
//!     .registry(registry)
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod logging;
mod server;
mod service;

pub use config::{BIND_ENV, DEFAULT_CAPACITY_ENV, MASTER_PASSWORD_ENV, ServerConfig};
pub use error::PlazaError;
pub use logging::init_tracing;
pub use server::{DEFAULT_IDLE_TIMEOUT, DEFAULT_SUBSCRIBE_TIMEOUT, PlazaServer, PlazaServerBuilder};
pub use service::TownService;

/// Everything a typical Plaza binary needs.
pub mod prelude {
    pub use crate::{
        PlazaError, PlazaServer, PlazaServerBuilder, ServerConfig, TownService, init_tracing,
    };
    pub use plaza_protocol::rest::*;
    pub use plaza_protocol::{
        ClientMessage, Codec, Direction, DisconnectReason, Envelope, JsonCodec, Location, PlayerId,
        PlayerSnapshot, PrivilegeUpdate, Privileges, ServerEvent, TownId,
    };
    pub use plaza_session::{
        AccountStore, ChatTokenIssuer, InMemoryAccounts, LocalTokenIssuer, MediaTokenIssuer,
        SessionError,
    };
    pub use plaza_town::{TownError, TownRegistry, TownView, ViewUpdate};
}
