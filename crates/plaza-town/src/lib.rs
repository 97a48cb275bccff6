//! Towns for Plaza: players, proximity, and the per-town actors.
//!
//! Each town runs as an isolated Tokio task (actor model) that owns its
//! roster, sessions, and ban list, and fans events out to every
//! connected client in the order it applied them.
//!
//! # Key types
//!
//! - [`TownRegistry`]: creates, lists, updates, and deletes towns
//! - [`TownHandle`]: sends commands to a running town actor
//! - [`JoinReservation`]: the held slot between admission and join
//! - [`Player`]: the server-side avatar record
//! - [`NearbySet`] / [`nearby`]: distance-gated grouping
//! - [`TownView`]: the client-side reducer over server events

mod config;
mod controller;
mod error;
mod player;
mod proximity;
mod registry;
mod view;

pub use config::{
    DEFAULT_CAPACITY, MAX_CAPACITY, MIN_CAPACITY, TownConfig, TownInfo, TownUpdate,
    capacity_in_range,
};
pub use controller::{
    EventReceiver, EventSender, JoinReservation, Joined, Observer, ObserverId, Subscription,
    TownHandle,
};
pub use error::TownError;
pub use player::Player;
pub use proximity::{NEARBY_RADIUS, NearbySet, Positioned, nearby};
pub use registry::{CreatedTown, TownRegistry};
pub use view::{TownView, ViewUpdate};
