//! Proximity: who is close enough to share a conversation.
//!
//! Two avatars are *nearby* when the Euclidean distance between them is
//! strictly less than [`NEARBY_RADIUS`]. Grouping into audio/video
//! conversations happens downstream; this module only answers "who".
//!
//! # Change suppression
//!
//! Nearby sets are recomputed on every movement and every roster change,
//! which is far more often than they actually change. [`NearbySet::refresh`]
//! hands back the *previous* `Arc` when the recomputed id set is the same,
//! so consumers can compare with [`Arc::ptr_eq`] and skip work when nothing
//! effectively changed, even though locations moved.

use std::collections::BTreeSet;
use std::sync::Arc;

use plaza_protocol::{Location, PlayerId, PlayerSnapshot};

use crate::Player;

/// Distance below which two avatars are nearby. Exactly this distance is
/// not nearby.
pub const NEARBY_RADIUS: f64 = 80.0;

/// Anything with an identity and a position.
pub trait Positioned {
    fn player_id(&self) -> PlayerId;
    fn location(&self) -> &Location;
}

impl Positioned for Player {
    fn player_id(&self) -> PlayerId {
        self.id
    }

    fn location(&self) -> &Location {
        &self.location
    }
}

impl Positioned for PlayerSnapshot {
    fn player_id(&self) -> PlayerId {
        self.id
    }

    fn location(&self) -> &Location {
        &self.location
    }
}

/// Ids of every player strictly within [`NEARBY_RADIUS`] of `reference`.
///
/// Callers that want "nearby *other* players" filter the reference
/// player out of `players` first.
pub fn nearby<'a, P>(
    players: impl IntoIterator<Item = &'a P>,
    reference: &Location,
) -> BTreeSet<PlayerId>
where
    P: Positioned + 'a,
{
    players
        .into_iter()
        .filter(|p| p.location().distance_to(reference) < NEARBY_RADIUS)
        .map(Positioned::player_id)
        .collect()
}

/// A computed nearby set, ids in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NearbySet {
    ids: Vec<PlayerId>,
}

impl NearbySet {
    /// An empty set, for a player nobody is near yet.
    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Recomputes the set around `reference`.
    ///
    /// Returns a clone of `previous` (same allocation) if the new ids
    /// equal the old ones as an unordered set, otherwise a new `Arc`.
    pub fn refresh<'a, P>(
        previous: &Arc<NearbySet>,
        players: impl IntoIterator<Item = &'a P>,
        reference: &Location,
    ) -> Arc<NearbySet>
    where
        P: Positioned + 'a,
    {
        // BTreeSet iteration is sorted, so this is the sorted list the
        // comparison needs.
        let ids: Vec<PlayerId> = nearby(players, reference).into_iter().collect();
        if ids == previous.ids {
            Arc::clone(previous)
        } else {
            Arc::new(NearbySet { ids })
        }
    }

    pub fn ids(&self) -> &[PlayerId] {
        &self.ids
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
